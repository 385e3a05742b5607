use crux_core::testing::AppTester;
use pms_core::capabilities::{HttpError, HttpOperation, HttpResponse};
use pms_core::diagnosis::{fallback_pool, FallbackSampler};
use pms_core::{App, DiagnosisPhase, DiagnosisPipeline, Effect, Event, ImageUpload, Model};

fn leaf_image() -> ImageUpload {
    ImageUpload {
        data: vec![0xFF, 0xD8, 0xFF, 0xE0],
        filename: "leaf.jpg".into(),
        mime_type: "image/jpeg".into(),
    }
}

fn take_http_request(
    effects: Vec<Effect>,
) -> Option<crux_core::Request<HttpOperation>> {
    effects.into_iter().find_map(|effect| match effect {
        Effect::Http(request) => Some(request),
        _ => None,
    })
}

#[test]
fn upload_moves_to_analyzing_before_any_response() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::ImageSelected(leaf_image()), &mut model);

    let view = app.view(&model);
    assert_eq!(view.diagnosis.phase, DiagnosisPhase::Analyzing);
    assert!(view.diagnosis.outcome.is_none());

    let request = take_http_request(update.effects).expect("upload issues a request");
    let HttpOperation::Execute(ref http_request) = request.operation;
    assert!(http_request.url().ends_with("/api/disease-detection"));
    assert!(http_request
        .header("content-type")
        .unwrap()
        .starts_with("multipart/form-data"));
}

#[test]
fn empty_selection_is_ignored() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(
        Event::ImageSelected(ImageUpload {
            data: vec![],
            filename: "empty.jpg".into(),
            mime_type: "image/jpeg".into(),
        }),
        &mut model,
    );

    assert!(take_http_request(update.effects).is_none());
    assert_eq!(app.view(&model).diagnosis.phase, DiagnosisPhase::Idle);
}

#[test]
fn backend_verdict_is_reported_verbatim() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::ImageSelected(leaf_image()), &mut model);
    let mut request = take_http_request(update.effects).unwrap();

    let body = br#"{"status":"diseased","disease":"Bacterial Blight","confidence":"81%","recommendation":"Remove infected plants."}"#;
    let update = app
        .resolve(&mut request, Ok(HttpResponse::new(200, body.to_vec())))
        .expect("resolves");
    for event in update.events {
        app.update(event, &mut model);
    }

    let view = app.view(&model);
    assert_eq!(view.diagnosis.phase, DiagnosisPhase::Resolved);
    let outcome = view.diagnosis.outcome.unwrap();
    assert_eq!(outcome.disease.as_deref(), Some("Bacterial Blight"));
    assert_eq!(outcome.confidence.as_deref(), Some("81%"));
    assert!(!outcome.sourced_from_fallback);
}

#[test]
fn unreachable_backend_resolves_from_the_canned_pool() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    model.diagnosis = DiagnosisPipeline::with_sampler(FallbackSampler::seeded(11));

    let update = app.update(Event::ImageSelected(leaf_image()), &mut model);
    let mut request = take_http_request(update.effects).unwrap();

    let update = app
        .resolve(
            &mut request,
            Err(HttpError::Network {
                message: "connection refused".into(),
            }),
        )
        .expect("resolves");
    for event in update.events {
        app.update(event, &mut model);
    }

    let view = app.view(&model);
    assert_eq!(view.diagnosis.phase, DiagnosisPhase::Resolved);
    let outcome = view.diagnosis.outcome.unwrap();
    assert!(outcome.sourced_from_fallback);
    assert!(fallback_pool().contains(&outcome));
}

#[test]
fn server_error_also_degrades_to_the_pool() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    model.diagnosis = DiagnosisPipeline::with_sampler(FallbackSampler::seeded(2));

    let update = app.update(Event::ImageSelected(leaf_image()), &mut model);
    let mut request = take_http_request(update.effects).unwrap();

    let update = app
        .resolve(
            &mut request,
            Ok(HttpResponse::new(500, b"internal error".to_vec())),
        )
        .expect("resolves");
    for event in update.events {
        app.update(event, &mut model);
    }

    let outcome = app.view(&model).diagnosis.outcome.unwrap();
    assert!(fallback_pool().contains(&outcome));
}

#[test]
fn second_upload_while_analyzing_is_rejected() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let first = app.update(Event::ImageSelected(leaf_image()), &mut model);
    let mut request = take_http_request(first.effects).unwrap();

    let second = app.update(Event::ImageSelected(leaf_image()), &mut model);
    assert!(take_http_request(second.effects).is_none(), "no second request");
    assert_eq!(app.view(&model).diagnosis.phase, DiagnosisPhase::Analyzing);

    // the first analysis still settles normally
    let update = app
        .resolve(
            &mut request,
            Ok(HttpResponse::new(200, br#"{"status":"healthy"}"#.to_vec())),
        )
        .expect("resolves");
    for event in update.events {
        app.update(event, &mut model);
    }
    assert_eq!(app.view(&model).diagnosis.phase, DiagnosisPhase::Resolved);
}

#[test]
fn clear_is_ignored_while_analyzing() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    app.update(Event::ImageSelected(leaf_image()), &mut model);
    app.update(Event::DiagnosisCleared, &mut model);
    assert_eq!(app.view(&model).diagnosis.phase, DiagnosisPhase::Analyzing);
}

#[test]
fn clear_after_resolution_returns_to_idle() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::ImageSelected(leaf_image()), &mut model);
    let mut request = take_http_request(update.effects).unwrap();
    let update = app
        .resolve(
            &mut request,
            Ok(HttpResponse::new(200, br#"{"status":"healthy"}"#.to_vec())),
        )
        .expect("resolves");
    for event in update.events {
        app.update(event, &mut model);
    }

    app.update(Event::DiagnosisCleared, &mut model);
    let view = app.view(&model);
    assert_eq!(view.diagnosis.phase, DiagnosisPhase::Idle);
    assert!(view.diagnosis.outcome.is_none());
}

#[test]
fn request_failure_does_not_flip_the_connectivity_flag() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::ImageSelected(leaf_image()), &mut model);
    let mut request = take_http_request(update.effects).unwrap();
    let update = app
        .resolve(
            &mut request,
            Err(HttpError::Network {
                message: "unreachable".into(),
            }),
        )
        .expect("resolves");
    for event in update.events {
        app.update(event, &mut model);
    }

    // only shell reachability events move the flag
    assert!(app.view(&model).online);
}

#[test]
fn going_offline_does_not_disturb_an_outstanding_analysis() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::ImageSelected(leaf_image()), &mut model);
    let mut request = take_http_request(update.effects).unwrap();

    app.update(Event::NetworkStatusChanged { online: false }, &mut model);
    assert!(!app.view(&model).online);
    assert_eq!(app.view(&model).diagnosis.phase, DiagnosisPhase::Analyzing);

    let update = app
        .resolve(
            &mut request,
            Ok(HttpResponse::new(200, br#"{"status":"healthy"}"#.to_vec())),
        )
        .expect("resolves");
    for event in update.events {
        app.update(event, &mut model);
    }
    assert_eq!(app.view(&model).diagnosis.phase, DiagnosisPhase::Resolved);
}

#[test]
fn bearer_token_is_attached_when_signed_in() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    model.session.token = Some("token-abc".into());

    let update = app.update(Event::ImageSelected(leaf_image()), &mut model);
    let request = take_http_request(update.effects).unwrap();
    let HttpOperation::Execute(ref http_request) = request.operation;
    assert_eq!(
        http_request.header("authorization"),
        Some("Bearer token-abc")
    );
}
