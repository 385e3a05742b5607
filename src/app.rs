//! The application core: owns the model, routes events, and issues effects.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::api::{self, ApiConfig, ImageUpload, PlantTip};
use crate::capabilities::{Capabilities, HttpResult, KvOutput, KvResult};
use crate::connectivity::{ConnectivityMonitor, ReachabilitySignal};
use crate::conversation::{self, ConversationManager, Sender};
use crate::diagnosis::{DiagnosisOutcome, DiagnosisPhase, DiagnosisPipeline, Submission};
use crate::orchestrator::{self, FailureReason, OperationResult};
use crate::session::{LanguageCode, SessionRecord, ViewId, SESSION_STORAGE_KEY};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Fired once by the shell on launch. Kicks off session restore and
    /// the plant-tips fetch.
    AppStarted,
    ApiBaseConfigured { base_url: String },
    SessionLoaded(Box<KvResult>),
    SessionWritten(Box<KvResult>),
    NetworkStatusChanged { online: bool },

    LoginSubmitted { email: String, password: String },
    LoginResult(Box<HttpResult>),
    RegisterSubmitted {
        email: String,
        username: Option<String>,
        password: String,
        region: Option<String>,
    },
    RegisterResult {
        email: String,
        password: String,
        result: Box<HttpResult>,
    },
    LogoutRequested,
    AuthErrorDismissed,

    LanguageSelected { language: LanguageCode },
    DarkModeSet { enabled: bool },
    ViewSelected { view: ViewId },

    ImageSelected(ImageUpload),
    DiagnosisResult(Box<HttpResult>),
    DiagnosisCleared,

    MessageSubmitted { text: String },
    ChatResult(Box<HttpResult>),

    PlantTipsRequested,
    PlantTipsResult(Box<HttpResult>),
}

#[derive(Debug, Default)]
pub struct Model {
    pub api: ApiConfig,
    pub session: SessionRecord,
    pub connectivity: ConnectivityMonitor,
    pub diagnosis: DiagnosisPipeline,
    pub conversation: ConversationManager,
    pub plant_tips: Vec<PlantTip>,
    pub auth_error: Option<String>,
    pub auth_in_flight: bool,
    pub restored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisView {
    pub phase: DiagnosisPhase,
    pub outcome: Option<DiagnosisOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub text: String,
    pub sender: Sender,
    pub timestamp_ms: u64,
    pub is_placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewModel {
    pub current_view: ViewId,
    pub is_authenticated: bool,
    pub username: Option<String>,
    pub language: LanguageCode,
    pub dark_mode: bool,
    pub online: bool,
    pub restored: bool,
    pub auth_error: Option<String>,
    pub auth_in_flight: bool,
    pub diagnosis: DiagnosisView,
    pub messages: Vec<MessageView>,
    pub plant_tips: Vec<PlantTip>,
}

#[derive(Default)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    #[allow(clippy::too_many_lines)]
    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        match event {
            Event::AppStarted => {
                caps.kv
                    .read(SESSION_STORAGE_KEY, |result| Event::SessionLoaded(Box::new(result)));
                request_plant_tips(model, caps);
                caps.render.render();
            }

            Event::ApiBaseConfigured { base_url } => {
                match ApiConfig::new(&base_url) {
                    Ok(config) => model.api = config,
                    Err(e) => tracing::warn!(error = %e, "ignoring invalid API base override"),
                }
                caps.render.render();
            }

            Event::SessionLoaded(result) => {
                match *result {
                    Ok(KvOutput::Read(Some(bytes))) => {
                        if let Some(record) = SessionRecord::restore(&bytes) {
                            model.session = record;
                        } else {
                            tracing::warn!("stored session was unreadable, starting fresh");
                        }
                    }
                    Ok(KvOutput::Read(None) | KvOutput::Written) => {}
                    Err(e) => tracing::warn!(error = %e, "session restore failed"),
                }
                model.session.current_view = model.session.initial_view();
                model.restored = true;
                caps.render.render();
            }

            // Persistence is best-effort; a failed write only gets logged.
            Event::SessionWritten(result) => {
                if let Err(e) = *result {
                    tracing::warn!(error = %e, "session persist failed");
                }
            }

            Event::NetworkStatusChanged { online } => {
                let signal = if online {
                    ReachabilitySignal::Online
                } else {
                    ReachabilitySignal::Offline
                };
                if model.connectivity.apply(signal) {
                    tracing::debug!(online, "reachability changed");
                }
                caps.render.render();
            }

            Event::LoginSubmitted { email, password } => {
                if !model.auth_in_flight {
                    model.auth_error = None;
                    match api::login(&model.api, &email, &password) {
                        Ok(request) => {
                            model.auth_in_flight = true;
                            caps.http
                                .send(request, |result| Event::LoginResult(Box::new(result)));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "could not build login request");
                            model.auth_error = Some(SIGN_IN_FAILED.to_string());
                        }
                    }
                }
                caps.render.render();
            }

            Event::LoginResult(result) => {
                model.auth_in_flight = false;
                match orchestrator::settle(*result, orchestrator::json_body::<api::LoginResponse>)
                {
                    OperationResult::Success(response) => {
                        model.session.sign_in(response.user, response.access_token);
                        model.auth_error = None;
                        persist_session(model, caps);
                    }
                    OperationResult::Failed(reason) => {
                        tracing::warn!(%reason, "login failed");
                        model.auth_error = Some(login_error_text(&reason));
                    }
                    OperationResult::Pending | OperationResult::FallbackApplied(..) => {}
                }
                caps.render.render();
            }

            Event::RegisterSubmitted {
                email,
                username,
                password,
                region,
            } => {
                if !model.auth_in_flight {
                    model.auth_error = None;
                    let username = username
                        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
                    let request = api::register(
                        &model.api,
                        &email,
                        &username,
                        &password,
                        region.as_deref(),
                        model.session.language,
                    );
                    match request {
                        Ok(request) => {
                            model.auth_in_flight = true;
                            caps.http.send(request, move |result| Event::RegisterResult {
                                email,
                                password,
                                result: Box::new(result),
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "could not build register request");
                            model.auth_error = Some(REGISTRATION_FAILED.to_string());
                        }
                    }
                }
                caps.render.render();
            }

            // Registration succeeded, chain straight into a login with the
            // same credentials so the user lands signed in.
            Event::RegisterResult {
                email,
                password,
                result,
            } => {
                model.auth_in_flight = false;
                match orchestrator::settle(*result, |_| Ok(())) {
                    OperationResult::Success(()) => match api::login(&model.api, &email, &password)
                    {
                        Ok(request) => {
                            model.auth_in_flight = true;
                            caps.http
                                .send(request, |result| Event::LoginResult(Box::new(result)));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "could not build chained login request");
                            model.auth_error = Some(SIGN_IN_FAILED.to_string());
                        }
                    },
                    OperationResult::Failed(reason) => {
                        tracing::warn!(%reason, "registration failed");
                        model.auth_error = Some(REGISTRATION_FAILED.to_string());
                    }
                    OperationResult::Pending | OperationResult::FallbackApplied(..) => {}
                }
                caps.render.render();
            }

            Event::LogoutRequested => {
                model.session.clear_auth();
                persist_session(model, caps);
                caps.render.render();
            }

            Event::AuthErrorDismissed => {
                model.auth_error = None;
                caps.render.render();
            }

            Event::LanguageSelected { language } => {
                model.session.language = language;
                persist_session(model, caps);
                caps.render.render();
            }

            Event::DarkModeSet { enabled } => {
                model.session.dark_mode = enabled;
                persist_session(model, caps);
                caps.render.render();
            }

            Event::ViewSelected { view } => {
                model.session.current_view = view;
                persist_session(model, caps);
                caps.render.render();
            }

            Event::ImageSelected(upload) => {
                // A fresh upload replaces a shown result.
                if model.diagnosis.phase() == DiagnosisPhase::Resolved {
                    model.diagnosis.clear();
                }
                match model.diagnosis.accept(upload.data.len()) {
                    Submission::Accepted => {
                        let request = api::disease_detection(
                            &model.api,
                            model.session.token.as_deref(),
                            &upload,
                        );
                        match request {
                            Ok(request) => caps
                                .http
                                .send(request, |result| Event::DiagnosisResult(Box::new(result))),
                            Err(e) => {
                                tracing::warn!(error = %e, "could not build detection request");
                                model.diagnosis.complete(Err(e), parse_diagnosis);
                            }
                        }
                    }
                    Submission::EmptyImage => {
                        tracing::debug!("ignoring empty image selection");
                    }
                    Submission::InFlight => {
                        tracing::debug!("analysis already in flight, submission rejected");
                    }
                }
                caps.render.render();
            }

            Event::DiagnosisResult(result) => {
                model.diagnosis.complete(*result, parse_diagnosis);
                caps.render.render();
            }

            Event::DiagnosisCleared => {
                model.diagnosis.clear();
                caps.render.render();
            }

            Event::MessageSubmitted { text } => {
                match model.conversation.submit(&text, now_ms()) {
                    conversation::Submission::Accepted => {
                        let request =
                            api::chatbot(&model.api, model.session.token.as_deref(), text.trim());
                        match request {
                            Ok(request) => caps
                                .http
                                .send(request, |result| Event::ChatResult(Box::new(result))),
                            Err(e) => {
                                tracing::warn!(error = %e, "could not build chat request");
                                model.conversation.complete(Err(e), parse_chat, now_ms());
                            }
                        }
                    }
                    conversation::Submission::EmptyInput => {
                        tracing::debug!("ignoring empty chat input");
                    }
                    conversation::Submission::ReplyOutstanding => {
                        tracing::debug!("reply outstanding, chat submission rejected");
                    }
                }
                caps.render.render();
            }

            Event::ChatResult(result) => {
                model.conversation.complete(*result, parse_chat, now_ms());
                caps.render.render();
            }

            Event::PlantTipsRequested => {
                request_plant_tips(model, caps);
                caps.render.render();
            }

            Event::PlantTipsResult(result) => {
                let settled = orchestrator::settle_with_fallback(
                    *result,
                    orchestrator::json_body::<Vec<PlantTip>>,
                    api::fallback_plant_tips,
                );
                if let OperationResult::Success(tips)
                | OperationResult::FallbackApplied(tips, _) = settled
                {
                    model.plant_tips = tips;
                }
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel {
            current_view: model.session.current_view,
            is_authenticated: model.session.is_authenticated,
            username: model.session.user.as_ref().map(|u| u.username.clone()),
            language: model.session.language,
            dark_mode: model.session.dark_mode,
            online: model.connectivity.is_online(),
            restored: model.restored,
            auth_error: model.auth_error.clone(),
            auth_in_flight: model.auth_in_flight,
            diagnosis: DiagnosisView {
                phase: model.diagnosis.phase(),
                outcome: model.diagnosis.result().cloned(),
            },
            messages: model
                .conversation
                .messages()
                .iter()
                .map(|m| MessageView {
                    text: m.text.clone(),
                    sender: m.sender,
                    timestamp_ms: m.timestamp_ms,
                    is_placeholder: m.is_placeholder,
                })
                .collect(),
            plant_tips: model.plant_tips.clone(),
        }
    }
}

const SIGN_IN_FAILED: &str = "Sign-in failed. Please try again.";
const REGISTRATION_FAILED: &str = "Registration failed. Try a different email or username.";

fn login_error_text(reason: &FailureReason) -> String {
    match reason {
        FailureReason::Server { status, .. } if *status == 401 || *status == 403 => {
            "Invalid email or password.".to_string()
        }
        FailureReason::Transport(_) => {
            "Unable to reach the server. Please check your connection and try again.".to_string()
        }
        _ => SIGN_IN_FAILED.to_string(),
    }
}

fn parse_diagnosis(bytes: &[u8]) -> Result<DiagnosisOutcome, FailureReason> {
    orchestrator::json_body::<api::DiseaseDetectionResponse>(bytes)
        .and_then(api::DiseaseDetectionResponse::into_outcome)
}

fn parse_chat(bytes: &[u8]) -> Result<String, FailureReason> {
    orchestrator::json_body::<api::ChatResponse>(bytes).map(|r| r.response)
}

fn request_plant_tips(model: &Model, caps: &Capabilities) {
    match api::plant_tips(&model.api) {
        Ok(request) => caps
            .http
            .send(request, |result| Event::PlantTipsResult(Box::new(result))),
        Err(e) => tracing::warn!(error = %e, "could not build plant-tips request"),
    }
}

fn persist_session(model: &Model, caps: &Capabilities) {
    let bytes = match model.session.encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "session serialize failed");
            return;
        }
    };
    caps.kv.write(SESSION_STORAGE_KEY, bytes, |result| {
        Event::SessionWritten(Box::new(result))
    });
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_error_text_distinguishes_credentials_from_transport() {
        let unauthorized = FailureReason::Server {
            status: 401,
            body: String::new(),
        };
        assert_eq!(login_error_text(&unauthorized), "Invalid email or password.");

        let transport = FailureReason::Transport("refused".into());
        assert!(login_error_text(&transport).contains("connection"));

        let server = FailureReason::Server {
            status: 500,
            body: String::new(),
        };
        assert_eq!(login_error_text(&server), SIGN_IN_FAILED);
    }

    #[test]
    fn parse_diagnosis_rejects_unknown_status() {
        let result = parse_diagnosis(br#"{"status":"unknown"}"#);
        assert!(matches!(result, Err(FailureReason::MalformedResponse(_))));
    }

    #[test]
    fn parse_chat_extracts_reply() {
        assert_eq!(parse_chat(br#"{"response":"hi"}"#).unwrap(), "hi");
        assert!(parse_chat(b"{}").is_err());
    }
}
