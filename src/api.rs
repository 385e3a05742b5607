//! Backend endpoint configuration, wire DTOs, and request builders.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::capabilities::{HttpError, HttpRequest};
use crate::session::{LanguageCode, UserProfile};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const DISEASE_DETECTION_PATH: &str = "/api/disease-detection";
pub const CHATBOT_PATH: &str = "/api/chatbot";
pub const PLANT_TIPS_PATH: &str = "/api/plant-tips";

/// Where the backend lives. Overridable at runtime so shells can point the
/// core at a staging or remote deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    base: Url,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base_url.trim_end_matches('/')).map_err(|e| HttpError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = base.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(HttpError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("invalid scheme '{}', only 'http' and 'https' are allowed", scheme),
            });
        }
        if base.host_str().is_none() {
            return Err(HttpError::InvalidUrl {
                url: base_url.to_string(),
                reason: "API base must have a host".to_string(),
            });
        }

        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, HttpError> {
        self.base.join(path).map_err(|e| HttpError::InvalidUrl {
            url: format!("{}{}", self.base, path),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub role: &'a str,
    pub region: Option<&'a str>,
    pub crops_grown: Option<Vec<String>>,
    pub language: LanguageCode,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiseaseDetectionResponse {
    pub status: String,
    #[serde(default)]
    pub disease: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
}

impl DiseaseDetectionResponse {
    /// Maps the wire verdict onto the typed outcome. Unknown status values
    /// are treated as malformed rather than guessed at.
    pub fn into_outcome(
        self,
    ) -> Result<crate::diagnosis::DiagnosisOutcome, crate::orchestrator::FailureReason> {
        use crate::diagnosis::{DiagnosisOutcome, PlantHealth};
        use crate::orchestrator::FailureReason;

        let status = match self.status.as_str() {
            "healthy" => PlantHealth::Healthy,
            "diseased" => PlantHealth::Diseased,
            other => {
                return Err(FailureReason::MalformedResponse(format!(
                    "unknown detection status '{other}'"
                )))
            }
        };

        Ok(DiagnosisOutcome {
            status,
            disease: self.disease,
            confidence: self.confidence,
            recommendation: self.recommendation,
            sourced_from_fallback: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantTip {
    pub title: String,
    pub tip: String,
    pub icon: String,
}

/// The two tips shown when the backend cannot provide any.
pub fn fallback_plant_tips() -> Vec<PlantTip> {
    vec![
        PlantTip {
            title: "Soil Preparation".to_string(),
            tip: "Test soil pH before planting. Most crops prefer pH 6.0-7.0.".to_string(),
            icon: "\u{1F331}".to_string(),
        },
        PlantTip {
            title: "Watering Schedule".to_string(),
            tip: "Water deeply but less frequently. Early morning is best.".to_string(),
            icon: "\u{1F4A7}".to_string(),
        },
    ]
}

/// An image the shell picked for analysis, as raw bytes plus the metadata
/// the multipart upload needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

pub fn login(config: &ApiConfig, email: &str, password: &str) -> Result<HttpRequest, HttpError> {
    HttpRequest::post(&config.endpoint(LOGIN_PATH)?)?.with_json(&LoginRequest { email, password })
}

pub fn register(
    config: &ApiConfig,
    email: &str,
    username: &str,
    password: &str,
    region: Option<&str>,
    language: LanguageCode,
) -> Result<HttpRequest, HttpError> {
    HttpRequest::post(&config.endpoint(REGISTER_PATH)?)?.with_json(&RegisterRequest {
        email,
        username,
        password,
        role: "farmer",
        region,
        crops_grown: None,
        language,
    })
}

pub fn disease_detection(
    config: &ApiConfig,
    token: Option<&str>,
    upload: &ImageUpload,
) -> Result<HttpRequest, HttpError> {
    let boundary = format!("pms-{}", Uuid::new_v4().simple());
    let body = multipart_file(&boundary, "file", upload);

    let mut request = HttpRequest::post(&config.endpoint(DISEASE_DETECTION_PATH)?)?.with_body(
        &format!("multipart/form-data; boundary={boundary}"),
        body,
    )?;
    if let Some(token) = token {
        request = request.with_bearer(token)?;
    }
    Ok(request)
}

pub fn chatbot(
    config: &ApiConfig,
    token: Option<&str>,
    message: &str,
) -> Result<HttpRequest, HttpError> {
    let mut request =
        HttpRequest::post(&config.endpoint(CHATBOT_PATH)?)?.with_json(&ChatRequest { message })?;
    if let Some(token) = token {
        request = request.with_bearer(token)?;
    }
    Ok(request)
}

pub fn plant_tips(config: &ApiConfig) -> Result<HttpRequest, HttpError> {
    HttpRequest::get(&config.endpoint(PLANT_TIPS_PATH)?)
}

fn multipart_file(boundary: &str, field: &str, upload: &ImageUpload) -> Vec<u8> {
    let filename = sanitize_filename(&upload.filename);
    let mime_type = if upload.mime_type.is_empty() {
        "application/octet-stream"
    } else {
        &upload.mime_type
    };

    let mut body = Vec::with_capacity(upload.data.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(&upload.data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    if cleaned.is_empty() {
        "upload.jpg".to_string()
    } else {
        cleaned
    }
}
