//! Persistent session state: who is signed in, which screen they were on,
//! and their display preferences.
//!
//! The record is stored as JSON under a single key so older stored shapes
//! keep loading; unknown fields are ignored and missing fields take their
//! defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::KvError;

/// Storage key the session record lives under.
pub const SESSION_STORAGE_KEY: &str = "pms_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    #[default]
    En,
    Si,
}

impl LanguageCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Si => "si",
        }
    }
}

/// Screens of the dashboard. Stored so a returning user resumes where
/// they left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewId {
    #[default]
    Login,
    Home,
    Farms,
    Weather,
    Disease,
    Market,
    Satellite,
    Chatbot,
    Settings,
}

impl ViewId {
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        !matches!(self, ViewId::Login)
    }
}

/// Profile fields the backend returns on sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub crops_grown: Option<Vec<String>>,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionError {
    #[error("session serialization failed: {0}")]
    Encode(String),

    #[error("session store error: {0}")]
    Store(#[from] KvError),
}

/// Everything the client remembers between launches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRecord {
    pub user: Option<UserProfile>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub current_view: ViewId,
    pub language: LanguageCode,
    pub dark_mode: bool,
}

impl SessionRecord {
    /// Decodes a stored record, tolerating older shapes. Returns `None`
    /// when the bytes are not a JSON object at all; a corrupt store must
    /// never prevent startup.
    pub fn restore(bytes: &[u8]) -> Option<Self> {
        let record: Self = serde_json::from_slice(bytes).ok()?;
        Some(record.normalized())
    }

    pub fn encode(&self) -> Result<Vec<u8>, SessionError> {
        serde_json::to_vec(self).map_err(|e| SessionError::Encode(e.to_string()))
    }

    /// Repairs the authentication invariant: a record claiming to be
    /// authenticated without both a user and a token is downgraded to
    /// signed-out. Preferences survive the downgrade.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.is_authenticated && (self.user.is_none() || self.token.is_none()) {
            tracing::warn!("stored session claimed authentication without credentials");
            self.clear_auth();
        }
        self
    }

    /// The screen to show after restore. An unauthenticated record always
    /// lands on the login screen regardless of the stored view.
    #[must_use]
    pub fn initial_view(&self) -> ViewId {
        if self.is_authenticated {
            self.current_view
        } else {
            ViewId::Login
        }
    }

    pub fn sign_in(&mut self, user: UserProfile, token: String) {
        self.user = Some(user);
        self.token = Some(token);
        self.is_authenticated = true;
        self.current_view = ViewId::Home;
    }

    /// Drops credentials and returns to the login screen. Language and
    /// dark mode are preferences of the device, not the account, and
    /// survive sign-out.
    pub fn clear_auth(&mut self) {
        self.user = None;
        self.token = None;
        self.is_authenticated = false;
        self.current_view = ViewId::Login;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: 7,
            email: "mala@example.com".into(),
            username: "mala".into(),
            role: "farmer".into(),
            region: Some("Central".into()),
            crops_grown: Some(vec!["tea".into()]),
            language: "en".into(),
        }
    }

    #[test]
    fn restore_tolerates_missing_fields() {
        let record = SessionRecord::restore(br#"{"language":"si"}"#).unwrap();
        assert_eq!(record.language, LanguageCode::Si);
        assert!(!record.is_authenticated);
        assert_eq!(record.current_view, ViewId::Login);
    }

    #[test]
    fn restore_rejects_garbage() {
        assert!(SessionRecord::restore(b"not json").is_none());
        assert!(SessionRecord::restore(b"").is_none());
    }

    #[test]
    fn restore_ignores_unknown_fields() {
        let record =
            SessionRecord::restore(br#"{"dark_mode":true,"legacy_field":[1,2,3]}"#).unwrap();
        assert!(record.dark_mode);
    }

    #[test]
    fn authenticated_without_token_is_downgraded() {
        let record = SessionRecord {
            user: Some(profile()),
            is_authenticated: true,
            current_view: ViewId::Home,
            dark_mode: true,
            ..SessionRecord::default()
        };

        let normalized = record.normalized();
        assert!(!normalized.is_authenticated);
        assert!(normalized.user.is_none());
        assert_eq!(normalized.current_view, ViewId::Login);
        // preferences survive
        assert!(normalized.dark_mode);
    }

    #[test]
    fn stale_token_without_auth_flag_is_kept() {
        let record = SessionRecord::restore(br#"{"token":"old","is_authenticated":false}"#).unwrap();
        assert_eq!(record.token.as_deref(), Some("old"));
        assert_eq!(record.initial_view(), ViewId::Login);
    }

    #[test]
    fn initial_view_resumes_when_authenticated() {
        let mut record = SessionRecord::default();
        record.sign_in(profile(), "tok".into());
        record.current_view = ViewId::Chatbot;
        assert_eq!(record.initial_view(), ViewId::Chatbot);
    }

    #[test]
    fn sign_out_keeps_preferences() {
        let mut record = SessionRecord::default();
        record.sign_in(profile(), "tok".into());
        record.language = LanguageCode::Si;
        record.dark_mode = true;

        record.clear_auth();
        assert!(record.token.is_none());
        assert_eq!(record.language, LanguageCode::Si);
        assert!(record.dark_mode);
    }

    fn valid_record() -> impl Strategy<Value = SessionRecord> {
        (
            any::<bool>(),
            prop_oneof![Just(LanguageCode::En), Just(LanguageCode::Si)],
            any::<bool>(),
            prop_oneof![
                Just(ViewId::Home),
                Just(ViewId::Disease),
                Just(ViewId::Chatbot),
                Just(ViewId::Settings),
            ],
        )
            .prop_map(|(authed, language, dark_mode, view)| {
                let mut record = SessionRecord {
                    language,
                    dark_mode,
                    ..SessionRecord::default()
                };
                if authed {
                    record.sign_in(profile(), "token-value".into());
                    record.current_view = view;
                }
                record
            })
    }

    proptest! {
        #[test]
        fn encode_restore_round_trips(record in valid_record()) {
            let bytes = record.encode().unwrap();
            let restored = SessionRecord::restore(&bytes).unwrap();
            prop_assert_eq!(restored, record);
        }
    }
}
