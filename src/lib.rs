// lib.rs - Session and orchestration core for the plantation dashboard

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod app;
pub mod capabilities;
pub mod connectivity;
pub mod conversation;
pub mod diagnosis;
pub mod orchestrator;
pub mod session;

pub use api::{ApiConfig, ImageUpload, PlantTip, DEFAULT_API_BASE};
pub use app::{App, Event, Model, ViewModel};
pub use capabilities::{Capabilities, Effect};
pub use connectivity::{ConnectivityMonitor, ReachabilitySignal};
pub use conversation::{ConversationManager, Message, Sender};
pub use diagnosis::{DiagnosisOutcome, DiagnosisPhase, DiagnosisPipeline, FallbackSampler};
pub use orchestrator::{FailureReason, OperationResult};
pub use session::{LanguageCode, SessionRecord, UserProfile, ViewId, SESSION_STORAGE_KEY};
