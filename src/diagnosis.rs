//! Leaf-image diagnosis: a single-slot pipeline that carries one analysis
//! at a time from upload through resolution.
//!
//! When the detection backend cannot be reached the pipeline degrades into
//! one of four canned outcomes, picked uniformly at random so repeated
//! offline use does not always show the same disease.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::capabilities::HttpResult;
use crate::orchestrator::{self, FailureReason, OperationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisPhase {
    #[default]
    Idle,
    Analyzing,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlantHealth {
    Healthy,
    Diseased,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisOutcome {
    pub status: PlantHealth,
    pub disease: Option<String>,
    pub confidence: Option<String>,
    pub recommendation: Option<String>,
    /// True when this outcome came from the canned pool rather than the
    /// detection backend.
    pub sourced_from_fallback: bool,
}

/// Outcome of offering an image to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    /// Zero-byte selections are ignored without touching the phase.
    EmptyImage,
    /// One analysis at a time; a submission while one is outstanding is
    /// rejected rather than queued.
    InFlight,
}

const FALLBACK_OUTCOMES: [(PlantHealth, &str, &str, &str); 4] = [
    (
        PlantHealth::Diseased,
        "Leaf Spot Disease",
        "87%",
        "Apply copper-based fungicide every 7-10 days. Remove affected leaves and improve air circulation around plants.",
    ),
    (
        PlantHealth::Diseased,
        "Powdery Mildew",
        "92%",
        "Use neem oil spray or sulfur-based fungicide. Ensure proper spacing between plants for better air flow.",
    ),
    (
        PlantHealth::Healthy,
        "No disease detected",
        "95%",
        "Your plant looks healthy! Continue regular watering and monitoring. Consider preventive measures like proper spacing and good drainage.",
    ),
    (
        PlantHealth::Diseased,
        "Root Rot",
        "78%",
        "Improve soil drainage immediately. Reduce watering frequency and consider repotting with fresh, well-draining soil.",
    ),
];

fn canned_outcome(index: usize) -> DiagnosisOutcome {
    let (status, disease, confidence, recommendation) = FALLBACK_OUTCOMES[index];
    DiagnosisOutcome {
        status,
        disease: Some(disease.to_string()),
        confidence: Some(confidence.to_string()),
        recommendation: Some(recommendation.to_string()),
        sourced_from_fallback: true,
    }
}

/// The full canned pool, in declaration order. Fallback picks always come
/// from this set, byte for byte.
pub fn fallback_pool() -> Vec<DiagnosisOutcome> {
    (0..FALLBACK_OUTCOMES.len()).map(canned_outcome).collect()
}

/// Uniform sampler over the canned pool. Seedable so tests can pin the
/// sequence of picks.
pub struct FallbackSampler {
    rng: StdRng,
}

impl FallbackSampler {
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn pick(&mut self) -> DiagnosisOutcome {
        canned_outcome(self.rng.gen_range(0..FALLBACK_OUTCOMES.len()))
    }
}

impl Default for FallbackSampler {
    fn default() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl fmt::Debug for FallbackSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FallbackSampler")
    }
}

#[derive(Debug, Default)]
pub struct DiagnosisPipeline {
    phase: DiagnosisPhase,
    result: Option<DiagnosisOutcome>,
    sampler: FallbackSampler,
}

impl DiagnosisPipeline {
    #[must_use]
    pub fn with_sampler(sampler: FallbackSampler) -> Self {
        Self {
            phase: DiagnosisPhase::Idle,
            result: None,
            sampler,
        }
    }

    #[must_use]
    pub fn phase(&self) -> DiagnosisPhase {
        self.phase
    }

    pub fn result(&self) -> Option<&DiagnosisOutcome> {
        self.result.as_ref()
    }

    /// Offers an image for analysis. On acceptance the phase moves to
    /// Analyzing synchronously, before any request goes out.
    pub fn accept(&mut self, image_len: usize) -> Submission {
        if image_len == 0 {
            return Submission::EmptyImage;
        }
        if self.phase == DiagnosisPhase::Analyzing {
            return Submission::InFlight;
        }
        self.phase = DiagnosisPhase::Analyzing;
        self.result = None;
        Submission::Accepted
    }

    /// Settles the outstanding analysis. A successful parse resolves with
    /// the backend's verdict; any failure resolves with a sampled canned
    /// outcome, so every accepted upload reaches Resolved.
    pub fn complete<P>(&mut self, outcome: HttpResult, parse: P)
    where
        P: FnOnce(&[u8]) -> Result<DiagnosisOutcome, FailureReason>,
    {
        if self.phase != DiagnosisPhase::Analyzing {
            tracing::warn!("dropping diagnosis response with no analysis outstanding");
            return;
        }

        let settled = orchestrator::settle_with_fallback(outcome, parse, || self.sampler.pick());
        match settled {
            OperationResult::Success(result) | OperationResult::FallbackApplied(result, _) => {
                self.result = Some(result);
                self.phase = DiagnosisPhase::Resolved;
            }
            OperationResult::Pending | OperationResult::Failed(_) => {}
        }
    }

    /// Returns to Idle. Only meaningful from Resolved; clearing during an
    /// analysis would lose the outstanding upload's slot.
    pub fn clear(&mut self) -> bool {
        if self.phase != DiagnosisPhase::Resolved {
            return false;
        }
        self.phase = DiagnosisPhase::Idle;
        self.result = None;
        true
    }
}
