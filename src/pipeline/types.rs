use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prompt::CaseSummary;
use crate::config::DEFAULT_TOP_K;

/// States of one draft request. Reaching `Persisted` is the only way
/// `ai_generated_recommendations` gets written; every failure leaves the
/// plan untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftStage {
    Requested,
    Authorized,
    EvidenceRetrieved,
    PromptComposed,
    Generated,
    Persisted,
}

impl DraftStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Authorized => "authorized",
            Self::EvidenceRetrieved => "evidence_retrieved",
            Self::PromptComposed => "prompt_composed",
            Self::Generated => "generated",
            Self::Persisted => "persisted",
        }
    }
}

/// Options forwarded to the generation backend. The orchestrator enforces
/// `timeout` by cancelling the in-flight call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    /// Sampling temperature in [0, 1].
    pub temperature: f32,
    /// Nucleus sampling mass in [0, 1].
    pub top_p: f32,
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 1024,
            temperature: 0.2,
            top_p: 0.9,
            timeout: Duration::from_secs(60),
        }
    }
}

/// One draft request, carrying the full caller identity and configuration.
/// Nothing is read from ambient state.
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub therapist_id: Uuid,
    pub patient_id: Uuid,
    pub plan_id: Uuid,
    /// Free-text retrieval query, typically the presenting problem.
    pub query: String,
    pub case: CaseSummary,
    pub top_k: usize,
    pub config: GenerationConfig,
    pub ip_address: Option<String>,
}

impl DraftRequest {
    pub fn new(
        therapist_id: Uuid,
        patient_id: Uuid,
        plan_id: Uuid,
        query: impl Into<String>,
        case: CaseSummary,
    ) -> Self {
        Self {
            therapist_id,
            patient_id,
            plan_id,
            query: query.into(),
            case,
            top_k: DEFAULT_TOP_K,
            config: GenerationConfig::default(),
            ip_address: None,
        }
    }
}

/// A successfully persisted draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftOutcome {
    pub plan_id: Uuid,
    /// Exactly what the generation backend returned, byte for byte.
    pub recommendations: String,
    pub evidence_used: Vec<Uuid>,
    pub prompt_sha256: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_within_documented_ranges() {
        let config = GenerationConfig::default();
        assert!((0.0..=1.0).contains(&config.temperature));
        assert!((0.0..=1.0).contains(&config.top_p));
        assert!(config.max_output_tokens > 0);
        assert!(config.timeout > Duration::ZERO);
    }

    #[test]
    fn request_builder_uses_defaults() {
        let request = DraftRequest::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "panic attacks",
            CaseSummary {
                presenting_problem: "Panic".into(),
                session_narrative: "Narrative".into(),
                diagnosis: None,
                modality_preference: None,
            },
        );
        assert_eq!(request.top_k, DEFAULT_TOP_K);
        assert!(request.ip_address.is_none());
    }
}
