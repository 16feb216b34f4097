//! The orchestrator's output contract (§3, §4.5, §7).
//!
//! `Resolution` is modeled as a tagged union rather than a stringly-typed
//! field (§9 "Tagged variants") so that exhaustive handling at the channel
//! adapter boundary is a compile-time check, grounded in the same shape
//! `wg_bastion::pipeline::outcome::StageOutcome` uses for its own
//! non-exhaustive decision enum.

use serde::{Deserialize, Serialize};

/// One grounded line of an answer; always ends with a trailing `[n]`
/// citation marker validated by the orchestrator (§4.5 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerLine {
    pub text: String,
}

/// One retrieved passage surfaced to the client, addressable by line-level
/// `[n]` markers (§4.5 step 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub citation: u32,
    pub chunk_id: String,
    pub source_url: Option<String>,
    pub meta: serde_json::Value,
}

/// Exactly four values ever leave the core (§7 "User-visible failures").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    Answer {
        answer_lines: Vec<AnswerLine>,
        citations: Vec<Citation>,
        confidence: f32,
    },
    Refusal {
        guidance_key: String,
    },
    NotEnoughInfo,
    InvalidOutput,
}

impl Resolution {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Answer { .. } => "answer",
            Self::Refusal { .. } => "refusal",
            Self::NotEnoughInfo => "not_enough_info",
            Self::InvalidOutput => "invalid_output",
        }
    }

    pub fn guidance_key(&self) -> Option<&str> {
        match self {
            Self::Refusal { guidance_key } => Some(guidance_key),
            _ => None,
        }
    }
}

/// The response envelope returned to every channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub request_id: String,
    #[serde(flatten)]
    pub resolution: Resolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_labels() {
        assert_eq!(Resolution::NotEnoughInfo.label(), "not_enough_info");
        assert_eq!(
            Resolution::Refusal { guidance_key: "refusal_medical".into() }.label(),
            "refusal"
        );
    }

    #[test]
    fn response_serializes_with_tagged_resolution() {
        let response = Response {
            request_id: "r1".into(),
            resolution: Resolution::NotEnoughInfo,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["resolution"], "not_enough_info");
        assert_eq!(json["request_id"], "r1");
    }
}
