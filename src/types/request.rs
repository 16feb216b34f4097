//! Channel-agnostic request shape consumed by the query orchestrator (§4.5, §6.3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported query languages (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Hi,
    Ta,
}

impl Language {
    /// Parse a wire-format string, used by [`RawRequest`] validation where a
    /// bad value must become a `refusal_invalid_request`, not a parse error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "en" => Some(Language::En),
            "hi" => Some(Language::Hi),
            "ta" => Some(Language::Ta),
            _ => None,
        }
    }
}

/// Client channel that originated the request (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Web,
    Sms,
    Voice,
}

impl Channel {
    /// Parse a wire-format string, used by [`RawRequest`] validation where a
    /// bad value must become a `refusal_invalid_request`, not a parse error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "web" => Some(Channel::Web),
            "sms" => Some(Channel::Sms),
            "voice" => Some(Channel::Voice),
            _ => None,
        }
    }
}

/// A single inbound question, independent of the transport that carried it.
///
/// `request_id` is generated by [`Request::normalize`] when absent;
/// `asr_confidence` is required when `channel == Voice` — its *absence* is a
/// shape violation (`refusal_invalid_request`), distinct from a present but
/// low value (`refusal_asr_low_confidence`) — see §8 boundary behaviors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub language: Language,
    pub channel: Channel,
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub raw_k: Option<usize>,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    #[serde(default)]
    pub asr_confidence: Option<f32>,
    #[serde(default)]
    pub region: Option<String>,
}

impl Request {
    /// Assign a fresh `request_id` if the caller didn't supply one.
    pub fn normalize(mut self) -> Self {
        if self.request_id.is_none() {
            self.request_id = Some(Uuid::new_v4().to_string());
        }
        self
    }

    pub fn request_id(&self) -> &str {
        self.request_id.as_deref().unwrap_or_default()
    }

    /// Validate and convert permissive wire input into a typed `Request`.
    /// `language`/`channel` are closed enums with no catch-all, so a line
    /// with a missing or unrecognized value can't be represented as one —
    /// that's a shape violation (`refusal_invalid_request`), not a parse
    /// failure to be dropped silently (§4.5 step 1, §7).
    pub fn from_raw(raw: RawRequest) -> Result<Self, String> {
        let query = raw.query.unwrap_or_default();
        let language = raw.language.as_deref().and_then(Language::parse);
        let channel = raw.channel.as_deref().and_then(Channel::parse);
        match (language, channel) {
            (Some(language), Some(channel)) if !query.trim().is_empty() => Ok(Request {
                request_id: raw.request_id,
                session_id: raw.session_id,
                language,
                channel,
                query,
                top_k: raw.top_k,
                raw_k: raw.raw_k,
                filters: raw.filters,
                asr_confidence: raw.asr_confidence,
                region: raw.region,
            }),
            _ => Err("refusal_invalid_request".to_string()),
        }
    }
}

/// Loosely-typed mirror of [`Request`] for deserializing wire input whose
/// shape hasn't been validated yet. `language`/`channel` stay `String` here
/// so a bad or missing value can reach [`Request::from_raw`] as data instead
/// of failing `serde_json::from_str` before any request exists to respond to.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub raw_k: Option<usize>,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    #[serde(default)]
    pub asr_confidence: Option<f32>,
    #[serde(default)]
    pub region: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_accepts_well_formed_input() {
        let raw = RawRequest {
            request_id: None,
            session_id: None,
            language: Some("en".to_string()),
            channel: Some("web".to_string()),
            query: Some("Where do I apply?".to_string()),
            top_k: None,
            raw_k: None,
            filters: BTreeMap::new(),
            asr_confidence: None,
            region: None,
        };
        let request = Request::from_raw(raw).unwrap();
        assert_eq!(request.language, Language::En);
        assert_eq!(request.channel, Channel::Web);
    }

    #[test]
    fn from_raw_rejects_unrecognized_language() {
        let raw = RawRequest {
            request_id: None,
            session_id: None,
            language: Some("fr".to_string()),
            channel: Some("web".to_string()),
            query: Some("Where do I apply?".to_string()),
            top_k: None,
            raw_k: None,
            filters: BTreeMap::new(),
            asr_confidence: None,
            region: None,
        };
        assert_eq!(Request::from_raw(raw).unwrap_err(), "refusal_invalid_request");
    }

    #[test]
    fn from_raw_rejects_missing_channel() {
        let raw = RawRequest {
            request_id: None,
            session_id: None,
            language: Some("en".to_string()),
            channel: None,
            query: Some("Where do I apply?".to_string()),
            top_k: None,
            raw_k: None,
            filters: BTreeMap::new(),
            asr_confidence: None,
            region: None,
        };
        assert_eq!(Request::from_raw(raw).unwrap_err(), "refusal_invalid_request");
    }

    #[test]
    fn from_raw_rejects_blank_query() {
        let raw = RawRequest {
            request_id: None,
            session_id: None,
            language: Some("en".to_string()),
            channel: Some("web".to_string()),
            query: Some("   ".to_string()),
            top_k: None,
            raw_k: None,
            filters: BTreeMap::new(),
            asr_confidence: None,
            region: None,
        };
        assert_eq!(Request::from_raw(raw).unwrap_err(), "refusal_invalid_request");
    }
}
