//! Environment-driven configuration, loaded once at process startup.
//!
//! Mirrors the knob list the original system reads at import time, but
//! fails fast through a `Result` instead of an interpreter-level
//! `SystemExit`: [`Config::from_env`] validates everything eagerly so a
//! misconfigured deployment never gets partway through a request before
//! failing.

use std::time::Duration;

use crate::error::ConfigError;

/// Which object store backend [`crate::store::ObjectStore`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Local,
}

impl StorageBackend {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.to_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::Invalid {
                key: "STORAGE".into(),
                reason: format!("must be 's3' or 'local', got '{other}'"),
            }),
        }
    }
}

/// Fully resolved, validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub s3_bucket: Option<String>,
    pub raw_prefix: String,
    pub chunked_prefix: String,
    pub audit_prefix: Option<String>,
    pub chunked_schema_version: String,
    pub parser_version: String,

    pub min_tokens_per_chunk: usize,
    pub max_tokens_per_chunk: usize,
    pub overlap_sentences: usize,

    pub embed_dim: usize,
    pub raw_k: usize,
    pub final_k: usize,
    pub min_similarity: f32,
    pub freshness_days: Option<u32>,

    pub asr_conf_threshold: f32,
    pub embed_search_budget: Duration,
    pub gen_budget: Duration,

    pub batch_size: usize,
    pub put_retries: u32,
    pub put_backoff: Duration,
    pub force_overwrite: bool,

    pub database_url: String,
    pub embedder_url: String,
    pub generator_url: String,

    pub log_format: LogFormat,
}

/// Output format for the tracing layer; see [`crate::telemetry::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Config {
    /// Load and validate configuration from the process environment.
    ///
    /// Loads a `.env` file if present (same convenience the teacher crates
    /// use via `dotenvy`), then reads every recognized knob from §6.5,
    /// applying documented defaults and rejecting out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on a missing required variable or a value
    /// that fails to parse/validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let storage = StorageBackend::parse(&env_or("STORAGE", "local"))?;
        let s3_bucket = std::env::var("S3_BUCKET").ok();
        if storage == StorageBackend::S3 && s3_bucket.is_none() {
            return Err(ConfigError::Missing("S3_BUCKET".into()));
        }

        let min_tokens_per_chunk = parse_env("MIN_TOKENS_PER_CHUNK", 100)?;
        let max_tokens_per_chunk = parse_env("MAX_TOKENS_PER_CHUNK", 512)?;
        if min_tokens_per_chunk >= max_tokens_per_chunk {
            return Err(ConfigError::Invalid {
                key: "MIN_TOKENS_PER_CHUNK".into(),
                reason: "must be smaller than MAX_TOKENS_PER_CHUNK".into(),
            });
        }

        let min_similarity: f32 = parse_env("MIN_SIMILARITY", 0.5)?;
        if !(0.0..=1.0).contains(&min_similarity) {
            return Err(ConfigError::Invalid {
                key: "MIN_SIMILARITY".into(),
                reason: "must be in [0.0, 1.0]".into(),
            });
        }

        let asr_conf_threshold: f32 = parse_env("ASR_CONF_THRESHOLD", 0.5)?;
        if !(0.0..=1.0).contains(&asr_conf_threshold) {
            return Err(ConfigError::Invalid {
                key: "ASR_CONF_THRESHOLD".into(),
                reason: "must be in [0.0, 1.0]".into(),
            });
        }

        let freshness_days = match std::env::var("FRESHNESS_DAYS") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(raw.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
                key: "FRESHNESS_DAYS".into(),
                reason: "must be a positive integer".into(),
            })?),
            Err(_) => None,
        };

        let log_format = match env_or("LOG_FORMAT", "json").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT".into(),
                    reason: format!("must be 'json' or 'pretty', got '{other}'"),
                });
            }
        };

        Ok(Self {
            storage,
            s3_bucket,
            raw_prefix: env_or("RAW_PREFIX", "raw"),
            chunked_prefix: env_or("CHUNKED_PREFIX", "chunked"),
            audit_prefix: std::env::var("AUDIT_PREFIX").ok(),
            chunked_schema_version: env_or("CHUNKED_SCHEMA_VERSION", "chunked_v1"),
            parser_version: env_or("PARSER_VERSION", "civic-rag-chk-1"),

            min_tokens_per_chunk,
            max_tokens_per_chunk,
            overlap_sentences: parse_env("OVERLAP_SENTENCES", 2)?,

            embed_dim: parse_env("EMBED_DIM", 1024)?,
            raw_k: parse_env("RAW_K", 50)?,
            final_k: parse_env("FINAL_K", 5)?,
            min_similarity,
            freshness_days,

            asr_conf_threshold,
            embed_search_budget: Duration::from_secs_f32(parse_env("EMBED_SEARCH_BUDGET_SEC", 2.5)?),
            gen_budget: Duration::from_secs_f32(parse_env("GEN_BUDGET_SEC", 4.0)?),

            batch_size: parse_env("BATCH_SIZE", 32)?,
            put_retries: parse_env("PUT_RETRIES", 3)?,
            put_backoff: Duration::from_secs_f32(parse_env("PUT_BACKOFF_SEC", 0.3)?),
            force_overwrite: parse_env("FORCE_OVERWRITE", false)?,

            database_url: env_or("DATABASE_URL", "sqlite::memory:"),
            embedder_url: env_or("EMBEDDER_URL", "http://localhost:9000/embed"),
            generator_url: env_or("GENERATOR_URL", "http://localhost:9001/generate"),

            log_format,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            key: key.into(),
            reason: "failed to parse".into(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_rejects_unknown_value() {
        assert!(StorageBackend::parse("ftp").is_err());
        assert!(matches!(StorageBackend::parse("s3"), Ok(StorageBackend::S3)));
        assert!(matches!(StorageBackend::parse("LOCAL"), Ok(StorageBackend::Local)));
    }
}
