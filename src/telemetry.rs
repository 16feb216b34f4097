//! Structured logging setup.
//!
//! Binaries call [`init`] once at startup. Every component logs through
//! `tracing` spans/events with structured fields (`request_id`,
//! `document_id`, `chunk_id`, ...) rather than ad-hoc string formatting, so
//! the JSON layer emits one parseable record per line in production.

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` (standard `EnvFilter` syntax) controls verbosity; defaults to
/// `info,civic_rag=debug` when unset.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,civic_rag=debug"))
        .unwrap();

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    match format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_target(true))
                .init();
        }
        LogFormat::Pretty => {
            registry
                .with(tracing_subscriber::fmt::layer().with_target(false))
                .init();
        }
    }
}
