//! Serving entry point: wires a [`Core`] and drives the query orchestrator
//! over newline-delimited JSON requests on stdin, one [`Response`] per
//! line on stdout (§1 "channel transport framing" is out of scope — this
//! is the minimal harness the spec leaves to a channel adapter).

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use civic_rag::clients::{HttpEmbedder, HttpGenerator};
use civic_rag::config::Config;
use civic_rag::orchestrator;
use civic_rag::store::{PgVectorRowStore, VectorRowStore};
use civic_rag::telemetry;
use civic_rag::types::RawRequest;
use civic_rag::Core;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    telemetry::init(config.log_format);

    let pool = sqlx::PgPool::connect(&config.database_url).await.context("connecting to vector row store")?;
    let vrs = PgVectorRowStore::new(pool);
    vrs.startup_sanity_check().await.context("vrs startup sanity check")?;

    let object_store: Arc<dyn civic_rag::store::ObjectStore> =
        Arc::new(civic_rag::store::LocalObjectStore::new("."));
    let embedder = Arc::new(HttpEmbedder::new(&config.embedder_url, config.embed_dim));
    let generator = Arc::new(HttpGenerator::new(&config.generator_url));

    let core = Core::new(config, object_store, Arc::new(vrs), embedder, generator);

    tracing::info!("civic-rag-serve ready, reading requests from stdin");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = std::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        // `RawRequest` leaves `language`/`channel` untyped, so a bad or
        // missing value here isn't a parse failure — it flows into
        // `handle_raw`, which turns it into a `refusal_invalid_request`
        // response instead of a line dropped with nothing written back.
        let raw: RawRequest = match serde_json::from_str(&line) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "dropping unparseable request line");
                continue;
            }
        };

        let response = orchestrator::handle_raw(&core, raw).await;
        let mut json = serde_json::to_string(&response).context("serializing response")?;
        json.push('\n');
        stdout.write_all(json.as_bytes())?;
        stdout.flush()?;
    }

    Ok(())
}
