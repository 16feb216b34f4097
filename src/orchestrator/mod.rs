//! Query Orchestrator (QO): the sole component where policy lives. Takes a
//! channel-agnostic [`Request`] to a [`Response`] through a strictly
//! sequential pipeline (§4.5).

pub mod policy;

use std::time::Instant;

use regex::Regex;
use std::sync::LazyLock;

use crate::audit;
use crate::clients::generator::{GenerateRequest, GenerateResponse};
use crate::retrieve::{self, RetrieverConfig};
use crate::types::response::{AnswerLine, Citation, Resolution};
use crate::types::{AuditRecord, Channel, RawRequest, Request, Response};
use crate::Core;

/// Trailing `[n]` citation marker, `n >= 1` (§4.5 step 6).
static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+)\]\s*$").unwrap());

const DISALLOWED_SUBSTRINGS: &[&str] = &["http://", "https://", "www.", "file://"];

/// Entry point for unvalidated wire input — `serve.rs` reads a line of JSON
/// off stdin and hands it here before any typed `Request` exists. `language`
/// and `channel` are closed enums with no catch-all, so a bad value can't
/// survive `serde_json::from_str::<Request>`; deserializing into the
/// permissive [`RawRequest`] first means a bad value becomes the same
/// `refusal_invalid_request` response `validate_shape` produces for a typed
/// request, instead of a line silently dropped with no response at all
/// (§4.5 step 1, §7 invariant: every request gets exactly one response).
pub async fn handle_raw(core: &Core, raw: RawRequest) -> Response {
    let started = Instant::now();
    let request_id = raw.request_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let session_id = raw.session_id.clone();
    let language = raw.language.clone().unwrap_or_default();
    let channel = raw.channel.clone().unwrap_or_default();
    let query = raw.query.clone().unwrap_or_default();

    let guidance_key = match Request::from_raw(raw) {
        Ok(request) => return handle(core, request).await,
        Err(guidance_key) => guidance_key,
    };

    let resolution = Resolution::Refusal { guidance_key: guidance_key.clone() };
    let record = AuditRecord {
        request_id: request_id.clone(),
        session_id,
        language,
        channel,
        query,
        used_chunk_ids: Vec::new(),
        top_similarity: 0.0,
        resolution: resolution.label().to_string(),
        generator_decision: None,
        timing_ms: started.elapsed().as_millis() as u64,
        guidance_key: Some(guidance_key),
    };
    audit::write(core.object_store.as_ref(), core.config.audit_prefix.as_deref(), &record).await;

    Response { request_id, resolution }
}

/// Run one request through the full pipeline: validate shape, ASR gate,
/// intent blocklist, retrieve, generate, validate output, hydrate
/// citations, audit, respond (§4.5, §5 ordering guarantees).
pub async fn handle(core: &Core, request: Request) -> Response {
    let started = Instant::now();
    let request = request.normalize();
    let request_id = request.request_id().to_string();

    if let Err(guidance_key) = validate_shape(&request) {
        return finish(core, &request, started, Resolution::Refusal { guidance_key }, None, 0.0).await;
    }

    if request.channel == Channel::Voice {
        match request.asr_confidence {
            None => {
                return finish(
                    core,
                    &request,
                    started,
                    Resolution::Refusal { guidance_key: "refusal_invalid_request".to_string() },
                    None,
                    0.0,
                )
                .await;
            }
            Some(confidence) if confidence < core.config.asr_conf_threshold => {
                return finish(
                    core,
                    &request,
                    started,
                    Resolution::Refusal { guidance_key: "refusal_asr_low_confidence".to_string() },
                    None,
                    0.0,
                )
                .await;
            }
            Some(_) => {}
        }
    }

    if let Some(guidance_key) = policy::classify(&request.query) {
        return finish(
            core,
            &request,
            started,
            Resolution::Refusal { guidance_key: guidance_key.to_string() },
            None,
            0.0,
        )
        .await;
    }

    let retriever_config = RetrieverConfig {
        raw_k: request.raw_k.unwrap_or(50),
        final_k: request.top_k.unwrap_or(core.config.final_k),
        embed_dim: core.config.embed_dim,
        freshness_days: core.config.freshness_days,
    };

    let retrieval_fut = retrieve::retrieve(
        core.embedder.as_ref(),
        core.vector_store.as_ref(),
        &request.query,
        &request.filters,
        &retriever_config,
    );
    tokio::pin!(retrieval_fut);
    let retrieval = match await_with_soft_budget(
        retrieval_fut.as_mut(),
        core.config.embed_search_budget,
        "retrieval exceeded EMBED_SEARCH_BUDGET_SEC, call continues",
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = %e, "retrieval failed");
            return finish(core, &request, started, Resolution::NotEnoughInfo, None, 0.0).await;
        }
    };

    if retrieval.passages.is_empty() || retrieval.top_similarity < core.config.min_similarity {
        return finish(
            core,
            &request,
            started,
            Resolution::NotEnoughInfo,
            None,
            retrieval.top_similarity,
        )
        .await;
    }

    let gen_request = GenerateRequest {
        request_id: &request_id,
        language: language_code(request.language),
        question: &request.query,
        passages: &retrieval.passages,
    };

    let gen_fut = core.generator.generate(gen_request);
    tokio::pin!(gen_fut);
    let gen_response = match await_with_soft_budget(
        gen_fut.as_mut(),
        core.config.gen_budget,
        "generation exceeded GEN_BUDGET_SEC, call continues",
    )
    .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "generation failed");
            return finish(
                core,
                &request,
                started,
                Resolution::InvalidOutput,
                None,
                retrieval.top_similarity,
            )
            .await;
        }
    };

    let max_pass = retrieval.passages.len() as u32;
    let resolution = validate_generator_output(gen_response, max_pass);

    let citations: Vec<Citation> = retrieval
        .passages
        .iter()
        .map(|p| Citation {
            citation: p.number,
            chunk_id: p.chunk_id.clone(),
            source_url: p.source_url.clone(),
            meta: p.meta.clone(),
        })
        .collect();

    let resolution = match resolution {
        Resolution::Answer { answer_lines, .. } => Resolution::Answer {
            answer_lines,
            citations,
            confidence: retrieval.top_similarity,
        },
        other => other,
    };

    let used_chunk_ids = retrieval.passages.iter().map(|p| p.chunk_id.clone()).collect();
    finish(core, &request, started, resolution, Some(used_chunk_ids), retrieval.top_similarity).await
}

/// Await `fut` to completion, logging `warn_message` once if it is still
/// pending after `budget` elapses — a *soft* budget (§4.5 steps 4-5): unlike
/// `tokio::time::timeout`, the wrapped future is never cancelled, so a slow
/// collaborator still gets to finish and its real result is used.
async fn await_with_soft_budget<F: std::future::Future>(
    mut fut: std::pin::Pin<&mut F>,
    budget: std::time::Duration,
    warn_message: &str,
) -> F::Output {
    let mut warned = false;
    loop {
        tokio::select! {
            biased;
            result = &mut fut => return result,
            _ = tokio::time::sleep(budget), if !warned => {
                warned = true;
                tracing::warn!("{warn_message}");
            }
        }
    }
}

/// `{resolution:"refusal", guidance_key:"refusal_invalid_request"}` on any
/// shape violation (§4.5 step 1).
fn validate_shape(request: &Request) -> Result<(), String> {
    if request.query.trim().is_empty() {
        return Err("refusal_invalid_request".to_string());
    }
    Ok(())
}

fn language_code(language: crate::types::Language) -> &'static str {
    match language {
        crate::types::Language::En => "en",
        crate::types::Language::Hi => "hi",
        crate::types::Language::Ta => "ta",
    }
}

fn channel_code(channel: Channel) -> &'static str {
    match channel {
        Channel::Web => "web",
        Channel::Sms => "sms",
        Channel::Voice => "voice",
    }
}

/// Decide the resolution from the generator's raw response (§4.5 step 6).
fn validate_generator_output(response: GenerateResponse, max_pass: u32) -> Resolution {
    let raw_lines: Vec<String> = match response {
        GenerateResponse::Text { text } if text.trim() == "NOT_ENOUGH_INFORMATION" => {
            return Resolution::NotEnoughInfo;
        }
        GenerateResponse::Text { text } => vec![text],
        GenerateResponse::Lines { answer_lines } => {
            answer_lines.into_iter().map(|l| l.text).collect()
        }
    };

    let mut lines = Vec::new();
    for raw in raw_lines {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let Some(captures) = CITATION_RE.captures(line) else {
            return Resolution::InvalidOutput;
        };
        let n: u32 = match captures[1].parse() {
            Ok(n) => n,
            Err(_) => return Resolution::InvalidOutput,
        };
        if n < 1 || n > max_pass {
            return Resolution::InvalidOutput;
        }
        if DISALLOWED_SUBSTRINGS.iter().any(|s| line.contains(s)) {
            return Resolution::InvalidOutput;
        }

        lines.push(AnswerLine { text: line.to_string() });
    }

    if lines.is_empty() {
        return Resolution::InvalidOutput;
    }

    Resolution::Answer { answer_lines: lines, citations: Vec::new(), confidence: 0.0 }
}

async fn finish(
    core: &Core,
    request: &Request,
    started: Instant,
    resolution: Resolution,
    used_chunk_ids: Option<Vec<String>>,
    top_similarity: f32,
) -> Response {
    let record = AuditRecord {
        request_id: request.request_id().to_string(),
        session_id: request.session_id.clone(),
        language: language_code(request.language).to_string(),
        channel: channel_code(request.channel).to_string(),
        query: request.query.clone(),
        used_chunk_ids: used_chunk_ids.unwrap_or_default(),
        top_similarity,
        resolution: resolution.label().to_string(),
        generator_decision: None,
        timing_ms: started.elapsed().as_millis() as u64,
        guidance_key: resolution.guidance_key().map(str::to_string),
    };
    audit::write(core.object_store.as_ref(), core.config.audit_prefix.as_deref(), &record).await;

    Response { request_id: request.request_id().to_string(), resolution }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::generator::GeneratedLine;

    #[test]
    fn valid_citation_line_accepted() {
        let response = GenerateResponse::Lines {
            answer_lines: vec![GeneratedLine { text: "Apply at the portal. [1]".to_string() }],
        };
        let resolution = validate_generator_output(response, 1);
        assert!(matches!(resolution, Resolution::Answer { .. }));
    }

    #[test]
    fn missing_citation_is_invalid() {
        let response = GenerateResponse::Text { text: "Apply at the portal.".to_string() };
        let resolution = validate_generator_output(response, 1);
        assert!(matches!(resolution, Resolution::InvalidOutput));
    }

    #[test]
    fn citation_out_of_range_is_invalid() {
        let response = GenerateResponse::Text { text: "Apply at the portal. [5]".to_string() };
        let resolution = validate_generator_output(response, 1);
        assert!(matches!(resolution, Resolution::InvalidOutput));
    }

    #[test]
    fn disallowed_url_substring_is_invalid() {
        let response = GenerateResponse::Text { text: "See https://example.gov/apply [1]".to_string() };
        let resolution = validate_generator_output(response, 1);
        assert!(matches!(resolution, Resolution::InvalidOutput));
    }

    #[test]
    fn literal_not_enough_information_short_circuits() {
        let response = GenerateResponse::Text { text: "NOT_ENOUGH_INFORMATION".to_string() };
        let resolution = validate_generator_output(response, 3);
        assert!(matches!(resolution, Resolution::NotEnoughInfo));
    }

    // Full-pipeline tests against a real `Core`, built from the in-memory
    // test doubles (§8 scenarios 1-5). Scenario 6 ("idempotent chunking")
    // is covered by `materialize::tests`.
    mod e2e {
        use std::collections::BTreeMap;
        use std::sync::Arc;
        use std::time::Duration;

        use sqlx::SqlitePool;

        use crate::clients::embedder::mock::MockEmbedder;
        use crate::clients::generator::mock::FixedGenerator;
        use crate::clients::generator::{GeneratedLine, GenerateResponse};
        use crate::config::{Config, LogFormat, StorageBackend};
        use crate::store::{LocalObjectStore, SqliteVectorRowStore, VectorRowStore};
        use crate::types::chunk::{SemanticRegion, TokenRange};
        use crate::types::{Channel, IndexRow, Language, RawRequest, Request};
        use crate::Core;

        const EMBED_DIM: usize = 4;

        fn test_config() -> Config {
            Config {
                storage: StorageBackend::Local,
                s3_bucket: None,
                raw_prefix: "raw".into(),
                chunked_prefix: "chunked".into(),
                audit_prefix: None,
                chunked_schema_version: "chunked_v1".into(),
                parser_version: "test-1".into(),
                min_tokens_per_chunk: 100,
                max_tokens_per_chunk: 512,
                overlap_sentences: 2,
                embed_dim: EMBED_DIM,
                raw_k: 10,
                final_k: 5,
                min_similarity: 0.0,
                freshness_days: None,
                asr_conf_threshold: 0.5,
                embed_search_budget: Duration::from_secs(5),
                gen_budget: Duration::from_secs(5),
                batch_size: 32,
                put_retries: 3,
                put_backoff: Duration::from_millis(10),
                force_overwrite: false,
                database_url: "sqlite::memory:".into(),
                embedder_url: "http://unused".into(),
                generator_url: "http://unused".into(),
                log_format: LogFormat::Json,
            }
        }

        fn sample_row(chunk_id: &str, text: &str) -> IndexRow {
            IndexRow {
                chunk_id: chunk_id.to_string(),
                document_id: "doc1".to_string(),
                content: text.to_string(),
                embedding: Vec::new(),
                meta: serde_json::json!({"trust_level": "gov"}),
                token_count: 5,
                token_range: TokenRange { start: 0, end: 5 },
                document_total_tokens: 50,
                semantic_region: SemanticRegion::Middle,
                source_url: Some("https://example.gov/apply".to_string()),
                page_number: None,
                language: Some("en".to_string()),
                ingest_time: "2026-01-01T00:00:00Z".to_string(),
                parser_version: "test-1".to_string(),
            }
        }

        async fn seeded_store(texts: &[(&str, &str)]) -> SqliteVectorRowStore {
            let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
            let store = SqliteVectorRowStore::new(pool);
            store.ensure_schema(EMBED_DIM).await.unwrap();

            let embedder = MockEmbedder { dim: EMBED_DIM };
            let mut rows = Vec::new();
            for (chunk_id, text) in texts {
                let mut row = sample_row(chunk_id, text);
                row.embedding = crate::clients::Embedder::embed(&embedder, text).await.unwrap();
                rows.push(row);
            }
            store.insert_batch(&rows).await.unwrap();
            store
        }

        fn base_request(query: &str, channel: Channel) -> Request {
            Request {
                request_id: None,
                session_id: None,
                language: Language::En,
                channel,
                query: query.to_string(),
                top_k: None,
                raw_k: None,
                filters: BTreeMap::new(),
                asr_confidence: None,
                region: None,
            }
        }

        fn core_with(
            vrs: SqliteVectorRowStore,
            generator_response: GenerateResponse,
        ) -> (Core, tempfile::TempDir) {
            let dir = tempfile::tempdir().unwrap();
            let core = Core::new(
                test_config(),
                Arc::new(LocalObjectStore::new(dir.path())),
                Arc::new(vrs),
                Arc::new(MockEmbedder { dim: EMBED_DIM }),
                Arc::new(FixedGenerator { response: generator_response }),
            );
            (core, dir)
        }

        #[tokio::test]
        async fn happy_path_returns_answer_with_citations() {
            let vrs = seeded_store(&[("doc1_c0001", "Apply for the ration card at the district office. [1]")]).await;
            let (core, _tmp) = core_with(
                vrs,
                GenerateResponse::Lines {
                    answer_lines: vec![GeneratedLine {
                        text: "Apply at the district office. [1]".to_string(),
                    }],
                },
            );

            let response = handle(&core, base_request("Where do I apply for a ration card?", Channel::Web)).await;
            match response.resolution {
                Resolution::Answer { answer_lines, citations, .. } => {
                    assert_eq!(answer_lines.len(), 1);
                    assert_eq!(citations.len(), 1);
                    assert_eq!(citations[0].chunk_id, "doc1_c0001");
                }
                other => panic!("expected Answer, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn empty_store_yields_not_enough_info() {
            let vrs = seeded_store(&[]).await;
            let (core, _tmp) = core_with(vrs, GenerateResponse::not_enough_information());

            let response = handle(&core, base_request("Where do I apply for a ration card?", Channel::Web)).await;
            assert!(matches!(response.resolution, Resolution::NotEnoughInfo));
        }

        #[tokio::test]
        async fn medical_query_is_refused_before_retrieval() {
            let vrs = seeded_store(&[("doc1_c0001", "some civic text")]).await;
            let (core, _tmp) = core_with(
                vrs,
                GenerateResponse::Lines { answer_lines: vec![GeneratedLine { text: "should never run. [1]".into() }] },
            );

            let response = handle(&core, base_request("What dosage of ibuprofen should I take?", Channel::Web)).await;
            match response.resolution {
                Resolution::Refusal { guidance_key } => assert_eq!(guidance_key, "refusal_medical"),
                other => panic!("expected Refusal, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn voice_without_asr_confidence_is_invalid_request() {
            let vrs = seeded_store(&[]).await;
            let (core, _tmp) = core_with(vrs, GenerateResponse::not_enough_information());

            let mut request = base_request("Where do I apply?", Channel::Voice);
            request.asr_confidence = None;
            let response = handle(&core, request).await;
            match response.resolution {
                Resolution::Refusal { guidance_key } => assert_eq!(guidance_key, "refusal_invalid_request"),
                other => panic!("expected Refusal, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn voice_below_asr_threshold_is_low_confidence_refusal() {
            let vrs = seeded_store(&[]).await;
            let (core, _tmp) = core_with(vrs, GenerateResponse::not_enough_information());

            let mut request = base_request("Where do I apply?", Channel::Voice);
            request.asr_confidence = Some(0.1);
            let response = handle(&core, request).await;
            match response.resolution {
                Resolution::Refusal { guidance_key } => assert_eq!(guidance_key, "refusal_asr_low_confidence"),
                other => panic!("expected Refusal, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn generator_output_missing_citation_is_invalid_output() {
            let vrs = seeded_store(&[("doc1_c0001", "Apply for the ration card at the district office.")]).await;
            let (core, _tmp) = core_with(
                vrs,
                GenerateResponse::Text { text: "Apply at the district office.".to_string() },
            );

            let response = handle(&core, base_request("Where do I apply for a ration card?", Channel::Web)).await;
            assert!(matches!(response.resolution, Resolution::InvalidOutput));
        }

        #[tokio::test]
        async fn raw_request_with_unrecognized_language_is_refused_not_dropped() {

            let vrs = seeded_store(&[]).await;
            let (core, _tmp) = core_with(vrs, GenerateResponse::not_enough_information());

            let raw = RawRequest {
                request_id: Some("req-1".to_string()),
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
            let response = handle_raw(&core, raw).await;
            assert_eq!(response.request_id, "req-1");
            match response.resolution {
                Resolution::Refusal { guidance_key } => assert_eq!(guidance_key, "refusal_invalid_request"),
                other => panic!("expected Refusal, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn raw_request_with_missing_channel_still_gets_a_request_id() {

            let vrs = seeded_store(&[]).await;
            let (core, _tmp) = core_with(vrs, GenerateResponse::not_enough_information());

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
            let response = handle_raw(&core, raw).await;
            assert!(!response.request_id.is_empty());
            assert!(matches!(response.resolution, Resolution::Refusal { .. }));
        }
    }
}
