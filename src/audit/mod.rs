//! Audit Sink (AUD): one best-effort JSON record per request (§4.6).

use chrono::Utc;

use crate::store::ObjectStore;
use crate::types::AuditRecord;

/// Write `record` to `<audit_prefix>/<YYYY-MM-DD>/<request_id>.json`.
///
/// When `audit_prefix` is unset, or the write fails, the failure is logged
/// and swallowed — it never propagates to the response (§4.6, §7 kind (g)
/// is the only audit-adjacent resolution; audit itself is non-fatal).
pub async fn write(store: &dyn ObjectStore, audit_prefix: Option<&str>, record: &AuditRecord) {
    let Some(prefix) = audit_prefix else {
        tracing::debug!(request_id = %record.request_id, "audit sink not configured, skipping");
        return;
    };

    let date = Utc::now().format("%Y-%m-%d");
    let key = format!("{prefix}/{date}/{}.json", record.request_id);

    let bytes = match serde_json::to_vec(record) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %record.request_id, error = %e, "failed to serialize audit record");
            return;
        }
    };

    if let Err(e) = store.put_atomic(&key, &bytes).await {
        tracing::warn!(request_id = %record.request_id, error = %e, "failed to write audit record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalObjectStore;

    fn sample_record() -> AuditRecord {
        AuditRecord {
            request_id: "r1".into(),
            session_id: None,
            language: "en".into(),
            channel: "web".into(),
            query: "How do I apply?".into(),
            used_chunk_ids: vec!["doc1_c0001".into()],
            top_similarity: 0.8,
            resolution: "answer".into(),
            generator_decision: None,
            timing_ms: 12,
            guidance_key: None,
        }
    }

    #[tokio::test]
    async fn writes_record_under_date_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let record = sample_record();
        write(&store, Some("audit"), &record).await;

        let date = Utc::now().format("%Y-%m-%d");
        let key = format!("audit/{date}/r1.json");
        assert!(store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn skips_silently_without_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        write(&store, None, &sample_record()).await;
        // No panic, no write attempted; nothing further to assert.
    }
}
