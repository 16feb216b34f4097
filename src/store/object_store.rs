//! Object Store (OS): versioned, content-addressed key-value bytes with
//! atomic-put semantics (§2, §5, §6.1).

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;

/// External collaborator abstraction so the materializer and indexer never
/// care whether bytes live on local disk or in an S3-compatible bucket
/// (§9 "Cyclic graphs / global state" — explicit collaborator handle
/// instead of a process-wide client).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Atomic put: readers never observe a partially written object.
    async fn put_atomic(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Local-filesystem backed store: write to a sibling `.tmp`, fsync, rename
/// (§4.2 "Atomic write").
pub struct LocalObjectStore {
    root: std::path::PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> std::path::PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.resolve(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn put_atomic(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let dest = self.resolve(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = dest.with_extension(format!(
            "tmp.{}.{}",
            std::process::id(),
            chrono::Utc::now().timestamp_millis()
        ));

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp_path, &dest).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(e));
        }
        Ok(())
    }
}

/// Minimal REST client against an S3-compatible object store (path-style
/// addressing). Atomic put is put-to-temp-key, copy-to-final (re-PUT),
/// delete-temp, with linear-backoff retries up to `PUT_RETRIES` (§4.2,
/// §5 "Retries") — there is no precedent for the full `aws-sdk-s3` crate
/// in this codebase's dependency stack, so this stays a thin `reqwest`
/// client rather than pulling in an unrelated SDK (see `DESIGN.md`).
pub struct S3ObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    put_retries: u32,
    put_backoff: std::time::Duration,
}

impl S3ObjectStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        put_retries: u32,
        put_backoff: std::time::Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            put_retries,
            put_backoff,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint.trim_end_matches('/'), self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let response = self.client.get(self.object_url(key)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.bytes().await?.to_vec()))
    }

    async fn put_atomic(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp_key = format!(
            "{key}.tmp.{}.{}",
            std::process::id(),
            chrono::Utc::now().timestamp_millis()
        );

        let mut last_err = None;
        for attempt in 0..self.put_retries.max(1) {
            match self
                .client
                .put(self.object_url(&tmp_key))
                .body(bytes.to_vec())
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
            {
                Ok(_) => {
                    last_err = None;
                    break;
                }
                Err(e) => {
                    last_err = Some(e);
                    tokio::time::sleep(self.put_backoff * (attempt + 1)).await;
                }
            }
        }
        if let Some(e) = last_err {
            return Err(StoreError::PutExhausted {
                attempts: self.put_retries,
                reason: e.to_string(),
            });
        }

        let copy_result = self
            .client
            .put(self.object_url(key))
            .body(bytes.to_vec())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        // Best-effort cleanup of the temp key regardless of outcome.
        let _ = self.client.delete(self.object_url(&tmp_key)).send().await;

        copy_result.map(|_| ()).map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.put_atomic("a/b.json", b"hello").await.unwrap();
        let got = store.get("a/b.json").await.unwrap();
        assert_eq!(got, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn local_store_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn local_store_leaves_no_tmp_file_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.put_atomic("doc.jsonl", b"{}").await.unwrap();
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(e) = entries.next_entry().await.unwrap() {
            names.push(e.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["doc.jsonl"]);
    }
}
