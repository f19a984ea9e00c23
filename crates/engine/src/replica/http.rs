//! HTTP replica: stores blobs and backup records on a REST endpoint.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime.
//!
//! - `GET  {base_url}/health` connectivity probe
//! - `PUT  {base_url}/blobs/{key}` raw blob upload
//! - `GET  {base_url}/blobs/{key}` blob download, 404 means absent
//! - `POST {base_url}/backups` backup record upsert (JSON)

use async_trait::async_trait;
use safekeep_core::BackupRecord;

use super::{RemoteReplica, ReplicaError};

pub struct HttpReplica {
    id: String,
    base_url: String,
    auth_token: Option<String>,
    agent: ureq::Agent,
}

impl HttpReplica {
    pub fn new(id: &str, base_url: &str, auth_token: Option<String>) -> Self {
        HttpReplica {
            id: id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn bearer(&self) -> Option<String> {
        self.auth_token.as_ref().map(|t| format!("Bearer {t}"))
    }

    fn map_err(replica: &str, e: ureq::Error) -> ReplicaError {
        match e {
            ureq::Error::StatusCode(status) => ReplicaError::Status {
                replica: replica.to_string(),
                status,
            },
            other => ReplicaError::Request {
                replica: replica.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Run a blocking request off the runtime.
    async fn blocking<T, F>(&self, f: F) -> Result<T, ReplicaError>
    where
        T: Send + 'static,
        F: FnOnce(ureq::Agent, Option<String>) -> Result<T, ReplicaError> + Send + 'static,
    {
        let agent = self.agent.clone();
        let bearer = self.bearer();
        tokio::task::spawn_blocking(move || f(agent, bearer))
            .await
            .map_err(|e| ReplicaError::Request {
                replica: self.id.clone(),
                message: format!("task join error: {e}"),
            })?
    }
}

#[async_trait]
impl RemoteReplica for HttpReplica {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_connected(&self) -> bool {
        let url = self.url("health");
        let id = self.id.clone();
        self.blocking(move |agent, bearer| {
            let mut request = agent.get(&url);
            if let Some(ref b) = bearer {
                request = request.header("Authorization", b);
            }
            request.call().map(|_| ()).map_err(|e| Self::map_err(&id, e))
        })
        .await
        .is_ok()
    }

    async fn upload_blob(&self, key: &str, blob: &[u8]) -> Result<(), ReplicaError> {
        let url = self.url(&format!("blobs/{key}"));
        let id = self.id.clone();
        let body = blob.to_vec();
        self.blocking(move |agent, bearer| {
            let mut request = agent
                .put(&url)
                .header("Content-Type", "application/octet-stream");
            if let Some(ref b) = bearer {
                request = request.header("Authorization", b);
            }
            request
                .send(&body[..])
                .map(|_| ())
                .map_err(|e| Self::map_err(&id, e))
        })
        .await
    }

    async fn download_blob(&self, key: &str) -> Result<Option<Vec<u8>>, ReplicaError> {
        let url = self.url(&format!("blobs/{key}"));
        let id = self.id.clone();
        self.blocking(move |agent, bearer| {
            let mut request = agent.get(&url);
            if let Some(ref b) = bearer {
                request = request.header("Authorization", b);
            }
            match request.call() {
                Ok(response) => response
                    .into_body()
                    .read_to_vec()
                    .map(Some)
                    .map_err(|e| Self::map_err(&id, e)),
                Err(ureq::Error::StatusCode(404)) => Ok(None),
                Err(e) => Err(Self::map_err(&id, e)),
            }
        })
        .await
    }

    async fn upsert_metadata(&self, record: &BackupRecord) -> Result<(), ReplicaError> {
        let url = self.url("backups");
        let id = self.id.clone();
        let record = record.clone();
        self.blocking(move |agent, bearer| {
            let mut request = agent.post(&url);
            if let Some(ref b) = bearer {
                request = request.header("Authorization", b);
            }
            request
                .send_json(&record)
                .map(|_| ())
                .map_err(|e| Self::map_err(&id, e))
        })
        .await
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_cleanly() {
        let r = HttpReplica::new("cloud", "https://backup.example.com/api/", None);
        assert_eq!(r.url("/blobs/k"), "https://backup.example.com/api/blobs/k");
        assert_eq!(r.url("health"), "https://backup.example.com/api/health");
    }

    #[test]
    fn bearer_header_from_token() {
        let r = HttpReplica::new("cloud", "http://x", Some("tok".into()));
        assert_eq!(r.bearer().as_deref(), Some("Bearer tok"));
        assert_eq!(HttpReplica::new("c", "http://x", None).bearer(), None);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_disconnected() {
        // Port 9 (discard) on localhost is closed in test environments.
        let r = HttpReplica::new("cloud", "http://127.0.0.1:9", None);
        assert!(!r.is_connected().await);
        assert!(r.upload_blob("k", b"v").await.is_err());
    }
}
