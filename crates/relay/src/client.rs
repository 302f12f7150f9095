//! HTTP client for a remote runner gateway.
//!
//! Talks to the runner's session and deploy endpoints. Streaming responses
//! are relayed as raw byte chunks over a channel; parsing (or not) is the
//! caller's choice of relay mode.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use paperstack_core::error::RelayError;

use crate::passthrough::forward_raw;

/// Raw relayed stream chunks. Chunk boundaries carry no meaning.
pub type ByteStream = mpsc::Receiver<Result<Vec<u8>, RelayError>>;

/// Response body from session creation on the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedSession {
    pub session_id: String,
    pub repo_url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Request body for a deployment run.
///
/// Either `repo_url` or a `paper_id`/`project_id` pair identifies the
/// repository; the runner validates which.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

/// Client for a remote runner's HTTP surface.
#[derive(Clone)]
pub struct RunnerClient {
    base_url: String,
    client: reqwest::Client,
}

impl RunnerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            // Deploy streams stay open for minutes; bound only connection setup
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Create a remote coding session for a repository.
    pub async fn create_session(&self, repo_url: &str) -> Result<CreatedSession, RelayError> {
        let url = format!("{}/v1/sessions", self.base_url);
        debug!(repo_url, "Creating remote session");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "repo_url": repo_url }))
            .send()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 201 {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Upstream(format!(
                "Runner returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RelayError::Malformed(e.to_string()))
    }

    /// Send a message to a session; returns the raw agent event stream.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<ByteStream, RelayError> {
        let url = format!("{}/v1/sessions/{}/messages", self.base_url, session_id);
        debug!(session_id, "Relaying message to remote session");

        let response = self
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Upstream(format!(
                "Runner returned {status}: {body}"
            )));
        }

        Ok(Self::relay_body(response))
    }

    /// Start a deployment run; returns the raw deploy event stream.
    pub async fn deploy(&self, request: &DeployRequest) -> Result<ByteStream, RelayError> {
        let url = format!("{}/v1/deploy", self.base_url);
        debug!(repo_url = ?request.repo_url, paper_id = ?request.paper_id, "Relaying deploy request");

        let response = self
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Upstream(format!(
                "Runner returned {status}: {body}"
            )));
        }

        Ok(Self::relay_body(response))
    }

    /// Tear down a session. The runner answers 204 whether or not the id
    /// still exists, so only transport failures are errors here.
    pub async fn terminate_session(&self, session_id: &str) -> Result<(), RelayError> {
        let url = format!("{}/v1/sessions/{}", self.base_url, session_id);
        debug!(session_id, "Terminating remote session");

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 204 && status != 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Upstream(format!(
                "Runner returned {status}: {body}"
            )));
        }
        Ok(())
    }

    fn relay_body(response: reqwest::Response) -> ByteStream {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let upstream = response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec()));
            forward_raw(upstream, tx).await;
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_trims_trailing_slash() {
        let client = RunnerClient::new("http://127.0.0.1:41601/");
        assert_eq!(client.base_url, "http://127.0.0.1:41601");
    }

    #[test]
    fn deploy_request_skips_absent_fields() {
        let request = DeployRequest {
            repo_url: Some("https://github.com/user/repo".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"repo_url":"https://github.com/user/repo"}"#);
    }

    #[test]
    fn deploy_request_with_paper_reference() {
        let request = DeployRequest {
            paper_id: Some("2601.00123".into()),
            project_id: Some("proj-1".into()),
            task: Some("Run the benchmark suite".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("2601.00123"));
        assert!(json.contains("proj-1"));
        assert!(!json.contains("repo_url"));
    }

    #[test]
    fn created_session_parses_runner_response() {
        let session: CreatedSession = serde_json::from_str(
            r#"{
                "session_id": "0b2f4a1e-9c8d-4f3a-b1e2-7d6c5a4b3f2e",
                "repo_url": "https://github.com/user/repo",
                "created_at": "2026-08-24T10:30:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(session.repo_url, "https://github.com/user/repo");
        assert!(session.session_id.starts_with("0b2f4a1e"));
    }
}
