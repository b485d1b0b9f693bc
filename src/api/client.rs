//! HTTP client for the engine's job-execution protocol.
//!
//! Covers the three network stages of one engine interaction: readiness
//! probing, job submission, and completion polling. Submission is a single
//! non-retried POST; probing and polling are idempotent reads driven by
//! sleep-based retry loops in the callers.

use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;

use crate::api::endpoints::EngineEndpoint;
use crate::defaults;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from job submission and completion polling.
#[derive(Error, Debug)]
pub enum ExecuteError {
    /// The engine rejected the job or answered without a job identifier.
    ///
    /// Never retried internally: a blind resubmit could double-enqueue the
    /// same work. Retrying is the caller's decision.
    #[error("Job submission failed: {reason}")]
    Submission {
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The engine never reported outputs for the job within the timeout.
    ///
    /// The engine itself is left running; a long job may still complete.
    #[error("Job {job_id} produced no outputs within {timeout:?}")]
    Timeout { job_id: String, timeout: Duration },
}

pub type Result<T> = std::result::Result<T, ExecuteError>;

/// Identifier handed back by the engine for a submitted job.
///
/// Valid only against the endpoint that issued it; never reused.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: String,
    pub submitted_at: Instant,
}

/// HTTP client for a single engine's API surface.
///
/// Cheap to share: submission and polling for distinct job ids may
/// interleave freely on one instance.
#[derive(Debug, Clone)]
pub struct EngineClient {
    http: reqwest::Client,
}

impl EngineClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(defaults::REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { http }
    }

    /// Run both readiness checks against the endpoint.
    ///
    /// The engine accepts connections before its object registry has
    /// finished loading, so a single check risks declaring readiness too
    /// early. Both checks must succeed in the same iteration.
    pub async fn check_ready(&self, endpoint: &EngineEndpoint) -> bool {
        match self.http.get(endpoint.node_mappings_url()).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                log::debug!("Node mapping check returned {}", resp.status());
                return false;
            }
            Err(e) => {
                log::debug!("Node mapping check failed: {}", e);
                return false;
            }
        }

        match self.http.get(endpoint.object_info_url()).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                Ok(_) => true,
                Err(e) => {
                    log::debug!("Object info body malformed: {}", e);
                    false
                }
            },
            Ok(resp) => {
                log::debug!("Object info check returned {}", resp.status());
                false
            }
            Err(e) => {
                log::debug!("Object info check failed: {}", e);
                false
            }
        }
    }

    /// Submit a workflow graph for execution.
    ///
    /// One POST, no retries; any transport error, non-success status, or
    /// missing `prompt_id` in the response is a submission failure.
    pub async fn submit(&self, endpoint: &EngineEndpoint, prompt: &Value) -> Result<JobHandle> {
        let body = serde_json::json!({ "prompt": prompt });

        let resp = self
            .http
            .post(endpoint.prompt_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| ExecuteError::Submission {
                reason: format!("request to {} failed", endpoint),
                source: Some(e),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ExecuteError::Submission {
                reason: format!("engine returned {}", status),
                source: None,
            });
        }

        let payload: Value = resp.json().await.map_err(|e| ExecuteError::Submission {
            reason: "malformed submission response".into(),
            source: Some(e),
        })?;

        let job_id = payload
            .get("prompt_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ExecuteError::Submission {
                reason: "response carried no prompt_id".into(),
                source: None,
            })?
            .to_string();

        log::info!("Submitted job {} to {}", job_id, endpoint);

        Ok(JobHandle {
            job_id,
            submitted_at: Instant::now(),
        })
    }

    /// Poll the job's history record until the engine reports outputs.
    ///
    /// Succeeds as soon as the record carries a non-empty `outputs`
    /// collection; output contents are returned untouched for the output
    /// resolver. Transient poll failures are retried until the deadline
    /// (history reads are idempotent).
    pub async fn await_completion(
        &self,
        endpoint: &EngineEndpoint,
        handle: &JobHandle,
        timeout: Duration,
    ) -> Result<Value> {
        let started = Instant::now();
        let url = endpoint.history_url(&handle.job_id);

        loop {
            if let Some(outputs) = self.poll_once(&url).await {
                log::info!(
                    "Job {} completed after {:?}",
                    handle.job_id,
                    started.elapsed()
                );
                return Ok(outputs);
            }

            if started.elapsed() >= timeout {
                return Err(ExecuteError::Timeout {
                    job_id: handle.job_id.clone(),
                    timeout,
                });
            }

            tokio::time::sleep(defaults::POLL_INTERVAL).await;
        }
    }

    /// One poll attempt; `Some` only when the record shows outputs.
    async fn poll_once(&self, url: &str) -> Option<Value> {
        let resp = match self.http.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                log::debug!("History poll failed: {}", e);
                return None;
            }
        };

        if !resp.status().is_success() {
            log::debug!("History poll returned {}", resp.status());
            return None;
        }

        let record: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                log::debug!("History record malformed: {}", e);
                return None;
            }
        };

        match record.get("outputs") {
            Some(Value::Object(outputs)) if !outputs.is_empty() => {
                Some(Value::Object(outputs.clone()))
            }
            _ => None,
        }
    }
}

impl Default for EngineClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn endpoint_for(server: &Server) -> EngineEndpoint {
        EngineEndpoint::from_url(&server.url()).unwrap()
    }

    #[tokio::test]
    async fn test_submit_extracts_prompt_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/prompt")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"prompt_id": "abc123"}"#)
            .create_async()
            .await;

        let client = EngineClient::new();
        let handle = client
            .submit(&endpoint_for(&server), &serde_json::json!({"1": {}}))
            .await
            .unwrap();

        assert_eq!(handle.job_id, "abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_missing_prompt_id_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/prompt")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = EngineClient::new();
        let err = client
            .submit(&endpoint_for(&server), &serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecuteError::Submission { .. }));
    }

    #[tokio::test]
    async fn test_submit_server_error_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/prompt")
            .with_status(500)
            .create_async()
            .await;

        let client = EngineClient::new();
        let err = client
            .submit(&endpoint_for(&server), &serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecuteError::Submission { .. }));
    }

    #[tokio::test]
    async fn test_await_completion_returns_outputs() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/history/abc123")
            .with_status(200)
            .with_body(r#"{"outputs": {"9": {"images": [{"filename": "out.png"}]}}}"#)
            .create_async()
            .await;

        let client = EngineClient::new();
        let handle = JobHandle {
            job_id: "abc123".into(),
            submitted_at: Instant::now(),
        };

        let outputs = client
            .await_completion(&endpoint_for(&server), &handle, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(outputs.get("9").is_some());
    }

    #[tokio::test]
    async fn test_await_completion_empty_outputs_times_out() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/history/job-1")
            .with_status(200)
            .with_body(r#"{"outputs": {}}"#)
            .expect_at_least(2)
            .create_async()
            .await;

        let client = EngineClient::new();
        let handle = JobHandle {
            job_id: "job-1".into(),
            submitted_at: Instant::now(),
        };

        let started = Instant::now();
        let err = client
            .await_completion(&endpoint_for(&server), &handle, Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecuteError::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_check_ready_needs_both_endpoints() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/customnode/getmappings")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = EngineClient::new();
        // Object info endpoint is not mocked and answers with an error.
        assert!(!client.check_ready(&endpoint_for(&server)).await);

        server
            .mock("GET", "/api/object_info")
            .with_status(200)
            .with_body(r#"{"KSampler": {}}"#)
            .create_async()
            .await;

        assert!(client.check_ready(&endpoint_for(&server)).await);
    }

    #[tokio::test]
    async fn test_check_ready_rejects_malformed_object_info() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/customnode/getmappings")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("GET", "/api/object_info")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = EngineClient::new();
        assert!(!client.check_ready(&endpoint_for(&server)).await);
    }
}
