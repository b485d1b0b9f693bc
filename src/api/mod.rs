//! Engine-facing API: endpoints, job payloads, and the HTTP client.

pub mod client;
pub mod endpoints;

use std::time::Duration;

use serde_json::Value;

use crate::defaults;

/// A job to be executed by the engine.
///
/// The prompt is an opaque workflow graph; this crate never inspects its
/// node structure. The session id namespaces output storage and is
/// generated when the caller does not supply one.
#[derive(Debug, Clone)]
pub struct JobDescription {
    pub prompt: Value,
    pub session_id: String,
    pub timeout: Duration,
}

impl JobDescription {
    pub fn new(prompt: Value) -> Self {
        Self {
            prompt,
            session_id: generate_session_id(),
            timeout: defaults::JOB_TIMEOUT,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        if !session_id.is_empty() {
            self.session_id = session_id;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Opaque reference to the outputs a completed job produced.
///
/// Contains the engine's raw `outputs` record; mapping output node
/// references to concrete files on disk is the output resolver's job.
#[derive(Debug, Clone)]
pub struct JobOutputs {
    pub job_id: String,
    pub session_id: String,
    pub outputs: Value,
}

/// Generate a random session identifier.
///
/// Uses true randomness to avoid collisions between rapid successive jobs.
pub fn generate_session_id() -> String {
    use rand::Rng;

    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_uniqueness() {
        use std::collections::HashSet;

        let ids: HashSet<String> = (0..1000).map(|_| generate_session_id()).collect();
        assert_eq!(ids.len(), 1000, "Session IDs must be unique across rapid calls");
        assert!(ids.iter().all(|id| id.len() == 32));
    }

    #[test]
    fn test_job_description_defaults() {
        let job = JobDescription::new(serde_json::json!({"1": {"class_type": "Load"}}));
        assert!(!job.session_id.is_empty());
        assert_eq!(job.timeout, defaults::JOB_TIMEOUT);
    }

    #[test]
    fn test_empty_session_id_replaced() {
        let job = JobDescription::new(serde_json::json!({})).with_session_id("");
        assert!(!job.session_id.is_empty());

        let job = JobDescription::new(serde_json::json!({})).with_session_id("sess-1");
        assert_eq!(job.session_id, "sess-1");
    }
}
