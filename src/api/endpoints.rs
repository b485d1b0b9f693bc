//! HTTP endpoint definitions for the engine API.
//!
//! The engine exposes a small fixed surface: two listing endpoints used as
//! readiness checks, one submission endpoint, and one history endpoint
//! keyed by prompt id. None of the paths are configurable.

use crate::defaults;
use crate::error::Error;

/// Address of a running or to-be-started engine.
///
/// Immutable once the engine process has started; a local engine re-rolls
/// its port only before launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEndpoint {
    pub host: String,
    pub port: u16,
}

impl EngineEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Endpoint for a locally launched engine on the loop-back interface.
    pub fn local(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }

    /// Parse a caller-supplied engine URL.
    ///
    /// Missing ports default to the engine's conventional port 8188.
    pub fn from_url(url: &str) -> Result<Self, Error> {
        let parsed = reqwest::Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(format!("no host in {}", url)))?
            .to_string();
        let port = parsed.port().unwrap_or(defaults::REMOTE_PORT);
        Ok(Self { host, port })
    }

    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Readiness check 1: custom-node mapping listing.
    ///
    /// The engine accepts connections before its plugin registry has
    /// finished loading; this endpoint answers only once mappings exist.
    pub fn node_mappings_url(&self) -> String {
        format!("{}/api/customnode/getmappings?mode=nickname", self.base_url())
    }

    /// Readiness check 2: object/catalog listing.
    pub fn object_info_url(&self) -> String {
        format!("{}/api/object_info", self.base_url())
    }

    /// Job submission endpoint.
    pub fn prompt_url(&self) -> String {
        format!("{}/prompt", self.base_url())
    }

    /// History record for a submitted job.
    pub fn history_url(&self, prompt_id: &str) -> String {
        format!("{}/history/{}", self.base_url(), prompt_id)
    }
}

impl std::fmt::Display for EngineEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
