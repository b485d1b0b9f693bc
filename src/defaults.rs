//! Default values for engine lifecycle and job execution.

use std::time::Duration;

/// Inclusive port range drawn from when launching a local engine.
pub const PORT_RANGE_START: u16 = 10000;
pub const PORT_RANGE_END: u16 = 65535;

/// How long to wait for a freshly launched engine to become ready.
///
/// A cold workspace may have to load custom nodes and model weights before
/// the object registry answers, so this is an operational ceiling rather
/// than a responsiveness target.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(1800);

/// Pause between readiness probes and between completion polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Grace period before a stubborn engine process is force-killed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Default per-job execution timeout.
pub const JOB_TIMEOUT: Duration = Duration::from_secs(300);

/// Port assumed when a remote engine URL does not carry one.
pub const REMOTE_PORT: u16 = 8188;

/// Per-request timeout for engine HTTP calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable the engine reads its port from.
pub const PORT_ENV_VAR: &str = "COMFY_PORT";
