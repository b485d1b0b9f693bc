//! Packrun - Rust client for launching and driving ComfyUI workflow engines.
//!
//! Supervises a ComfyUI engine as a separate HTTP-addressable subprocess:
//! allocating a port, launching and terminating the process, probing for
//! readiness, submitting workflow graphs, and polling for completion under
//! bounded time budgets. The engine itself is an opaque black box beyond
//! its documented endpoints.

mod defaults;
pub mod error;

pub mod api;
pub mod engine;
pub mod workspace;

pub use error::{Error, Result};

pub use api::client::{EngineClient, ExecuteError, JobHandle};
pub use api::endpoints::EngineEndpoint;
pub use api::{generate_session_id, JobDescription, JobOutputs};

pub use engine::handle::{execute_remote_workflow, EngineHandle, RemoteEngineHandle};
pub use engine::supervisor::{EngineConfig, EngineProcess, LifecycleError, ENGINE_COMMAND_ENV};

pub use workspace::WorkspaceCache;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
