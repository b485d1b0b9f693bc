//! Engine process lifecycle management.
//!
//! Provides `EngineProcess`, which owns at most one live engine subprocess:
//! spawning it bound to an allocated port inside a managed workspace, and
//! terminating it gracefully with a forceful fallback. Start and stop are
//! both idempotent.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;

use crate::api::endpoints::EngineEndpoint;
use crate::defaults;
use crate::engine::port::{allocate_port, is_port_in_use};
use crate::engine::process::stop_child;

/// Environment variable overriding the engine launch command.
///
/// Whitespace-split into program and arguments; an escape hatch for
/// development setups and tests.
pub const ENGINE_COMMAND_ENV: &str = "PACKRUN_ENGINE_COMMAND";

/// Errors that can occur during engine lifecycle management.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Engine startup failed: {0}")]
    StartupFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Launch configuration for a local engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Working directory the engine runs in; created if absent.
    pub workspace: PathBuf,
    /// Directory the engine reads input files from; created if absent.
    pub input_dir: PathBuf,
    /// Program and arguments used to launch the engine.
    pub command: Vec<String>,
    /// Verbosity level; nonzero inherits the engine's stdio for live
    /// diagnostics and appends `-v` flags to its argument list.
    pub verbosity: u8,
    /// Preferred port; a random one is drawn when unset. Either way the
    /// port is re-rolled at start while something is listening on it.
    pub port: Option<u16>,
    /// Overall budget for the engine to become ready after launch.
    pub startup_timeout: Duration,
}

impl EngineConfig {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        let input_dir = workspace.join("input");

        Self {
            workspace,
            input_dir,
            command: default_command(),
            verbosity: 0,
            port: None,
            startup_timeout: defaults::STARTUP_TIMEOUT,
        }
    }

    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

fn default_command() -> Vec<String> {
    if let Ok(raw) = std::env::var(ENGINE_COMMAND_ENV) {
        let parts: Vec<String> = raw.split_whitespace().map(String::from).collect();
        if !parts.is_empty() {
            return parts;
        }
    }

    vec!["python".into(), "-m".into(), "comfy.cli.main".into()]
}

/// An exclusively-owned engine subprocess.
///
/// Lifecycle: unstarted -> running -> stopped. Starting while running and
/// stopping while stopped are both no-ops. Dropping stops the process.
pub struct EngineProcess {
    config: EngineConfig,
    endpoint: EngineEndpoint,
    child: Option<std::process::Child>,
}

impl EngineProcess {
    pub fn new(config: EngineConfig) -> Self {
        let port = config.port.unwrap_or_else(allocate_port);
        Self {
            config,
            endpoint: EngineEndpoint::local(port),
            child: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Address the engine is (or will be) listening on.
    ///
    /// Stable once the process has started; before that the port may still
    /// be re-rolled on collision.
    pub fn endpoint(&self) -> &EngineEndpoint {
        &self.endpoint
    }

    /// Whether the subprocess is currently alive.
    ///
    /// Reaps the child if it has exited, so a crashed engine is observed
    /// promptly by the readiness loop.
    pub fn is_running(&mut self) -> bool {
        match self.child {
            Some(ref mut child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    log::warn!("Engine process exited with {}", status);
                    self.child = None;
                    false
                }
                Err(e) => {
                    log::warn!("Failed to query engine process: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Spawn the engine subprocess. No-op if already running.
    ///
    /// Creates the workspace and input directories, settles on an unused
    /// port, and launches the configured command with the port passed via
    /// the environment. Returns as soon as the process exists; readiness
    /// is a separate wait.
    pub fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.config.workspace)?;
        std::fs::create_dir_all(&self.config.input_dir)?;

        // Any colliding port is re-rolled before launch, pinned or drawn.
        while is_port_in_use(self.endpoint.port) {
            log::warn!("Port {} is in use, re-rolling", self.endpoint.port);
            self.endpoint.port = allocate_port();
        }

        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| LifecycleError::StartupFailed("empty engine command".into()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .env(defaults::PORT_ENV_VAR, self.endpoint.port.to_string())
            .current_dir(&self.config.workspace);

        if self.config.verbosity > 0 {
            command.arg(format!("-{}", "v".repeat(self.config.verbosity as usize)));
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let child = command.spawn().map_err(|e| {
            LifecycleError::StartupFailed(format!("failed to spawn {}: {}", program, e))
        })?;

        log::info!(
            "Launched engine process {} on {}",
            child.id(),
            self.endpoint
        );

        self.child = Some(child);
        Ok(())
    }

    /// Terminate the engine subprocess. No-op if not running.
    ///
    /// Graceful signal first, forceful kill after the grace period. The
    /// process slot is cleared on return regardless of which path was
    /// taken, so repeated stops never error.
    pub fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        let pid = child.id();
        if let Err(e) = stop_child(&mut child, defaults::SHUTDOWN_GRACE) {
            log::warn!("Failed to stop engine process {}: {}", pid, e);
        } else {
            log::info!("Engine process {} stopped", pid);
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.stop();
    }
}
