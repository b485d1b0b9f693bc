//! Scoped handles for local and remote engines.
//!
//! `EngineHandle` brackets one engine process's lifetime: `acquire` starts
//! the subprocess and waits for readiness, `release` stops it, and both are
//! safe to call repeatedly. `RemoteEngineHandle` speaks the same
//! submission/polling protocol against an address it does not own.

use std::time::Instant;

use tokio::sync::Mutex;

use crate::api::client::{EngineClient, ExecuteError};
use crate::api::endpoints::EngineEndpoint;
use crate::api::{JobDescription, JobOutputs};
use crate::defaults;
use crate::engine::supervisor::{EngineConfig, EngineProcess, LifecycleError};
use crate::error::Result;

/// A managed local engine.
///
/// One instance may serve many concurrent jobs: submission and polling for
/// distinct job ids interleave freely, while start/stop transitions are
/// serialized behind a single lock.
pub struct EngineHandle {
    process: Mutex<EngineProcess>,
    client: EngineClient,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            process: Mutex::new(EngineProcess::new(config)),
            client: EngineClient::new(),
        }
    }

    /// Start the engine and wait until it is ready. No-op if already
    /// running.
    ///
    /// On any failure the partially-started process is stopped before the
    /// error surfaces, so a failed acquire never leaks a subprocess.
    pub async fn acquire(&self) -> Result<()> {
        let mut process = self.process.lock().await;
        if process.is_running() {
            return Ok(());
        }

        process.start()?;

        let endpoint = process.endpoint().clone();
        let timeout = process.config().startup_timeout;
        let started = Instant::now();

        log::info!("Waiting for engine at {} to become ready", endpoint);

        loop {
            if self.client.check_ready(&endpoint).await {
                log::info!("Engine ready after {:?}", started.elapsed());
                return Ok(());
            }

            if !process.is_running() {
                process.stop();
                return Err(LifecycleError::StartupFailed(
                    "engine process exited before becoming ready".into(),
                )
                .into());
            }

            if started.elapsed() >= timeout {
                process.stop();
                return Err(LifecycleError::StartupFailed(format!(
                    "engine not ready after {:?}",
                    timeout
                ))
                .into());
            }

            tokio::time::sleep(defaults::POLL_INTERVAL).await;
        }
    }

    /// Stop the engine. Safe to call at any point, any number of times.
    pub async fn release(&self) {
        self.process.lock().await.stop();
    }

    /// Whether the engine subprocess is currently alive.
    pub async fn is_running(&self) -> bool {
        self.process.lock().await.is_running()
    }

    /// Address of the managed engine.
    pub async fn endpoint(&self) -> EngineEndpoint {
        self.process.lock().await.endpoint().clone()
    }

    /// Submit a job and wait for its outputs.
    ///
    /// The lock is held only long enough to snapshot the endpoint, so
    /// concurrent jobs against the same engine do not serialize on each
    /// other's polling.
    pub async fn execute(&self, job: &JobDescription) -> Result<JobOutputs> {
        let (endpoint, workspace) = {
            let process = self.process.lock().await;
            (
                process.endpoint().clone(),
                process.config().workspace.clone(),
            )
        };

        // Output storage for the session, consumed by the output resolver.
        let output_dir = workspace.join("output").join(&job.session_id);
        std::fs::create_dir_all(&output_dir)?;

        Ok(run_job(&self.client, &endpoint, job).await?)
    }
}

/// A handle to an engine whose lifetime someone else owns.
///
/// Same execution protocol as [`EngineHandle`], but no start/stop: the
/// remote process is never terminated from here.
pub struct RemoteEngineHandle {
    endpoint: EngineEndpoint,
    client: EngineClient,
}

impl RemoteEngineHandle {
    pub fn connect(url: &str) -> Result<Self> {
        Ok(Self {
            endpoint: EngineEndpoint::from_url(url)?,
            client: EngineClient::new(),
        })
    }

    pub fn endpoint(&self) -> &EngineEndpoint {
        &self.endpoint
    }

    /// Submit a job and wait for its outputs.
    pub async fn execute(&self, job: &JobDescription) -> Result<JobOutputs> {
        Ok(run_job(&self.client, &self.endpoint, job).await?)
    }
}

/// Execute a single job against an externally supplied engine URL.
pub async fn execute_remote_workflow(url: &str, job: &JobDescription) -> Result<JobOutputs> {
    RemoteEngineHandle::connect(url)?.execute(job).await
}

/// Submission followed by completion polling; failures from either stage
/// pass through unmodified.
async fn run_job(
    client: &EngineClient,
    endpoint: &EngineEndpoint,
    job: &JobDescription,
) -> std::result::Result<JobOutputs, ExecuteError> {
    let handle = client.submit(endpoint, &job.prompt).await?;
    let outputs = client
        .await_completion(endpoint, &handle, job.timeout)
        .await?;

    Ok(JobOutputs {
        job_id: handle.job_id,
        session_id: job.session_id.clone(),
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    #[cfg(unix)]
    async fn test_acquire_fails_when_engine_never_ready() {
        let dir = tempdir().unwrap();
        // The sleeper never answers HTTP, so readiness cannot be reached.
        let config = EngineConfig::new(dir.path())
            .with_command(vec!["sleep".into(), "30".into()])
            .with_startup_timeout(Duration::from_secs(2));
        let handle = EngineHandle::new(config);

        let err = handle.acquire().await.unwrap_err();
        assert!(matches!(err, Error::Lifecycle(_)));
        assert!(!handle.is_running().await, "failed acquire must stop the process");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_acquire_fails_fast_when_engine_exits() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::new(dir.path())
            .with_command(vec!["true".into()])
            .with_startup_timeout(Duration::from_secs(30));
        let handle = EngineHandle::new(config);

        let started = Instant::now();
        let err = handle.acquire().await.unwrap_err();
        assert!(matches!(err, Error::Lifecycle(_)));
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "a dead engine must not be waited on until the timeout"
        );
    }

    #[tokio::test]
    async fn test_release_without_acquire() {
        let dir = tempdir().unwrap();
        let handle = EngineHandle::new(EngineConfig::new(dir.path()));
        handle.release().await;
        handle.release().await;
    }

    #[test]
    fn test_remote_connect_rejects_bad_url() {
        assert!(RemoteEngineHandle::connect("not a url").is_err());
    }

    #[test]
    fn test_remote_connect_default_port() {
        let remote = RemoteEngineHandle::connect("http://engine.internal").unwrap();
        assert_eq!(remote.endpoint().port, 8188);
    }
}
