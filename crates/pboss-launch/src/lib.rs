//! Backend supervision: spawn the tracking process, wait until its port
//! answers, and report if it dies while the app runs.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use pboss_core::Config;

/// Environment variable the backend reads its API key from.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("backend_command is empty")]
    EmptyCommand,

    #[error("failed to spawn backend {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("backend at {addr} not reachable after {}s ({attempts} attempts)", waited.as_secs())]
    Timeout {
        addr: String,
        waited: Duration,
        attempts: u32,
    },

    #[error("backend exited during startup ({0})")]
    Exited(ExitStatus),

    #[error(transparent)]
    Address(#[from] pboss_client::ApiError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ── Probe ──

/// Reachability probe timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub interval: Duration,
    pub connect_timeout: Duration,
    pub deadline: Duration,
}

impl ProbeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.startup_probe_interval(),
            connect_timeout: config.startup_connect_timeout(),
            deadline: config.startup_timeout(),
        }
    }
}

/// One TCP connect attempt, bounded by `connect_timeout`.
pub async fn probe(addr: &str, connect_timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// Probe `addr` until it accepts a connection or the deadline passes.
/// Returns the number of attempts made.
pub async fn wait_reachable(addr: &str, settings: ProbeSettings) -> Result<u32, LaunchError> {
    let start = Instant::now();
    let deadline = start + settings.deadline;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if probe(addr, settings.connect_timeout).await {
            tracing::info!(addr, attempts, "backend reachable");
            return Ok(attempts);
        }
        if Instant::now() >= deadline {
            return Err(LaunchError::Timeout {
                addr: addr.to_string(),
                waited: start.elapsed(),
                attempts,
            });
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(settings.interval.min(remaining)).await;
    }
}

// ── Process ──

/// How to start the backend.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub command: Vec<String>,
    /// `host:port` probed for readiness.
    pub addr: String,
    /// Passed as [`API_KEY_ENV`]; empty when no key is stored.
    pub api_key: String,
    /// Let the backend write to this terminal instead of discarding its output.
    pub inherit_output: bool,
}

impl LaunchSpec {
    /// `None` when no `backend_command` is configured (backend assumed running).
    pub fn from_config(config: &Config, api_key: Option<String>) -> Result<Option<Self>, LaunchError> {
        if config.backend_command.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            command: config.backend_command.clone(),
            addr: pboss_client::probe_address(&config.backend_url)?,
            api_key: api_key.unwrap_or_default(),
            inherit_output: false,
        }))
    }
}

/// A running backend child. Killed when dropped.
#[derive(Debug)]
pub struct BackendProcess {
    child: Child,
    addr: String,
}

impl BackendProcess {
    pub fn spawn(spec: &LaunchSpec) -> Result<Self, LaunchError> {
        let (program, args) = spec.command.split_first().ok_or(LaunchError::EmptyCommand)?;
        let output = || {
            if spec.inherit_output {
                Stdio::inherit()
            } else {
                Stdio::null()
            }
        };
        let child = Command::new(program)
            .args(args)
            .env(API_KEY_ENV, &spec.api_key)
            .stdin(Stdio::null())
            .stdout(output())
            .stderr(output())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.clone(),
                source,
            })?;
        tracing::info!(program = %program, pid = child.id(), "backend spawned");
        Ok(Self {
            child,
            addr: spec.addr.clone(),
        })
    }

    /// Wait until the backend port answers. Fails early if the child exits.
    pub async fn wait_ready(&mut self, settings: ProbeSettings) -> Result<u32, LaunchError> {
        tokio::select! {
            reachable = wait_reachable(&self.addr, settings) => reachable,
            status = self.child.wait() => {
                let status = status?;
                tracing::error!(%status, "backend exited during startup");
                Err(LaunchError::Exited(status))
            }
        }
    }

    /// Kill the child and reap it.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!(error = %e, "failed to kill backend");
        }
    }

    /// Hand the child to a watcher task. `on_exit` runs if the child exits
    /// with a failure status; a clean exit is only logged.
    pub fn watch<F>(self, on_exit: F) -> ExitWatch
    where
        F: FnOnce(ExitStatus) + Send + 'static,
    {
        let mut child = self.child;
        let task = tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    tracing::error!(%status, "backend terminated unexpectedly");
                    on_exit(status);
                }
                Ok(status) => tracing::info!(%status, "backend exited"),
                Err(e) => tracing::warn!(error = %e, "lost track of backend process"),
            }
        });
        ExitWatch { task }
    }
}

/// Watcher returned by [`BackendProcess::watch`]. Dropping it kills the
/// backend.
#[derive(Debug)]
pub struct ExitWatch {
    task: JoinHandle<()>,
}

impl Drop for ExitWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ── Tests ──
