//! Mount executor: the privileged step that attaches an export to a local
//! directory.
//!
//! [`CommandMountExecutor`] shells out to `mount(8)` and bounds the call with
//! a deadline; a hung NFS server otherwise blocks the caller forever.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::NfsError;

/// Default deadline for a single mount invocation.
pub const DEFAULT_MOUNT_TIMEOUT: Duration = Duration::from_secs(30);

/// Performs `mount <remote> <target>`.
#[async_trait]
pub trait MountExecutor: Send + Sync {
    /// Mount `remote` (`server:path`) at `target`.
    ///
    /// Any failure carries the executor's own diagnostic text.
    async fn mount(&self, remote: &str, target: &Path) -> Result<(), NfsError>;
}

/// [`MountExecutor`] that runs an external command.
#[derive(Debug, Clone)]
pub struct CommandMountExecutor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandMountExecutor {
    /// Run `program <args...> <remote> <target>` with the given deadline.
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

impl Default for CommandMountExecutor {
    fn default() -> Self {
        Self::new("mount", Vec::new(), DEFAULT_MOUNT_TIMEOUT)
    }
}

#[async_trait]
impl MountExecutor for CommandMountExecutor {
    #[instrument(skip(self, target), fields(program = %self.program, target = %target.display()))]
    async fn mount(&self, remote: &str, target: &Path) -> Result<(), NfsError> {
        let failed = |reason: String| NfsError::MountFailed {
            remote: remote.to_owned(),
            path: target.display().to_string(),
            reason,
        };

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(remote)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Dropping the output future on timeout must not leave the
            // child behind.
            .kill_on_drop(true);

        debug!(?cmd, "running mount command");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(failed(format!("spawn {}: {e}", self.program))),
            Err(_) => {
                return Err(NfsError::MountTimedOut {
                    remote: remote.to_owned(),
                    path: target.display().to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            let reason = if stderr.is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {stderr}", output.status)
            };
            return Err(failed(reason));
        }
        Ok(())
    }
}
