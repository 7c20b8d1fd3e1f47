//! Remote execution channel.
//!
//! Abstracts "run one shell command on the log host" behind the
//! [`RemoteExecutor`] trait so the transport can be swapped without
//! touching the log mining logic. The default transport shells out to
//! `ssh` with the credential passed through the process environment.
//!
//! Failures never propagate as errors here: every outcome is captured
//! in [`RemoteOutput`], and a non-zero remote exit with non-empty
//! stderr yields an empty `output` regardless of any partial stdout.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::LogServerConfig;

/// Combined result of one remote command invocation.
#[derive(Debug, Clone)]
pub struct RemoteOutput {
    pub output: String,
    pub error: Option<String>,
}

impl RemoteOutput {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Capability: run a single shell command on the remote host with the
/// configured timeout. Implementations must not panic or return early —
/// transport failures are surfaced through [`RemoteOutput::error`].
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, command: &str) -> RemoteOutput;
}

/// `ssh` subprocess transport.
///
/// Builds `ssh -p <port> -o StrictHostKeyChecking=no -o
/// ConnectTimeout=<t> user@host <command>` and waits for completion,
/// bounded by the configured timeout. The password is exported as
/// `SSHPASS` for askpass helpers; key-based auth works with an empty
/// credential.
pub struct SshExecutor {
    config: LogServerConfig,
}

impl SshExecutor {
    pub fn new(config: LogServerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, command: &str) -> RemoteOutput {
        let mut cmd = Command::new("ssh");
        cmd.arg("-p")
            .arg(self.config.port.to_string())
            .arg("-o")
            .arg("StrictHostKeyChecking=no")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.config.timeout_secs))
            .arg(format!("{}@{}", self.config.username, self.config.host))
            .arg(command)
            .env("SSHPASS", &self.config.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let waited = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            cmd.output(),
        )
        .await;

        match waited {
            Err(_) => RemoteOutput::failed(format!(
                "remote command timed out after {}s",
                self.config.timeout_secs
            )),
            Ok(Err(e)) => RemoteOutput::failed(format!("failed to spawn ssh: {}", e)),
            Ok(Ok(out)) => {
                let stdout = String::from_utf8_lossy(&out.stdout).to_string();
                let stderr = String::from_utf8_lossy(&out.stderr).to_string();
                if !out.status.success() && !stderr.is_empty() {
                    RemoteOutput::failed(stderr)
                } else {
                    // grep exiting non-zero with a silent stderr just means
                    // no matches; treat it as an empty success.
                    RemoteOutput {
                        output: stdout,
                        error: None,
                    }
                }
            }
        }
    }
}
