//! Local and remote command execution
//!
//! Everything that talks to the cluster goes through [`CommandExecutor`].
//! The production implementation shells out to `ssh`; tests substitute a
//! scripted fake.

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{ClusterConfig, SessionSettings};
use crate::error::ExecError;

/// Outcome of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommandResult {
    /// Process exit code, `-1` when terminated by a signal
    pub exit_code: i32,
    /// Captured stdout, trimmed
    pub stdout: String,
    /// Captured stderr, trimmed
    pub stderr: String,
}

impl RemoteCommandResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into `ExecError::NonZero` for callers that need success
    pub fn into_success(self, command: &str) -> Result<Self, ExecError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ExecError::NonZero {
                command: command.to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }
}

/// Runs a command on this machine or on the cluster login node
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `argv`; when `local` is false it runs on the cluster.
    ///
    /// A non-zero exit is not an error: inspect `exit_code`. Only a
    /// failure to start the process is reported as `Err`.
    async fn execute(&self, argv: &[String], local: bool) -> Result<RemoteCommandResult, ExecError>;
}

/// Executor that reaches the cluster through the system `ssh` client
#[derive(Debug, Clone)]
pub struct SshExecutor {
    cluster_host: String,
    ssh_program: String,
    ssh_options: Vec<String>,
}

impl SshExecutor {
    pub fn new(cluster_host: impl Into<String>) -> Self {
        Self {
            cluster_host: cluster_host.into(),
            ssh_program: "ssh".to_string(),
            ssh_options: vec![],
        }
    }

    /// Build from the resolved cluster and session settings
    pub fn from_config(cluster: &ClusterConfig, settings: &SessionSettings) -> Self {
        Self {
            cluster_host: cluster.cluster_host.clone(),
            ssh_program: settings.ssh_program.clone(),
            ssh_options: settings.ssh_options.clone(),
        }
    }

    pub fn cluster_host(&self) -> &str {
        &self.cluster_host
    }

    /// Full argument vector actually spawned for `argv`
    pub fn command_line(&self, argv: &[String], local: bool) -> Vec<String> {
        if local {
            return argv.to_vec();
        }
        let mut wrapped = Vec::with_capacity(argv.len() + self.ssh_options.len() + 2);
        wrapped.push(self.ssh_program.clone());
        wrapped.extend(self.ssh_options.iter().cloned());
        wrapped.push(self.cluster_host.clone());
        wrapped.extend(argv.iter().cloned());
        wrapped
    }
}

#[async_trait]
impl CommandExecutor for SshExecutor {
    async fn execute(&self, argv: &[String], local: bool) -> Result<RemoteCommandResult, ExecError> {
        let cmd_line = self.command_line(argv, local);
        let (program, args) = match cmd_line.split_first() {
            Some(split) => split,
            None => {
                return Err(ExecError::Spawn {
                    program: String::new(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
                })
            }
        };

        tracing::debug!("Executing command: {}", cmd_line.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|source| ExecError::Spawn {
                program: program.clone(),
                source,
            })?;

        let result = RemoteCommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };

        if !result.success() {
            tracing::warn!(
                "{} exited with code {}: {}",
                argv.first().map(String::as_str).unwrap_or(program.as_str()),
                result.exit_code,
                result.stderr
            );
        }

        Ok(result)
    }
}
