//! SSH port forwarding to the compute node
//!
//! The tunnel is a plain `ssh -N -L` child process. It runs independently
//! of the controller, which only waits on it or tears it down.

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use hn_core::config::SessionSettings;
use hn_core::error::TunnelError;

/// Where a tunnel listens and where it forwards to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSpec {
    /// Login host the SSH connection goes through
    pub cluster_host: String,
    /// Port bound on this machine
    pub local_port: u16,
    /// Compute node as seen from the login host
    pub remote_host: String,
    /// Notebook port on the compute node
    pub remote_port: u16,
}

impl TunnelSpec {
    /// The `-L` forwarding argument
    pub fn forward_arg(&self) -> String {
        format!("{}:{}:{}", self.local_port, self.remote_host, self.remote_port)
    }
}

impl fmt::Display for TunnelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "localhost:{} -> {}:{} via {}",
            self.local_port, self.remote_host, self.remote_port, self.cluster_host
        )
    }
}

/// How a tunnel process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelExit {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
}

impl TunnelExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for TunnelExit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// A running tunnel
#[async_trait]
pub trait TunnelHandle: Send {
    fn spec(&self) -> &TunnelSpec;

    /// Wait until the tunnel process exits by itself.
    ///
    /// Cancel-safe: dropping the future leaves the tunnel running.
    async fn wait(&mut self) -> Result<TunnelExit, TunnelError>;

    /// Terminate the tunnel if it is still running. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), TunnelError>;
}

/// Opens tunnels
pub trait TunnelManager: Send + Sync {
    type Handle: TunnelHandle;

    /// Start forwarding in the background and return immediately
    fn open(&self, spec: TunnelSpec) -> Result<Self::Handle, TunnelError>;
}

/// Opens tunnels with the system `ssh` client
#[derive(Debug, Clone)]
pub struct SshTunnelManager {
    ssh_program: String,
    ssh_options: Vec<String>,
}

impl SshTunnelManager {
    pub fn new(ssh_program: impl Into<String>, ssh_options: Vec<String>) -> Self {
        Self {
            ssh_program: ssh_program.into(),
            ssh_options,
        }
    }

    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self::new(settings.ssh_program.clone(), settings.ssh_options.clone())
    }

    /// Arguments passed to the ssh program for `spec`
    pub fn args(&self, spec: &TunnelSpec) -> Vec<String> {
        let mut args = self.ssh_options.clone();
        args.push("-N".to_string());
        args.push(spec.cluster_host.clone());
        args.push("-L".to_string());
        args.push(spec.forward_arg());
        args
    }
}

impl TunnelManager for SshTunnelManager {
    type Handle = SshTunnel;

    fn open(&self, spec: TunnelSpec) -> Result<SshTunnel, TunnelError> {
        let args = self.args(&spec);
        tracing::debug!("Executing command: {} {}", self.ssh_program, args.join(" "));

        let child = Command::new(&self.ssh_program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                program: self.ssh_program.clone(),
                source,
            })?;

        tracing::info!("Opened tunnel {}", spec);
        Ok(SshTunnel {
            child,
            spec,
            exit: None,
        })
    }
}

/// Tunnel backed by an `ssh` child process
#[derive(Debug)]
pub struct SshTunnel {
    child: Child,
    spec: TunnelSpec,
    exit: Option<TunnelExit>,
}

impl SshTunnel {
    /// Process id, if the process has not been reaped yet
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

#[async_trait]
impl TunnelHandle for SshTunnel {
    fn spec(&self) -> &TunnelSpec {
        &self.spec
    }

    async fn wait(&mut self) -> Result<TunnelExit, TunnelError> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        let status = self.child.wait().await.map_err(TunnelError::Wait)?;
        let exit = TunnelExit::from(status);
        tracing::info!("Tunnel exited with code {:?}", exit.code);
        self.exit = Some(exit);
        Ok(exit)
    }

    async fn close(&mut self) -> Result<(), TunnelError> {
        if self.exit.is_some() {
            return Ok(());
        }
        if let Some(status) = self.child.try_wait().map_err(TunnelError::Wait)? {
            self.exit = Some(status.into());
            return Ok(());
        }

        tracing::info!("Closing tunnel {}", self.spec);
        self.child.start_kill().map_err(TunnelError::Kill)?;
        let status = self.child.wait().await.map_err(TunnelError::Wait)?;
        self.exit = Some(status.into());
        Ok(())
    }
}
