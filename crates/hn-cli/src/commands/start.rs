//! Start command: run one notebook session end to end

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use hn_core::config::{self, ClusterConfig, ClusterOverrides, SessionSettings};
use hn_core::exec::SshExecutor;
use hn_session::{
    SessionController, SessionError, SessionEvent, SessionOutcome, SshTunnelManager, SystemBrowser,
};

use crate::output::{finish_waiting, print_error, print_info, print_success, print_waiting, print_warning};

/// Exit code of an interrupted session
pub const EXIT_CANCELLED: u8 = 130;

/// Session flags shared by `start` and `script`
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub partition: Option<String>,
    pub time_limit: Option<String>,
    pub timeout_secs: Option<u64>,
    pub keep_job: bool,
    pub no_browser: bool,
}

impl SessionOptions {
    pub fn overrides(&self) -> ClusterOverrides {
        ClusterOverrides {
            partition: self.partition.clone(),
            time_limit: self.time_limit.clone(),
        }
    }

    /// Apply the flags on top of settings loaded from the config file
    pub fn apply(&self, settings: &mut SessionSettings) {
        if let Some(secs) = self.timeout_secs {
            settings.wait_timeout = Some(Duration::from_secs(secs));
        }
        if self.keep_job {
            settings.keep_job = true;
        }
        if self.no_browser {
            settings.open_browser = false;
        }
    }

    /// Load settings and resolve the cluster from the environment
    pub fn resolve(&self, config_path: Option<&Path>) -> Result<(ClusterConfig, SessionSettings)> {
        let mut settings = config::load_settings(config_path).context("Failed to load settings")?;
        self.apply(&mut settings);
        let cluster = ClusterConfig::from_env(&self.overrides())?;
        Ok((cluster, settings))
    }
}

/// Submit the notebook job, tunnel to it and wait until the session ends
pub async fn start_command(options: &SessionOptions, config_path: Option<&Path>) -> Result<ExitCode> {
    let (cluster, settings) = options.resolve(config_path)?;
    print_info(&format!("Starting notebook job on {}", cluster.cluster_host));

    let executor = SshExecutor::from_config(&cluster, &settings);
    let tunnels = SshTunnelManager::from_settings(&settings);
    let controller = SessionController::new(executor, cluster, settings, tunnels, SystemBrowser)
        .with_events(report_event);

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    match controller.run(&cancel).await {
        Ok(SessionOutcome::Completed {
            job_id,
            tunnel_exit,
            job_cancelled,
        }) => {
            if tunnel_exit.success() {
                print_success("Tunnel closed");
            } else {
                match tunnel_exit.code {
                    Some(code) => print_warning(&format!("Tunnel exited with code {}", code)),
                    None => print_warning("Tunnel was terminated by a signal"),
                }
            }
            if job_cancelled {
                print_info(&format!("Cancellation of job {} requested", job_id));
            } else {
                print_info(&format!("Job {} is still running, stop it with: scancel {}", job_id, job_id));
            }
            Ok(if tunnel_exit.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Ok(SessionOutcome::Cancelled { job_id }) => {
            finish_waiting();
            match job_id {
                Some(job_id) => print_warning(&format!(
                    "Session interrupted, cancellation of job {} requested",
                    job_id
                )),
                None => print_warning("Session interrupted before the job was submitted"),
            }
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(e @ SessionError::JobFailed { .. }) => {
            finish_waiting();
            print_error(&e.to_string());
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            finish_waiting();
            Err(e).context("Notebook session failed")
        }
    }
}

fn report_event(event: &SessionEvent) {
    match event {
        SessionEvent::Submitted { job_id } => {
            print_success(&format!("Job submitted with id {}", job_id));
        }
        SessionEvent::Waiting { iteration } => print_waiting(*iteration),
        SessionEvent::Available { url, node } => {
            finish_waiting();
            print_success(&format!("Notebook server running on {}", node));
            print_info(&format!("Open {}", url));
            print_info("Press Ctrl+C to stop the notebook and cancel the job");
        }
    }
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, stopping session...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, stopping session...");
            }
        }

        cancel.cancel();
    });
}
