//! End-to-end notebook session
//!
//! [`SessionController`] is the only place that knows the whole sequence:
//! render and submit the job script, wait for the server, forward a local
//! port to the compute node, point the browser at it and then hold the
//! tunnel open until it exits or the session is cancelled.
//!
//! Once a job id exists, every way out of the session except a clean
//! scheduler failure cancels the job exactly once.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use hn_core::config::{ClusterConfig, SessionSettings};
use hn_core::error::SubmissionError;
use hn_core::exec::CommandExecutor;
use hn_core::script::JobScriptBuilder;
use hn_core::types::{Job, JobId, JobState};

use crate::browser::Browser;
use crate::error::SessionError;
use crate::monitor::{JobMonitor, MonitorOutcome};
use crate::submit::JobSubmitter;
use crate::tunnel::{TunnelExit, TunnelHandle, TunnelManager, TunnelSpec};

/// How a session ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The tunnel exited by itself
    Completed {
        job_id: JobId,
        tunnel_exit: TunnelExit,
        /// Whether the job was cancelled afterwards
        job_cancelled: bool,
    },
    /// The session was interrupted; `job_id` is set if a job had been submitted
    Cancelled { job_id: Option<JobId> },
}

/// Milestones reported while a session runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Submitted { job_id: JobId },
    Waiting { iteration: u64 },
    Available { url: String, node: String },
}

type EventSink = Box<dyn Fn(&SessionEvent) + Send + Sync>;

/// How the part of the session after submission ended
enum Supervised {
    Cancelled,
    TunnelExited(TunnelExit),
}

/// Drives one notebook session from script to tunnel teardown
pub struct SessionController<E, T, B> {
    executor: E,
    cluster: ClusterConfig,
    settings: SessionSettings,
    tunnels: T,
    browser: B,
    script_dir: Option<PathBuf>,
    events: Option<EventSink>,
}

impl<E, T, B> SessionController<E, T, B>
where
    E: CommandExecutor,
    T: TunnelManager,
    B: Browser,
{
    pub fn new(
        executor: E,
        cluster: ClusterConfig,
        settings: SessionSettings,
        tunnels: T,
        browser: B,
    ) -> Self {
        Self {
            executor,
            cluster,
            settings,
            tunnels,
            browser,
            script_dir: None,
            events: None,
        }
    }

    /// Write job scripts into `dir` instead of the system temp directory
    pub fn with_script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = Some(dir.into());
        self
    }

    /// Receive session milestones, e.g. for terminal output
    pub fn with_events(mut self, sink: impl Fn(&SessionEvent) + Send + Sync + 'static) -> Self {
        self.events = Some(Box::new(sink));
        self
    }

    /// Run the session until the tunnel exits, `cancel` fires or something fails
    pub async fn run(&self, cancel: &CancellationToken) -> Result<SessionOutcome, SessionError> {
        if cancel.is_cancelled() {
            tracing::info!("Session cancelled before submission");
            return Ok(SessionOutcome::Cancelled { job_id: None });
        }

        let script_path = self.write_script()?;
        if cancel.is_cancelled() {
            tracing::info!("Session cancelled before submission");
            return Ok(SessionOutcome::Cancelled { job_id: None });
        }

        let submitter = JobSubmitter::new(&self.executor, &self.cluster, &self.settings);
        let mut job = match submitter.submit(&script_path, cancel).await {
            Ok(job) => job,
            Err(SubmissionError::Cancelled) => {
                return Ok(SessionOutcome::Cancelled { job_id: None })
            }
            Err(e) => return Err(e.into()),
        };
        self.emit(SessionEvent::Submitted {
            job_id: job.id().clone(),
        });

        let result = self.supervise(&submitter, &mut job, cancel).await;

        let cancel_job = match &result {
            Ok(Supervised::Cancelled) => true,
            Ok(Supervised::TunnelExited(_)) => !self.settings.keep_job,
            Err(SessionError::JobFailed { .. }) => false,
            Err(_) => true,
        };
        if cancel_job {
            self.cancel_job(&submitter, &mut job).await;
        } else if self.settings.keep_job && job.state() == JobState::Ready {
            tracing::info!("Leaving job {} running", job.id());
        }

        match result {
            Ok(Supervised::Cancelled) => Ok(SessionOutcome::Cancelled {
                job_id: Some(job.id().clone()),
            }),
            Ok(Supervised::TunnelExited(tunnel_exit)) => Ok(SessionOutcome::Completed {
                job_id: job.id().clone(),
                tunnel_exit,
                job_cancelled: cancel_job,
            }),
            Err(e) => Err(e),
        }
    }

    fn write_script(&self) -> Result<PathBuf, SessionError> {
        let builder = JobScriptBuilder::new(&self.cluster, &self.settings);
        let path = match &self.script_dir {
            Some(dir) => builder.write_in(dir)?,
            None => builder.write()?,
        };
        Ok(path)
    }

    /// Everything between submission and teardown
    async fn supervise(
        &self,
        submitter: &JobSubmitter<'_, E>,
        job: &mut Job,
        cancel: &CancellationToken,
    ) -> Result<Supervised, SessionError> {
        let info = match self.wait_for_server(job, cancel).await? {
            MonitorOutcome::Ready(info) => info,
            MonitorOutcome::Failed => {
                return Err(SessionError::JobFailed {
                    job_id: job.id().clone(),
                    error_log: self.settings.error_log_path(job.id().as_str()),
                })
            }
            MonitorOutcome::Cancelled => return Ok(Supervised::Cancelled),
        };

        let node = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Supervised::Cancelled),
            node = submitter.allocated_node(job.id()) => node?,
        };

        let mut tunnel = self.tunnels.open(TunnelSpec {
            cluster_host: self.cluster.cluster_host.clone(),
            local_port: self.settings.local_port,
            remote_host: node.clone(),
            remote_port: info.port,
        })?;

        let url = info.local_url(self.settings.local_port);
        if self.settings.open_browser {
            if let Err(e) = self.browser.open(&url) {
                tracing::warn!("Could not open a browser: {}", e);
            }
        }
        tracing::info!("Notebook available at {}", url);
        self.emit(SessionEvent::Available { url, node });

        let exited = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            exit = tunnel.wait() => Some(exit),
        };

        match exited {
            // The interrupt that cancelled the session may reach ssh first
            Some(_) if cancel.is_cancelled() => {
                tracing::info!("Tunnel {} exited on interrupt", tunnel.spec());
                Ok(Supervised::Cancelled)
            }
            Some(exit) => {
                let exit = exit?;
                tracing::info!("Tunnel {} closed with code {:?}", tunnel.spec(), exit.code);
                Ok(Supervised::TunnelExited(exit))
            }
            None => {
                if let Err(e) = tunnel.close().await {
                    tracing::warn!("Failed to close tunnel: {}", e);
                }
                Ok(Supervised::Cancelled)
            }
        }
    }

    async fn wait_for_server(
        &self,
        job: &mut Job,
        cancel: &CancellationToken,
    ) -> Result<MonitorOutcome, SessionError> {
        let mut monitor = JobMonitor::new(&self.executor, &self.settings);
        if let Some(sink) = &self.events {
            monitor = monitor.with_progress(move |iteration| sink(&SessionEvent::Waiting { iteration }));
        }

        let Some(limit) = self.settings.wait_timeout else {
            return Ok(monitor.wait_until_ready(job, cancel).await?);
        };

        let waited = tokio::time::timeout(limit, monitor.wait_until_ready(job, cancel)).await;
        match waited {
            Ok(outcome) => Ok(outcome?),
            Err(_) => {
                tracing::error!("Job {} did not become ready within {:?}", job.id(), limit);
                Err(SessionError::Timeout(limit))
            }
        }
    }

    /// Best-effort job cancellation; failures are logged
    async fn cancel_job(&self, submitter: &JobSubmitter<'_, E>, job: &mut Job) {
        if !job.state().is_terminal() {
            if let Err(e) = job.transition(JobState::Cancelled) {
                tracing::warn!("{}", e);
            }
        }
        if let Err(e) = submitter.cancel(job.id()).await {
            tracing::warn!("{}", e);
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(sink) = &self.events {
            sink(&event);
        }
    }
}
