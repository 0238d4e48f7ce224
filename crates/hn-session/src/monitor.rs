//! Polling a submitted job until the notebook server is reachable
//!
//! Every iteration reads the job's error log, looking for the URL the
//! server prints once it is live, and then asks scheduler accounting
//! whether the job has died. A failure reported by accounting always
//! takes precedence over a URL found in the same iteration.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use hn_core::config::SessionSettings;
use hn_core::error::{ExecError, ParseError};
use hn_core::exec::CommandExecutor;
use hn_core::parser::ConnectionInfoParser;
use hn_core::types::{ConnectionInfo, Job, JobId, JobState};

use crate::error::MonitorError;

/// Accounting state that marks a job as dead
const FAILED_STATE: &str = "FAILED";

/// Result of a single poll iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollVerdict {
    /// Nothing conclusive yet
    Pending,
    /// The server announced itself
    Ready(ConnectionInfo),
    /// Accounting reports the job as failed
    Failed,
}

/// How waiting on a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    Ready(ConnectionInfo),
    Failed,
    Cancelled,
}

/// Floor for the poll interval; a zero period would spin
const MIN_INTERVAL: Duration = Duration::from_millis(1);

type Progress<'a> = Box<dyn Fn(u64) + Send + Sync + 'a>;

/// Watches one job on behalf of the session
pub struct JobMonitor<'a, E: CommandExecutor + ?Sized> {
    executor: &'a E,
    settings: &'a SessionSettings,
    parser: ConnectionInfoParser,
    interval: Duration,
    progress: Option<Progress<'a>>,
}

impl<'a, E: CommandExecutor + ?Sized> JobMonitor<'a, E> {
    pub fn new(executor: &'a E, settings: &'a SessionSettings) -> Self {
        Self {
            executor,
            settings,
            parser: ConnectionInfoParser::new(),
            interval: settings.poll_interval.max(MIN_INTERVAL),
            progress: None,
        }
    }

    /// Override the poll interval from the settings
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Called with the iteration number before every poll
    pub fn with_progress(mut self, progress: impl Fn(u64) + Send + Sync + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Run one readiness check followed by one failure check
    pub async fn poll_once(&self, job_id: &JobId) -> Result<PollVerdict, MonitorError> {
        let candidate = self.read_connection_info(job_id).await?;

        if self.is_failed(job_id).await? {
            return Ok(PollVerdict::Failed);
        }

        Ok(match candidate {
            Some(info) => PollVerdict::Ready(info),
            None => PollVerdict::Pending,
        })
    }

    /// Poll `job` until it is ready, has failed or `cancel` fires.
    ///
    /// The job moves to `Polling` on entry and to `Ready` or `Failed` on
    /// the matching verdict. Cancellation leaves it in `Polling`.
    pub async fn wait_until_ready(
        &self,
        job: &mut Job,
        cancel: &CancellationToken,
    ) -> Result<MonitorOutcome, MonitorError> {
        job.transition(JobState::Polling)?;
        tracing::info!("Waiting for job {} to start the notebook server", job.id());

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut iteration: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Stopped polling job {}", job.id());
                    return Ok(MonitorOutcome::Cancelled);
                }
                _ = ticker.tick() => {}
            }

            iteration += 1;
            tracing::debug!("Polling job {} (iteration {})", job.id(), iteration);
            if let Some(progress) = &self.progress {
                progress(iteration);
            }

            let verdict = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Stopped polling job {}", job.id());
                    return Ok(MonitorOutcome::Cancelled);
                }
                verdict = self.poll_once(job.id()) => verdict?,
            };

            match verdict {
                PollVerdict::Pending => {}
                PollVerdict::Ready(info) => {
                    job.transition(JobState::Ready)?;
                    tracing::info!(
                        "Notebook server for job {} is up at {}:{}",
                        job.id(),
                        info.host,
                        info.port
                    );
                    return Ok(MonitorOutcome::Ready(info));
                }
                PollVerdict::Failed => {
                    job.transition(JobState::Failed)?;
                    tracing::error!("Job {} failed", job.id());
                    return Ok(MonitorOutcome::Failed);
                }
            }
        }
    }

    async fn read_connection_info(&self, job_id: &JobId) -> Result<Option<ConnectionInfo>, ExecError> {
        let log = self.settings.error_log_path(job_id.as_str());
        let result = self
            .executor
            .execute(&["cat".to_string(), log], false)
            .await?;
        if !result.success() {
            tracing::debug!("Error log of job {} not readable yet", job_id);
            return Ok(None);
        }

        match self.parser.parse(&result.stdout) {
            Ok(info) => Ok(Some(info)),
            Err(ParseError::NotReady) => Ok(None),
            Err(ParseError::Malformed) => {
                tracing::debug!("Job {} mentions a token but no usable URL yet", job_id);
                Ok(None)
            }
        }
    }

    async fn is_failed(&self, job_id: &JobId) -> Result<bool, ExecError> {
        let result = self
            .executor
            .execute(
                &[
                    "sacct".to_string(),
                    "-j".to_string(),
                    job_id.to_string(),
                    "-n".to_string(),
                ],
                false,
            )
            .await?;
        Ok(result.stdout.contains(FAILED_STATE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeExecutor;
    use hn_core::error::JobError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::Instant;

    const LOG: &str = "[I 10:00:01 NotebookApp] Serving notebooks from local directory: /home/u\n\
                       [I 10:00:01 NotebookApp] http://10.0.0.5:9700/?token=abc123";

    fn job() -> Job {
        Job::submitted(JobId::from("4821"), "/tmp/hpcnbXyZ123")
    }

    fn info() -> ConnectionInfo {
        ConnectionInfo {
            host: "10.0.0.5".to_string(),
            port: 9700,
            token: "abc123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_poll_once_reads_log_then_accounting() {
        let exec = FakeExecutor::new();
        exec.respond("cat", 0, LOG, "");
        let settings = SessionSettings::default();
        let monitor = JobMonitor::new(&exec, &settings);

        let verdict = monitor.poll_once(&JobId::from("4821")).await.unwrap();
        assert_eq!(verdict, PollVerdict::Ready(info()));

        let calls = exec.calls();
        assert_eq!(calls[0].argv, vec!["cat", ".hpcnb/hpcnb-4821.error"]);
        assert_eq!(calls[1].argv, vec!["sacct", "-j", "4821", "-n"]);
        assert!(calls.iter().all(|call| !call.local));
    }

    #[tokio::test]
    async fn test_failure_wins_over_url() {
        let exec = FakeExecutor::new();
        exec.respond("cat", 0, LOG, "");
        exec.respond("sacct", 0, "4821 hpcnb cpu FAILED 1:0", "");
        let settings = SessionSettings::default();
        let monitor = JobMonitor::new(&exec, &settings);

        assert_eq!(
            monitor.poll_once(&JobId::from("4821")).await.unwrap(),
            PollVerdict::Failed
        );

        let mut job = job();
        let outcome = monitor
            .wait_until_ready(&mut job, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, MonitorOutcome::Failed);
        assert_eq!(job.state(), JobState::Failed);
    }

    #[tokio::test]
    async fn test_malformed_url_is_pending() {
        let exec = FakeExecutor::new();
        exec.respond("cat", 0, "token: http://node05:9700/?token=abc", "");
        let settings = SessionSettings::default();
        let monitor = JobMonitor::new(&exec, &settings);

        assert_eq!(
            monitor.poll_once(&JobId::from("4821")).await.unwrap(),
            PollVerdict::Pending
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_unreadable_logs() {
        let exec = FakeExecutor::new();
        exec.respond("cat", 1, "", "cat: .hpcnb/hpcnb-4821.error: No such file or directory");
        exec.respond("cat", 0, "[I NotebookApp] Writing notebook server cookie secret", "");
        exec.respond("cat", 0, LOG, "");
        let settings = SessionSettings::default();
        let monitor = JobMonitor::new(&exec, &settings);
        let mut job = job();

        let start = Instant::now();
        let outcome = monitor
            .wait_until_ready(&mut job, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, MonitorOutcome::Ready(info()));
        assert_eq!(job.state(), JobState::Ready);
        assert_eq!(exec.count("cat"), 3);
        assert_eq!(exec.count("sacct"), 3);
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let exec = FakeExecutor::new();
        exec.respond("cat", 1, "", "");
        let settings = SessionSettings::default();
        let monitor = JobMonitor::new(&exec, &settings);
        let mut job = job();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            trigger.cancel();
        });

        let outcome = monitor.wait_until_ready(&mut job, &cancel).await.unwrap();
        assert_eq!(outcome, MonitorOutcome::Cancelled);
        assert_eq!(job.state(), JobState::Polling);
        // Polls at 0, 500 and 1000 ms
        assert_eq!(exec.count("cat"), 3);
        assert_eq!(exec.count("sacct"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_poll() {
        let exec = FakeExecutor::new();
        let settings = SessionSettings::default();
        let monitor = JobMonitor::new(&exec, &settings);
        let mut job = job();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = monitor.wait_until_ready(&mut job, &cancel).await.unwrap();

        assert_eq!(outcome, MonitorOutcome::Cancelled);
        assert!(exec.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_polling_after_terminal_state() {
        let exec = FakeExecutor::new();
        exec.respond("cat", 0, LOG, "");
        let settings = SessionSettings::default();
        let monitor = JobMonitor::new(&exec, &settings);
        let mut job = job();
        let cancel = CancellationToken::new();

        monitor.wait_until_ready(&mut job, &cancel).await.unwrap();
        let calls = exec.calls().len();

        let err = monitor.wait_until_ready(&mut job, &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            MonitorError::Job(JobError::InvalidTransition { from: JobState::Ready, .. })
        ));
        assert_eq!(exec.calls().len(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_and_custom_interval() {
        let exec = FakeExecutor::new();
        exec.respond("cat", 1, "", "");
        exec.respond("cat", 1, "", "");
        exec.respond("cat", 0, LOG, "");
        let settings = SessionSettings::default();
        let seen = AtomicU64::new(0);
        let monitor = JobMonitor::new(&exec, &settings)
            .with_interval(Duration::from_secs(5))
            .with_progress(|iteration| seen.store(iteration, Ordering::SeqCst));
        let mut job = job();

        let start = Instant::now();
        monitor
            .wait_until_ready(&mut job, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_polls() {
        let exec = FakeExecutor::new();
        exec.respond("cat", 1, "", "");
        exec.respond("cat", 0, LOG, "");
        let settings = SessionSettings {
            poll_interval: Duration::ZERO,
            ..SessionSettings::default()
        };
        let monitor = JobMonitor::new(&exec, &settings);
        let mut job = job();

        let outcome = monitor
            .wait_until_ready(&mut job, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, MonitorOutcome::Ready(_)));
        assert_eq!(exec.count("cat"), 2);
    }

    #[tokio::test]
    async fn test_unrunnable_command_is_an_error() {
        let exec = FakeExecutor::new();
        exec.fail_spawn("cat");
        let settings = SessionSettings::default();
        let monitor = JobMonitor::new(&exec, &settings);
        let mut job = job();

        let err = monitor
            .wait_until_ready(&mut job, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Exec(ExecError::Spawn { .. })));
    }
}
