//! Job submission and scheduler queries

use std::path::Path;

use regex::Regex;
use tokio_util::sync::CancellationToken;

use hn_core::config::{ClusterConfig, SessionSettings};
use hn_core::error::{ExecError, ScriptError, SchedulerError, SubmissionError};
use hn_core::exec::{CommandExecutor, RemoteCommandResult};
use hn_core::types::{Job, JobId};

/// Talks to the batch scheduler on the cluster
pub struct JobSubmitter<'a, E: CommandExecutor + ?Sized> {
    executor: &'a E,
    cluster: &'a ClusterConfig,
    settings: &'a SessionSettings,
    sbatch_regex: Regex,
}

impl<'a, E: CommandExecutor + ?Sized> JobSubmitter<'a, E> {
    pub fn new(executor: &'a E, cluster: &'a ClusterConfig, settings: &'a SessionSettings) -> Self {
        Self {
            executor,
            cluster,
            settings,
            sbatch_regex: Regex::new(r"(?m)^Submitted batch job (\d+)\b")
                .expect("sbatch output pattern is valid"),
        }
    }

    /// Extract the job id from `sbatch` stdout
    pub fn parse_job_id(&self, stdout: &str) -> Option<JobId> {
        self.sbatch_regex
            .captures(stdout)
            .map(|caps| JobId::new(&caps[1]))
    }

    /// Stage `script_path` on the cluster and submit it.
    ///
    /// `cancel` is honored between steps. Once `sbatch` has been issued it
    /// runs to completion, so a submitted job always yields its id.
    pub async fn submit(
        &self,
        script_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Job, SubmissionError> {
        Self::check_cancelled(cancel)?;
        self.ensure_state_dir().await?;
        Self::check_cancelled(cancel)?;
        let staged = self.stage(script_path).await?;
        Self::check_cancelled(cancel)?;

        tracing::info!("Launching job");
        let result = self
            .remote(vec!["sbatch".to_string(), staged])
            .await?;

        let job_id = if result.success() {
            self.parse_job_id(&result.stdout)
        } else {
            None
        };

        match job_id {
            Some(job_id) => {
                tracing::info!("Job submitted with id {}", job_id);
                Ok(Job::submitted(job_id, script_path))
            }
            None => Err(SubmissionError::Rejected {
                stdout: result.stdout,
            }),
        }
    }

    /// Make sure the directory the job writes its logs into exists.
    ///
    /// The scheduler does not create it, and a job whose log directory is
    /// missing dies without writing anything we could poll.
    pub async fn ensure_state_dir(&self) -> Result<(), SubmissionError> {
        let state_dir = self.settings.state_dir();
        let listing = self
            .remote(vec!["ls".to_string(), state_dir.clone()])
            .await?;
        if listing.success() {
            tracing::debug!("Remote state directory {} exists", state_dir);
            return Ok(());
        }

        tracing::info!("Creating remote state directory {}", state_dir);
        self.remote(vec!["mkdir".to_string(), "-p".to_string(), state_dir])
            .await?
            .into_success("mkdir")?;
        Ok(())
    }

    /// Copy the script into the staging directory; returns the remote path
    async fn stage(&self, script_path: &Path) -> Result<String, SubmissionError> {
        let file_name = script_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ScriptError::NoFileName(script_path.to_path_buf()))?;

        let destination = format!(
            "{}:{}/",
            self.cluster.cluster_host,
            self.settings.staging_dir.trim_end_matches('/')
        );
        let argv = vec![
            self.settings.scp_program.clone(),
            script_path.display().to_string(),
            destination,
        ];

        let result = self.executor.execute(&argv, true).await?;
        if !result.success() {
            return Err(SubmissionError::Transfer(result.stderr));
        }

        Ok(self.settings.staged_script_path(&file_name))
    }

    /// Name of the node the job was allocated on
    pub async fn allocated_node(&self, job_id: &JobId) -> Result<String, SchedulerError> {
        let result = self
            .remote(vec![
                "squeue".to_string(),
                "-j".to_string(),
                job_id.to_string(),
                "-h".to_string(),
                "--format".to_string(),
                "%N".to_string(),
            ])
            .await?;

        let node = result.stdout.trim();
        if !result.success() || node.is_empty() || node.contains(char::is_whitespace) {
            return Err(SchedulerError::NodeQuery {
                job_id: job_id.clone(),
                output: if result.stdout.is_empty() {
                    result.stderr
                } else {
                    result.stdout
                },
            });
        }
        Ok(node.to_string())
    }

    /// Ask the scheduler to cancel the job
    pub async fn cancel(&self, job_id: &JobId) -> Result<(), SchedulerError> {
        tracing::info!("Cancelling job {}", job_id);
        let result = self
            .remote(vec!["scancel".to_string(), job_id.to_string()])
            .await?;
        if !result.success() {
            return Err(SchedulerError::Cancel {
                job_id: job_id.clone(),
                output: result.stderr,
            });
        }
        tracing::info!("Job {} cancelled", job_id);
        Ok(())
    }

    fn check_cancelled(cancel: &CancellationToken) -> Result<(), SubmissionError> {
        if cancel.is_cancelled() {
            tracing::info!("Submission cancelled before sbatch");
            return Err(SubmissionError::Cancelled);
        }
        Ok(())
    }

    async fn remote(&self, argv: Vec<String>) -> Result<RemoteCommandResult, ExecError> {
        self.executor.execute(&argv, false).await
    }
}
