//! Session-level errors

use std::time::Duration;

use thiserror::Error;

use hn_core::error::{
    ExecError, JobError, SchedulerError, ScriptError, SubmissionError, TunnelError,
};
use hn_core::types::JobId;

/// Errors raised while polling a submitted job
#[derive(Error, Debug)]
pub enum MonitorError {
    /// A poll command could not be run at all
    #[error("Polling failed: {0}")]
    Exec(#[from] ExecError),

    /// The job refused a state change
    #[error(transparent)]
    Job(#[from] JobError),
}

/// Errors that end a notebook session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error(transparent)]
    Job(#[from] JobError),

    /// Scheduler accounting reported the job as failed
    #[error("Job {job_id} failed, please have a look at: ~/{error_log}")]
    JobFailed { job_id: JobId, error_log: String },

    /// The notebook server did not come up in time
    #[error("Notebook server did not start within {0:?}")]
    Timeout(Duration),
}
