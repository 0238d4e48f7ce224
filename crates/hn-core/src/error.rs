//! Core error types for hpc-notebook

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{JobId, JobState};

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is not set
    #[error("Please set the {0} environment variable")]
    MissingVar(String),

    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Errors raised while running a local or remote command
#[derive(Error, Debug)]
pub enum ExecError {
    /// The program could not be started at all
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited non-zero
    #[error("{command} exited with code {exit_code}: {stderr}")]
    NonZero {
        command: String,
        exit_code: i32,
        stderr: String,
    },
}

/// Errors raised while rendering or writing the job script
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Temporary file could not be created or written
    #[error("Failed to write job script: {0}")]
    Write(#[from] std::io::Error),

    /// Script path has no usable file name
    #[error("Job script path has no file name: {0}")]
    NoFileName(PathBuf),
}

/// Errors raised while handing the job script to the scheduler
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// Copying the script to the cluster failed
    #[error("Failed to copy job script to the cluster: {0}")]
    Transfer(String),

    /// The scheduler did not accept the job
    #[error("Scheduler rejected the job: {stdout}")]
    Rejected { stdout: String },

    /// The session was cancelled before `sbatch` was issued
    #[error("Submission cancelled")]
    Cancelled,

    /// Underlying command could not run
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Script path problem
    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Scheduler query errors (node lookup, cancellation)
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Node query failed or returned something that is not a node name
    #[error("Could not resolve node for job {job_id}: {output}")]
    NodeQuery { job_id: JobId, output: String },

    /// Cancelling the job failed
    #[error("Failed to cancel job {job_id}: {output}")]
    Cancel { job_id: JobId, output: String },

    /// Underlying command could not run
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Connection URL parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The server has not printed its token yet
    #[error("Notebook server is not ready yet")]
    NotReady,

    /// A token is mentioned but no well-formed URL carries it
    #[error("No well-formed notebook URL in output")]
    Malformed,
}

/// Job lifecycle errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The requested transition is not part of the job state machine
    #[error("Job {job_id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobState,
        to: JobState,
    },
}

/// SSH tunnel process errors
#[derive(Error, Debug)]
pub enum TunnelError {
    /// The tunnel process could not be started
    #[error("Failed to start tunnel via {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the tunnel process failed
    #[error("Failed to wait for tunnel process: {0}")]
    Wait(#[source] std::io::Error),

    /// Terminating the tunnel process failed
    #[error("Failed to terminate tunnel process: {0}")]
    Kill(#[source] std::io::Error),
}

/// Browser launch errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// The opener program could not be started
    #[error("Failed to launch browser via {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
