//! Core domain types

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::JobError;

/// Scheduler-assigned job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Accepted by the scheduler, nothing observed yet
    Submitted,
    /// Monitor is watching the error log and accounting
    Polling,
    /// Notebook server announced its URL
    Ready,
    /// Scheduler accounting reported a failure
    Failed,
    /// Session was interrupted and the job was cancelled
    Cancelled,
}

impl JobState {
    /// Whether no further transitions are allowed
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Ready | JobState::Failed | JobState::Cancelled)
    }

    fn can_transition_to(self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Submitted, JobState::Polling) => true,
            (JobState::Polling, JobState::Ready) | (JobState::Polling, JobState::Failed) => true,
            (from, JobState::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Submitted => write!(f, "submitted"),
            JobState::Polling => write!(f, "polling"),
            JobState::Ready => write!(f, "ready"),
            JobState::Failed => write!(f, "failed"),
            JobState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A batch job started for this session
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    script_path: PathBuf,
    state: JobState,
}

impl Job {
    /// Create a freshly submitted job
    pub fn submitted(id: JobId, script_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            script_path: script_path.into(),
            state: JobState::Submitted,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move the job to `next`, rejecting anything outside the lifecycle.
    ///
    /// Terminal states are sticky: once Ready, Failed or Cancelled, every
    /// further transition fails.
    pub fn transition(&mut self, next: JobState) -> Result<(), JobError> {
        if !self.state.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                job_id: self.id.clone(),
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Job {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Connection credentials announced by the notebook server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub token: String,
}

impl ConnectionInfo {
    /// Browser URL for a local tunnel endpoint forwarding to this server
    pub fn local_url(&self, local_port: u16) -> String {
        format!("http://127.0.0.1:{}/?token={}", local_port, self.token)
    }
}
