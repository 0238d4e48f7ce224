//! Session settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::{duration_millis, option_duration_secs};
use crate::error::ConfigError;

/// Operational knobs for a notebook session, loaded from `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Scheduler job name; also names the remote state directory `.{job_name}`
    pub job_name: String,

    /// Port the notebook server listens on inside the allocation
    pub notebook_port: u16,

    /// Local end of the SSH tunnel
    pub local_port: u16,

    /// Delay between poll iterations while waiting for the server
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// Remote directory the job script is copied into before `sbatch`
    pub staging_dir: String,

    /// SSH client used for remote commands and the tunnel
    pub ssh_program: String,

    /// Copy program used to stage the job script
    pub scp_program: String,

    /// Extra options placed before the cluster host on every `ssh` call
    pub ssh_options: Vec<String>,

    /// Give up waiting for the server after this long (seconds)
    #[serde(with = "option_duration_secs", skip_serializing_if = "Option::is_none")]
    pub wait_timeout: Option<Duration>,

    /// Open a browser once the tunnel is up
    pub open_browser: bool,

    /// Leave the job running when the tunnel exits on its own
    pub keep_job: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            job_name: "hpcnb".to_string(),
            notebook_port: 9700,
            local_port: 8080,
            poll_interval: Duration::from_millis(500),
            staging_dir: "/tmp".to_string(),
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            ssh_options: vec![],
            wait_timeout: None,
            open_browser: true,
            keep_job: false,
        }
    }
}

impl SessionSettings {
    /// Reject values the session cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.job_name.is_empty() {
            return Err(ConfigError::Invalid("job_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Remote directory (relative to the login home) holding job logs
    pub fn state_dir(&self) -> String {
        format!(".{}", self.job_name)
    }

    /// Remote path of the captured stderr of `job_id`
    pub fn error_log_path(&self, job_id: &str) -> String {
        format!("{}/{}-{}.error", self.state_dir(), self.job_name, job_id)
    }

    /// Staging path for a script file name on the cluster
    pub fn staged_script_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.staging_dir.trim_end_matches('/'), file_name)
    }
}
