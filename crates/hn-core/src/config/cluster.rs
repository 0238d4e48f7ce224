//! Cluster configuration resolved from the environment

use crate::error::ConfigError;

/// Resolve `name` through `lookup`, falling back to `default`.
///
/// A present variable always wins, even when empty. An empty default is
/// still a default. Only "absent and no default" is an error.
pub fn resolve_var<F>(lookup: &F, name: &str, default: Option<&str>) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match (lookup(name), default) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default.to_string()),
        (None, None) => Err(ConfigError::MissingVar(name.to_string())),
    }
}

/// Command-line overrides applied on top of the environment
#[derive(Debug, Clone, Default)]
pub struct ClusterOverrides {
    pub partition: Option<String>,
    pub time_limit: Option<String>,
}

/// Where and how the notebook job runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// SSH destination of the cluster login node
    pub cluster_host: String,
    /// Python virtual environment on the cluster
    pub venv_path: String,
    /// Directory the notebook server starts in
    pub workdir: String,
    /// Scheduler partition
    pub partition: String,
    /// Wall-clock limit in scheduler syntax
    pub time_limit: String,
}

impl ClusterConfig {
    pub const CLUSTER_VAR: &'static str = "CLUSTER";
    pub const VENV_VAR: &'static str = "PYTHON_VENV";
    pub const WORKDIR_VAR: &'static str = "WORKDIR";
    pub const PARTITION_VAR: &'static str = "HPCNB_PARTITION";
    pub const TIME_LIMIT_VAR: &'static str = "HPCNB_TIME_LIMIT";

    pub const DEFAULT_WORKDIR: &'static str = "~";
    pub const DEFAULT_PARTITION: &'static str = "cpu";
    pub const DEFAULT_TIME_LIMIT: &'static str = "3:00:00";

    /// Resolve from the process environment
    pub fn from_env(overrides: &ClusterOverrides) -> Result<Self, ConfigError> {
        Self::resolve(|name| std::env::var(name).ok(), overrides)
    }

    /// Resolve through an arbitrary variable lookup
    pub fn resolve<F>(lookup: F, overrides: &ClusterOverrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cluster_host = resolve_var(&lookup, Self::CLUSTER_VAR, None)?;
        let venv_path = resolve_var(&lookup, Self::VENV_VAR, None)?;
        let workdir = resolve_var(&lookup, Self::WORKDIR_VAR, Some(Self::DEFAULT_WORKDIR))?;

        let partition = match &overrides.partition {
            Some(partition) => partition.clone(),
            None => resolve_var(&lookup, Self::PARTITION_VAR, Some(Self::DEFAULT_PARTITION))?,
        };
        let time_limit = match &overrides.time_limit {
            Some(limit) => limit.clone(),
            None => resolve_var(&lookup, Self::TIME_LIMIT_VAR, Some(Self::DEFAULT_TIME_LIMIT))?,
        };

        Ok(Self {
            cluster_host,
            venv_path,
            workdir,
            partition,
            time_limit,
        })
    }

    /// Path of the activation script sourced by the job
    pub fn activate_path(&self) -> String {
        format!("{}/bin/activate", self.venv_path.trim_end_matches('/'))
    }
}
