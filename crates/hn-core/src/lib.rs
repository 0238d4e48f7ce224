//! hn-core: Core abstractions and configuration for hpc-notebook
//!
//! This crate provides the job and connection types, the error taxonomy,
//! configuration resolution, the command execution seam, job script
//! rendering and the notebook URL parser shared by the session and CLI
//! crates.

pub mod config;
pub mod error;
pub mod exec;
pub mod parser;
pub mod script;
pub mod types;

pub use config::{ClusterConfig, SessionSettings};
pub use exec::{CommandExecutor, RemoteCommandResult, SshExecutor};
pub use parser::ConnectionInfoParser;
pub use types::{ConnectionInfo, Job, JobId, JobState};
