//! hn-cli: Command-line interface for hpc-notebook
//!
//! Provides the `hpc-notebook` binary, which starts a notebook server on a
//! SLURM cluster and tunnels it to the local browser.

pub mod commands;
pub mod output;
