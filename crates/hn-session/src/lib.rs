//! hn-session: Notebook job lifecycle for hpc-notebook
//!
//! Submits the notebook job, watches it until the server announces its
//! URL, then forwards a local port to it over SSH and supervises that
//! tunnel until the user is done or interrupts.

pub mod browser;
pub mod controller;
pub mod error;
pub mod monitor;
pub mod submit;
pub mod tunnel;

#[cfg(test)]
mod test_support;

pub use browser::{Browser, SystemBrowser};
pub use controller::{SessionController, SessionEvent, SessionOutcome};
pub use error::{MonitorError, SessionError};
pub use monitor::{JobMonitor, MonitorOutcome, PollVerdict};
pub use submit::JobSubmitter;
pub use tunnel::{SshTunnel, SshTunnelManager, TunnelExit, TunnelHandle, TunnelManager, TunnelSpec};
