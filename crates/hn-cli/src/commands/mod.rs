//! CLI command implementations

mod config;
mod script;
mod start;

pub use config::{config_init, config_path, config_show};
pub use script::script_command;
pub use start::{start_command, SessionOptions};
