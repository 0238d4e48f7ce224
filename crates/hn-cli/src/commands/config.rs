//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use hn_core::config::{self, SessionSettings};

fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Print the config file location
pub fn config_path(config_path: Option<&Path>) -> Result<()> {
    println!("{}", resolve_path(config_path).display());
    Ok(())
}

/// Show the effective settings
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(config_path);

    let settings = if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
        config::load_config::<SessionSettings>(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?
    } else {
        print_warning(&format!("No configuration file found at {:?}, showing defaults", path));
        print_info("Run 'hpc-notebook config init' to create one");
        SessionSettings::default()
    };
    println!();

    let content = toml::to_string_pretty(&settings).context("Failed to render settings")?;
    println!("{}", content);

    Ok(())
}

/// Write a config file holding the default settings
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = resolve_path(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(&path, &SessionSettings::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    print_success(&format!("Created configuration file: {:?}", path));

    Ok(())
}
