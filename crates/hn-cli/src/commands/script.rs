//! Script command: print the job script without submitting it

use std::path::Path;

use anyhow::Result;

use hn_core::script::JobScriptBuilder;

use super::SessionOptions;

/// Render the job script for the current environment to stdout
pub fn script_command(options: &SessionOptions, config_path: Option<&Path>) -> Result<()> {
    let (cluster, settings) = options.resolve(config_path)?;
    print!("{}", JobScriptBuilder::new(&cluster, &settings).render());
    Ok(())
}
