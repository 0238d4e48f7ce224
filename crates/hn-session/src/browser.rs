//! Browser launch

use std::process::Stdio;

use tokio::process::Command;

use hn_core::error::BrowserError;

/// Something that can show the notebook URL to the user
pub trait Browser: Send + Sync {
    fn open(&self, url: &str) -> Result<(), BrowserError>;
}

/// The desktop's default browser, through the platform opener
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl SystemBrowser {
    /// Program and arguments that open `url` on this platform
    pub fn opener(url: &str) -> (&'static str, Vec<String>) {
        #[cfg(target_os = "macos")]
        {
            ("open", vec![url.to_string()])
        }
        #[cfg(target_os = "windows")]
        {
            (
                "cmd",
                vec!["/C".to_string(), "start".to_string(), String::new(), url.to_string()],
            )
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            ("xdg-open", vec![url.to_string()])
        }
    }
}

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), BrowserError> {
        let (program, args) = Self::opener(url);
        launch(program, &args)
    }
}

/// Start `program` and return without waiting for it.
///
/// The exit status is collected on a background task; a non-zero exit is
/// only logged. Must be called from within a Tokio runtime.
pub(crate) fn launch(program: &str, args: &[String]) -> Result<(), BrowserError> {
    tracing::debug!("Opening browser via {}", program);

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| BrowserError::Launch {
            program: program.to_string(),
            source,
        })?;

    let program = program.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if !status.success() => {
                tracing::warn!("{} exited with {}", program, status);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to wait for {}: {}", program, e),
        }
    });
    Ok(())
}
