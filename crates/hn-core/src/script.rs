//! Batch job script rendering

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{ClusterConfig, SessionSettings};
use crate::error::ScriptError;

/// Renders the notebook job script and writes it to disk
#[derive(Debug, Clone)]
pub struct JobScriptBuilder<'a> {
    cluster: &'a ClusterConfig,
    settings: &'a SessionSettings,
}

impl<'a> JobScriptBuilder<'a> {
    pub fn new(cluster: &'a ClusterConfig, settings: &'a SessionSettings) -> Self {
        Self { cluster, settings }
    }

    /// Script text for the current configuration
    pub fn render(&self) -> String {
        let name = &self.settings.job_name;
        format!(
            "#!/bin/sh\n\
             #SBATCH --job-name {name}\n\
             #SBATCH --error .{name}/{name}-%j.error\n\
             #SBATCH --output .{name}/{name}-%j.out\n\
             #SBATCH -N 1\n\
             #SBATCH --cpus-per-task 1\n\
             #SBATCH -n 1\n\
             #SBATCH --partition {partition}\n\
             #SBATCH --time {time_limit}\n\
             \n\
             source {activate}\n\
             ip=`hostname`\n\
             cd {workdir}\n\
             jupyter-notebook --no-browser --port={port} --ip=$ip\n",
            name = name,
            partition = self.cluster.partition,
            time_limit = self.cluster.time_limit,
            activate = self.cluster.activate_path(),
            workdir = self.cluster.workdir,
            port = self.settings.notebook_port,
        )
    }

    /// Write the script to a uniquely named file in the system temp dir
    pub fn write(&self) -> Result<PathBuf, ScriptError> {
        self.write_in(&std::env::temp_dir())
    }

    /// Write the script to a uniquely named file inside `dir`.
    ///
    /// The file outlives the process so it can still be inspected after a
    /// failed submission.
    pub fn write_in(&self, dir: &Path) -> Result<PathBuf, ScriptError> {
        let mut file = tempfile::Builder::new()
            .prefix(&self.settings.job_name)
            .tempfile_in(dir)?;
        file.write_all(self.render().as_bytes())?;
        file.flush()?;

        let path = file
            .into_temp_path()
            .keep()
            .map_err(|e| ScriptError::Write(e.error))?;

        tracing::info!("Job script generated: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cluster() -> ClusterConfig {
        ClusterConfig {
            cluster_host: "hpc1".to_string(),
            venv_path: "/home/u/venv".to_string(),
            workdir: "~".to_string(),
            partition: "cpu".to_string(),
            time_limit: "3:00:00".to_string(),
        }
    }

    #[test]
    fn test_render_matches_template() {
        let cluster = cluster();
        let settings = SessionSettings::default();
        let expected = "#!/bin/sh
#SBATCH --job-name hpcnb
#SBATCH --error .hpcnb/hpcnb-%j.error
#SBATCH --output .hpcnb/hpcnb-%j.out
#SBATCH -N 1
#SBATCH --cpus-per-task 1
#SBATCH -n 1
#SBATCH --partition cpu
#SBATCH --time 3:00:00

source /home/u/venv/bin/activate
ip=`hostname`
cd ~
jupyter-notebook --no-browser --port=9700 --ip=$ip
";
        assert_eq!(JobScriptBuilder::new(&cluster, &settings).render(), expected);
    }

    #[test]
    fn test_render_uses_settings() {
        let mut cluster = cluster();
        cluster.partition = "gpu".to_string();
        let mut settings = SessionSettings::default();
        settings.job_name = "lab".to_string();
        settings.notebook_port = 9800;

        let text = JobScriptBuilder::new(&cluster, &settings).render();
        assert!(text.contains("#SBATCH --error .lab/lab-%j.error"));
        assert!(text.contains("#SBATCH --partition gpu"));
        assert!(text.contains("--port=9800"));
    }

    #[test]
    fn test_write_creates_unique_persistent_files() {
        let dir = TempDir::new().unwrap();
        let cluster = cluster();
        let settings = SessionSettings::default();
        let builder = JobScriptBuilder::new(&cluster, &settings);

        let first = builder.write_in(dir.path()).unwrap();
        let second = builder.write_in(dir.path()).unwrap();

        assert_ne!(first, second);
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("hpcnb"));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), builder.render());
    }
}
