use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::config::LauncherConfig;

use super::LauncherError;

/// Brings up a daemon that connects back to the launcher
pub trait DaemonSummoner {
    fn summon(&mut self, launcher_port: u16) -> Result<(), LauncherError>;
}

/// Starts the daemon as a child process. Its output goes to
/// `<settings_dir>/daemon.log`, or to this process when debug logging is on.
pub struct ProcessDaemonSummoner {
    program: PathBuf,
    settings_dir: PathBuf,
    debug_logging: bool,
    children: Vec<Child>,
}

impl ProcessDaemonSummoner {
    pub fn new(program: impl Into<PathBuf>, config: &LauncherConfig) -> Self {
        Self {
            program: program.into(),
            settings_dir: config.settings_dir.clone(),
            debug_logging: config.debug_logging,
            children: Vec::new(),
        }
    }

    pub fn command(&self, launcher_port: u16) -> Command {
        let mut command = Command::new(&self.program);
        command.arg(launcher_port.to_string()).stdin(Stdio::null());
        command
    }

    pub fn output_log(&self) -> PathBuf {
        self.settings_dir.join("daemon.log")
    }

    /// Wait for every daemon started so far to exit
    pub fn wait_all(&mut self) -> std::io::Result<()> {
        for mut child in self.children.drain(..) {
            let status = child.wait()?;
            tracing::info!(pid = child.id(), status = %status, "Daemon process exited");
        }
        Ok(())
    }

    fn redirect_output(&self, command: &mut Command) -> Result<(), LauncherError> {
        if self.debug_logging {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            return Ok(());
        }

        let log_path = self.output_log();
        let settings_error = |source: std::io::Error| LauncherError::SettingsDir {
            path: self.settings_dir.clone(),
            source,
        };
        fs::create_dir_all(&self.settings_dir).map_err(settings_error)?;
        let log = File::create(&log_path).map_err(settings_error)?;
        let log_copy = log.try_clone().map_err(settings_error)?;
        command.stdout(log).stderr(log_copy);
        Ok(())
    }

    pub fn settings_dir(&self) -> &Path {
        &self.settings_dir
    }
}

impl DaemonSummoner for ProcessDaemonSummoner {
    fn summon(&mut self, launcher_port: u16) -> Result<(), LauncherError> {
        let mut command = self.command(launcher_port);
        self.redirect_output(&mut command)?;

        let child = command.spawn().map_err(|source| LauncherError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        tracing::info!(
            pid = child.id(),
            program = %self.program.display(),
            launcher_port,
            "👻 Daemon process started"
        );
        self.children.push(child);
        Ok(())
    }
}
