use std::path::PathBuf;
use std::time::Duration;

use crate::utils::RetryConfig;

// ============================================================================
// Configuration
// ============================================================================
//
// Plain structs with defaults. Log filtering is configured separately
// through `RUST_LOG`.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ActorsConfig {
    /// Prepended to every actor thread and worker thread name
    pub thread_name_prefix: String,
    /// Async worker threads of the shared pool
    pub worker_threads: usize,
    /// Upper bound on concurrently running unattended workers
    pub max_unattended_workers: usize,
}

impl Default for ActorsConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: String::new(),
            worker_threads: 2,
            max_unattended_workers: 64,
        }
    }
}

impl ActorsConfig {
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }

    pub fn with_max_unattended_workers(mut self, max: usize) -> Self {
        self.max_unattended_workers = max.max(1);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Usage: {program} <launcher-port>")]
    MissingPort { program: String },

    #[error("Invalid launcher port {value:?}")]
    InvalidPort {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    /// Port the launcher listens on; the daemon's only startup parameter
    pub launcher_port: u16,
    /// How long the daemon lingers after it is no longer needed
    pub exit_delay: Duration,
    pub shutdown_timeout: Duration,
    pub connect_retry: RetryConfig,
    pub actors: ActorsConfig,
}

impl DaemonConfig {
    pub fn new(launcher_port: u16) -> Self {
        Self {
            launcher_port,
            exit_delay: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(5),
            connect_retry: RetryConfig::default(),
            actors: ActorsConfig::default().with_thread_name_prefix("daemon-"),
        }
    }

    /// Parse `argv`: the program name followed by the launcher port
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let program = args.next().unwrap_or_else(|| "testrun-daemon".to_string());
        let value = args.next().ok_or(ConfigError::MissingPort { program })?;
        let launcher_port = value
            .parse::<u16>()
            .map_err(|source| ConfigError::InvalidPort { value, source })?;
        Ok(Self::new(launcher_port))
    }

    pub fn with_exit_delay(mut self, exit_delay: Duration) -> Self {
        self.exit_delay = exit_delay;
        self
    }

    pub fn with_connect_retry(mut self, connect_retry: RetryConfig) -> Self {
        self.connect_retry = connect_retry;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LauncherConfig {
    pub settings_dir: PathBuf,
    pub debug_logging: bool,
    pub shutdown_timeout: Duration,
    pub actors: ActorsConfig,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            settings_dir: PathBuf::from(".testrun"),
            debug_logging: false,
            shutdown_timeout: Duration::from_secs(60),
            actors: ActorsConfig::default().with_thread_name_prefix("launcher-"),
        }
    }
}

impl LauncherConfig {
    pub fn enable_debug_logging(mut self) -> Self {
        self.debug_logging = true;
        self
    }

    pub fn with_settings_dir(mut self, settings_dir: impl Into<PathBuf>) -> Self {
        self.settings_dir = settings_dir.into();
        self
    }
}
