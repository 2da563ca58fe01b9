//! CLI runner for common setup.
//!
//! Encapsulates config loading and logging initialization so command
//! handlers start from a ready environment.

use crate::error::CliError;
use tracing::info;
use tramtrack::config::ConfigFile;
use tramtrack::logging::{default_log_file, init_logging, LoggingGuard};

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    _logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load config and initialize logging.
    ///
    /// Stdout logging stays off so the status lines printed by `watch` are
    /// readable. `debug_mode` turns it on together with DEBUG-level output.
    pub fn with_debug(debug_mode: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let log_path = &config.logging.file;
        let log_dir = log_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| ".".into());
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| default_log_file().to_string());

        let logging_guard = init_logging(&log_dir, &log_file, debug_mode, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("tramtrack v{}", tramtrack::VERSION);
        info!(
            command,
            log_file = %self.config.logging.file.display(),
            "tramtrack CLI started"
        );
    }
}
