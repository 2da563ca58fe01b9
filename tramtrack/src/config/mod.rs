//! User configuration loaded from `~/.tramtrack/config.ini`.
//!
//! # Example
//!
//! ```no_run
//! use tramtrack::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let channel = config.channel_config();
//! let reconciler = config.reconciler_config();
//! # Ok::<(), tramtrack::config::ConfigFileError>(())
//! ```

mod components;
mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, FallbackSettings, LoggingSettings, MotionSettings, ReconnectSettings,
    ServerSettings, TrackingSettings,
};
