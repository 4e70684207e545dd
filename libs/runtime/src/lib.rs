//! Process-level runtime support: layered configuration and logging setup.

pub mod config;
pub mod logging;

pub use config::{
    default_logging_config, AppConfig, CliOverrides, LoggingConfig, Section, ServerConfig,
};
