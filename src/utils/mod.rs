//! Configuration, error types and logging setup

pub mod configuration;

pub use configuration::{
    setup_logging, validate_configuration, AssemblerConfiguration, AssemblyConfig, AssemblyError,
    ConfigurationManager, LoggingConfig, PerformanceConfig, ScaffoldConfig,
};
