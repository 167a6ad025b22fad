use crate::core::kmer::MAX_KMER_LENGTH;
use crate::core::paired_reads::{CloneLibrary, CloneLibraryRecord};
use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Configuration for a complete assembly run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssemblerConfiguration {
    /// Graph construction and cleaning
    pub assembly: AssemblyConfig,
    /// Mate-pair scaffolding
    pub scaffold: ScaffoldConfig,
    /// Thread pool sizing
    pub performance: PerformanceConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// K-mer length; estimated from read lengths when unset
    pub kmer_length: Option<usize>,
    /// Longest tip removed, in nodes; defaults to k + 1
    pub dangling_links_threshold: Option<usize>,
    /// Longest bubble branch explored, in nodes; defaults to 3 * (k + 1)
    pub redundant_path_length_threshold: Option<usize>,
    /// Erode low-coverage graph ends before the first tip removal
    pub erosion: bool,
    /// Coverage below which end nodes are eroded; estimated when unset
    pub erosion_threshold: Option<usize>,
    /// Delete contigs with low mean coverage before building contigs
    pub low_coverage_contig_removal: bool,
    /// Mean coverage below which contigs are removed; estimated when unset
    pub contig_coverage_threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaffoldConfig {
    pub enabled: bool,
    /// Minimum number of agreeing mate pairs for a contig link
    pub redundancy: usize,
    /// Maximum number of contigs on a traced path
    pub depth: usize,
    /// Include the built-in libraries in addition to `libraries`
    pub use_builtin_libraries: bool,
    pub libraries: Vec<CloneLibraryRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub num_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log output format (json, pretty, compact)
    pub format: String,
    /// Log file path (optional, rotated daily)
    pub file_path: Option<PathBuf>,
}

/// Errors surfaced by configuration and input validation
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Input/Output error: {message}")]
    IOError { message: String },

    #[error("Validation error: {field} is invalid: {reason}")]
    ValidationError { field: String, reason: String },

    #[error("Duplicate read identifier: {id}")]
    DuplicateRead { id: String },

    #[error("Unknown clone library: {name}")]
    UnknownLibrary { name: String },
}

impl From<ConfigError> for AssemblyError {
    fn from(err: ConfigError) -> Self {
        AssemblyError::ConfigurationError {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AssemblyError {
    fn from(err: std::io::Error) -> Self {
        AssemblyError::IOError {
            message: err.to_string(),
        }
    }
}

impl AssemblyConfig {
    pub fn dangling_links_threshold_for(&self, kmer_length: usize) -> usize {
        self.dangling_links_threshold.unwrap_or(kmer_length + 1)
    }

    pub fn redundant_path_length_threshold_for(&self, kmer_length: usize) -> usize {
        self.redundant_path_length_threshold
            .unwrap_or(3 * (kmer_length + 1))
    }
}

impl ScaffoldConfig {
    /// Build the library lookup handed to the scaffold phase
    pub fn clone_library(&self) -> Result<CloneLibrary> {
        let mut library = if self.use_builtin_libraries {
            CloneLibrary::with_builtin_libraries()
        } else {
            CloneLibrary::new()
        };
        for record in &self.libraries {
            library.try_add(record.clone())?;
        }
        Ok(library)
    }
}

/// Configuration manager with validation and environment integration
pub struct ConfigurationManager {
    config: AssemblerConfiguration,
    config_path: Option<PathBuf>,
    _log_guard: Option<WorkerGuard>,
}

impl ConfigurationManager {
    /// Load configuration from `denovo.toml` and `DENOVO__*` variables
    pub fn new() -> Result<Self, AssemblyError> {
        Self::load_from_default_locations()
    }

    /// Create configuration manager with pure defaults (no file dependencies)
    pub fn new_with_defaults() -> Result<Self, AssemblyError> {
        Self::from_config(AssemblerConfiguration::default(), None)
    }

    /// Load configuration from specific file
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, AssemblyError> {
        let config_path = config_path.as_ref().to_path_buf();
        let config = Self::load_config_from_file(&config_path)?;
        Self::from_config(config, Some(config_path))
    }

    fn from_config(
        config: AssemblerConfiguration,
        config_path: Option<PathBuf>,
    ) -> Result<Self, AssemblyError> {
        validate_configuration(&config)?;
        let guard = setup_logging(&config.logging)?;

        Ok(Self {
            config,
            config_path,
            _log_guard: guard,
        })
    }

    fn load_from_default_locations() -> Result<Self, AssemblyError> {
        let builder = Config::builder()
            .add_source(File::with_name("denovo").required(false))
            .add_source(Environment::with_prefix("DENOVO").separator("__"));

        let config: AssemblerConfiguration = match builder.build() {
            Ok(built) => match built.try_deserialize() {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to deserialize configuration: {}, using built-in defaults", e);
                    AssemblerConfiguration::default()
                }
            },
            Err(e) => {
                warn!("Failed to build configuration: {}, using built-in defaults", e);
                AssemblerConfiguration::default()
            }
        };

        Self::from_config(config, None)
    }

    fn load_config_from_file(path: &Path) -> Result<AssemblerConfiguration, AssemblyError> {
        let config = Config::builder().add_source(File::from(path)).build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn config(&self) -> &AssemblerConfiguration {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AssemblerConfiguration {
        &mut self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Save current configuration to file
    pub fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<(), AssemblyError> {
        write_toml(&self.config, path.as_ref())?;
        info!("💾 Configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}

fn write_toml(config: &AssemblerConfiguration, path: &Path) -> Result<(), AssemblyError> {
    let toml_string =
        toml::to_string_pretty(config).map_err(|e| AssemblyError::ConfigurationError {
            message: format!("Failed to serialize configuration: {e}"),
        })?;

    std::fs::write(path, toml_string).map_err(|e| AssemblyError::IOError {
        message: format!("Failed to write configuration file {}: {e}", path.display()),
    })
}

fn invalid(field: &str, reason: impl Into<String>) -> AssemblyError {
    AssemblyError::ValidationError {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Validate configuration parameters
pub fn validate_configuration(config: &AssemblerConfiguration) -> Result<(), AssemblyError> {
    let assembly = &config.assembly;

    if let Some(k) = assembly.kmer_length {
        if k == 0 || k > MAX_KMER_LENGTH {
            return Err(invalid(
                "assembly.kmer_length",
                format!("must be between 1 and {MAX_KMER_LENGTH}"),
            ));
        }
    }

    if let Some(threshold) = assembly.contig_coverage_threshold {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(invalid(
                "assembly.contig_coverage_threshold",
                "must be a non-negative number",
            ));
        }
    }

    if config.performance.num_threads == 0 {
        return Err(invalid("performance.num_threads", "must be greater than 0"));
    }

    let available_threads = num_cpus::get();
    if config.performance.num_threads > available_threads * 2 {
        warn!(
            "Configured threads ({}) exceeds available cores ({})",
            config.performance.num_threads, available_threads
        );
    }

    let mut names = std::collections::BTreeSet::new();
    for library in &config.scaffold.libraries {
        if library.name.is_empty() {
            return Err(invalid("scaffold.libraries", "library name must not be empty"));
        }
        if !names.insert(library.name.as_str()) {
            return Err(invalid(
                "scaffold.libraries",
                format!("library {} is defined twice", library.name),
            ));
        }
        if !library.mean.is_finite()
            || !library.standard_deviation.is_finite()
            || library.standard_deviation < 0.0
        {
            return Err(invalid(
                "scaffold.libraries",
                format!("library {} has an invalid insert size", library.name),
            ));
        }
    }

    if config.scaffold.enabled && config.scaffold.depth == 0 {
        warn!("Scaffolding enabled with depth 0: no contig paths will be traced");
    }

    if !matches!(config.logging.format.as_str(), "json" | "compact" | "pretty") {
        return Err(invalid("logging.format", "must be one of json, compact, pretty"));
    }

    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. When a subscriber
/// is already installed this is a no-op. The returned guard must be kept
/// alive for as long as file logging should be flushed.
pub fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, AssemblyError> {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if tracing::dispatcher::has_been_set() {
        return Ok(None);
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (writer, guard) = match &config.file_path {
        Some(file_path) => {
            let directory = file_path.parent().unwrap_or(Path::new("."));
            let file_name = file_path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("assembly.log"));
            let file_appender = tracing_appender::rolling::daily(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let installed = match config.format.as_str() {
        "json" => tracing::subscriber::set_global_default(
            subscriber.with(fmt::layer().json().with_thread_ids(true).with_writer(writer)),
        ),
        "compact" => tracing::subscriber::set_global_default(
            subscriber.with(fmt::layer().compact().with_writer(writer)),
        ),
        _ => tracing::subscriber::set_global_default(
            subscriber.with(
                fmt::layer()
                    .without_time()
                    .with_target(false)
                    .with_writer(writer),
            ),
        ),
    };

    if installed.is_err() {
        // lost a race with another initializer
        return Ok(None);
    }

    info!(
        "📝 Logging initialized with level: {}, format: {}",
        config.level, config.format
    );
    Ok(guard)
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            kmer_length: None,
            dangling_links_threshold: None,
            redundant_path_length_threshold: None,
            erosion: false,
            erosion_threshold: None,
            low_coverage_contig_removal: false,
            contig_coverage_threshold: None,
        }
    }
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redundancy: 2,
            depth: 10,
            use_builtin_libraries: false,
            libraries: Vec::new(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Utility functions for configuration management
pub mod config_utils {
    use super::*;

    /// Validate a configuration file without installing logging
    pub fn validate_config_file<P: AsRef<Path>>(path: P) -> Result<(), AssemblyError> {
        let config = ConfigurationManager::load_config_from_file(path.as_ref())?;
        validate_configuration(&config)
    }

    /// Generate a template configuration file
    pub fn generate_config_template<P: AsRef<Path>>(path: P) -> Result<(), AssemblyError> {
        let mut template = AssemblerConfiguration::default();
        template.assembly.kmer_length = Some(21);
        template.scaffold.enabled = true;
        template
            .scaffold
            .libraries
            .push(CloneLibraryRecord::new("example", 3000.0, 300.0));
        write_toml(&template, path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AssemblerConfiguration::default();
        assert!(validate_configuration(&config).is_ok());
        assert_eq!(config.scaffold.redundancy, 2);
        assert_eq!(config.scaffold.depth, 10);
        assert!(config.performance.num_threads > 0);
    }

    #[test]
    fn test_default_thresholds_follow_kmer_length() {
        let config = AssemblyConfig::default();
        assert_eq!(config.dangling_links_threshold_for(11), 12);
        assert_eq!(config.redundant_path_length_threshold_for(11), 36);

        let config = AssemblyConfig {
            dangling_links_threshold: Some(3),
            redundant_path_length_threshold: Some(7),
            ..AssemblyConfig::default()
        };
        assert_eq!(config.dangling_links_threshold_for(11), 3);
        assert_eq!(config.redundant_path_length_threshold_for(11), 7);
    }

    #[test]
    fn test_invalid_kmer_length_rejected() {
        let mut config = AssemblerConfiguration::default();
        config.assembly.kmer_length = Some(0);
        assert!(matches!(
            validate_configuration(&config),
            Err(AssemblyError::ValidationError { .. })
        ));

        config.assembly.kmer_length = Some(MAX_KMER_LENGTH + 1);
        assert!(validate_configuration(&config).is_err());
    }

    #[test]
    fn test_duplicate_library_rejected() {
        let mut config = AssemblerConfiguration::default();
        config.scaffold.libraries = vec![
            CloneLibraryRecord::new("lib", 100.0, 10.0),
            CloneLibraryRecord::new("lib", 200.0, 10.0),
        ];
        assert!(validate_configuration(&config).is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = AssemblerConfiguration::default();
        config.logging.format = "xml".to_string();
        assert!(validate_configuration(&config).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("denovo.toml");

        let mut config = AssemblerConfiguration::default();
        config.assembly.kmer_length = Some(19);
        config.scaffold.libraries.push(CloneLibraryRecord::new("abc", 5.0, 20.0));
        write_toml(&config, &config_path).unwrap();

        let loaded = ConfigurationManager::load_config_from_file(&config_path).unwrap();
        assert_eq!(loaded.assembly.kmer_length, Some(19));
        assert_eq!(loaded.scaffold.libraries.len(), 1);
        assert_eq!(loaded.scaffold.libraries[0].name, "abc");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        std::fs::write(&config_path, "[assembly]\nkmer_length = 15\n").unwrap();

        let loaded = ConfigurationManager::load_config_from_file(&config_path).unwrap();
        assert_eq!(loaded.assembly.kmer_length, Some(15));
        assert_eq!(loaded.scaffold.depth, 10);
        assert_eq!(loaded.logging.format, "pretty");
    }

    #[test]
    fn test_template_generation() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("template.toml");
        config_utils::generate_config_template(&path).unwrap();
        assert!(config_utils::validate_config_file(&path).is_ok());
    }

    #[test]
    fn test_clone_library_from_config() {
        let mut config = ScaffoldConfig::default();
        config.libraries.push(CloneLibraryRecord::new("abc", 5.0, 20.0));
        let library = config.clone_library().unwrap();
        assert_eq!(library.len(), 1);
        assert!(library.get("abc").is_some());

        config.use_builtin_libraries = true;
        let library = config.clone_library().unwrap();
        assert!(library.get("0.5K").is_some());
        assert!(library.get("2K").is_some());
    }
}
