//! Configuration loading, saving and validation through the public API

use denovo_forge::utils::configuration::config_utils;
use denovo_forge::utils::{validate_configuration, AssemblerConfiguration, ConfigurationManager};
use denovo_forge::{AssemblyError, CloneLibraryRecord, ParallelDeNovoAssembler, SequenceRead};
use tempfile::tempdir;

#[cfg(test)]
pub mod configuration_tests {
    use super::*;

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("denovo.toml");

        let mut manager = ConfigurationManager::new_with_defaults().unwrap();
        {
            let config = manager.config_mut();
            config.assembly.kmer_length = Some(21);
            config.assembly.erosion = true;
            config.scaffold.enabled = true;
            config.scaffold.libraries.push(CloneLibraryRecord::new("3K", 3000.0, 300.0));
        }
        manager.save_config(&path).unwrap();

        let reloaded = ConfigurationManager::from_file(&path).unwrap();
        let config = reloaded.config();
        assert_eq!(reloaded.config_path(), Some(path.as_path()));
        assert_eq!(config.assembly.kmer_length, Some(21));
        assert!(config.assembly.erosion);
        assert!(config.scaffold.enabled);
        assert_eq!(config.scaffold.libraries[0].mean, 3000.0);
    }

    #[test]
    fn test_hand_written_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("run.toml");
        std::fs::write(
            &path,
            r#"
[assembly]
kmer_length = 6
dangling_links_threshold = 3
redundant_path_length_threshold = 7

[scaffold]
enabled = true
redundancy = 0
depth = 3

[[scaffold.libraries]]
name = "abc"
mean = 5.0
standard_deviation = 20.0
"#,
        )
        .unwrap();

        let manager = ConfigurationManager::from_file(&path).unwrap();
        let config = manager.config();
        assert_eq!(config.assembly.kmer_length, Some(6));
        assert_eq!(config.assembly.dangling_links_threshold_for(6), 3);
        assert_eq!(config.scaffold.redundancy, 0);
        assert_eq!(config.scaffold.libraries[0].name, "abc");
        assert!(!config.assembly.low_coverage_contig_removal);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[assembly]\nkmer_length = 64\n").unwrap();

        assert!(matches!(
            ConfigurationManager::from_file(&path),
            Err(AssemblyError::ValidationError { .. })
        ));
        assert!(config_utils::validate_config_file(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("absent.toml");
        assert!(matches!(
            ConfigurationManager::from_file(&path),
            Err(AssemblyError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_template_is_loadable() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("template.toml");
        config_utils::generate_config_template(&path).unwrap();

        let manager = ConfigurationManager::from_file(&path).unwrap();
        assert!(manager.config().scaffold.enabled);
        assert!(validate_configuration(manager.config()).is_ok());
    }

    #[test]
    fn test_loaded_config_drives_assembler() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("small.toml");
        std::fs::write(&path, "[assembly]\nkmer_length = 5\ndangling_links_threshold = 0\n").unwrap();

        let config: AssemblerConfiguration = ConfigurationManager::from_file(&path).unwrap().config().clone();
        let output = ParallelDeNovoAssembler::new(config)
            .assemble(vec![SequenceRead::new("r1", "GATTACAGGC")])
            .unwrap();
        assert_eq!(output.statistics.kmer_length, 5);
        assert_eq!(output.contigs.len(), 1);
    }
}
