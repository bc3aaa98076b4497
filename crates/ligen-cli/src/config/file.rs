use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FilePathsConfig {
    pub root_output_folder: Option<PathBuf>,
    pub source_compound_file: Option<PathBuf>,
    pub reagents_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileGenerationConfig {
    pub num_generations: Option<u32>,
    pub number_of_crossovers: Option<usize>,
    pub number_of_mutants: Option<usize>,
    pub over_provision_factor: Option<f64>,
    pub max_rounds: Option<usize>,
    pub protonation: Option<FileProtonation>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileProtonation {
    Protonated,
    Deprotonated,
}

/// MCS budgets are given in seconds.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileCrossoverConfig {
    pub min_atom_match_mcs: Option<usize>,
    pub max_time_mcs_prescreen: Option<f64>,
    pub max_time_mcs_thorough: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileReactionsConfig {
    /// `click_chem_rxns`, `robust_rxns`, `all_rxns` or `custom`.
    pub library: Option<String>,
    pub custom_reactions: Option<PathBuf>,
    pub custom_groups: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileCustomFilter {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileFiltersConfig {
    pub kinds: Option<Vec<String>>,
    #[serde(default)]
    pub custom: Vec<FileCustomFilter>,
    pub filter_source_compounds: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileExecutionConfig {
    /// `serial`, `threads` or `distributed`.
    pub mode: Option<String>,
    pub workers: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConversionConfig {
    pub convert_to_3d: Option<bool>,
    pub program: Option<String>,
    pub timeout_secs: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub paths: Option<FilePathsConfig>,
    pub generation: Option<FileGenerationConfig>,
    pub crossover: Option<FileCrossoverConfig>,
    pub reactions: Option<FileReactionsConfig>,
    pub filters: Option<FileFiltersConfig>,
    pub execution: Option<FileExecutionConfig>,
    pub conversion: Option<FileConversionConfig>,
    pub debug_mode: Option<bool>,
    pub rng_seed: Option<u64>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn full_file_is_parsed() {
        let toml = r#"
            debug-mode = true
            rng-seed = 42

            [paths]
            root-output-folder = "out"
            source-compound-file = "seeds.smi"
            reagents-dir = "reagents"

            [generation]
            num-generations = 5
            number-of-crossovers = 20
            number-of-mutants = 30
            over-provision-factor = 2.0
            max-rounds = 10
            protonation = "deprotonated"

            [crossover]
            min-atom-match-mcs = 5
            max-time-mcs-prescreen = 0.5
            max-time-mcs-thorough = 2.0

            [reactions]
            library = "robust_rxns"

            [filters]
            kinds = ["lipinski_strict", "pains"]
            filter-source-compounds = true

            [[filters.custom]]
            name = "no_nitro"
            path = "rules/no_nitro.toml"

            [execution]
            mode = "threads"
            workers = 4

            [conversion]
            convert-to-3d = true
            program = "obabel"
            timeout-secs = 30.0
        "#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.rng_seed, Some(42));
        let generation = config.generation.unwrap();
        assert_eq!(generation.num_generations, Some(5));
        assert_eq!(generation.protonation, Some(FileProtonation::Deprotonated));
        let filters = config.filters.unwrap();
        assert_eq!(filters.kinds.unwrap(), vec!["lipinski_strict", "pains"]);
        assert_eq!(
            filters.custom,
            vec![FileCustomFilter {
                name: "no_nitro".to_string(),
                path: PathBuf::from("rules/no_nitro.toml"),
            }]
        );
        assert_eq!(config.conversion.unwrap().timeout_secs, Some(30.0));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[generation]\nnumber-of-children = 3\n").unwrap();
        let err = FileConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
    }
}
