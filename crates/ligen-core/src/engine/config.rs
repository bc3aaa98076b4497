use crate::core::reactions::library::ReactionLibrarySource;
use crate::engine::filters::FilterKind;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_OVER_PROVISION_FACTOR: f64 = 1.5;
pub const DEFAULT_MAX_ROUNDS: usize = 20;
pub const DEFAULT_MIN_ATOM_MATCH_MCS: usize = 4;
pub const DEFAULT_MCS_PRESCREEN_TIME: Duration = Duration::from_secs(1);
pub const DEFAULT_MCS_THOROUGH_TIME: Duration = Duration::from_secs(1);
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CONVERSION_PROGRAM: &str = "obabel";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
    #[error("'NoFilters' cannot be combined with other filters")]
    ConflictingFilters,
    #[error("{0} is not supported in this build")]
    Unsupported(&'static str),
    #[error("Generation {generation} has an empty seed population")]
    EmptySeedPopulation { generation: u32 },
    #[error(
        "Generation {generation} needs at least {required} seeds for crossover, found {available}"
    )]
    InsufficientSeeds {
        generation: u32,
        available: usize,
        required: usize,
    },
}

#[derive(Debug, Error)]
#[error("Unknown execution mode '{0}' (expected serial, threads or distributed)")]
pub struct ParseExecutionModeError(String);

/// How operator attempts are spread across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Serial,
    /// A local worker pool; `0` workers means one per available core.
    ThreadPool { workers: usize },
    /// Message-passing workers across machines. Recognized so configurations that ask
    /// for it fail clearly, but never built.
    Distributed,
}

impl FromStr for ExecutionMode {
    type Err = ParseExecutionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" | "none" => Ok(Self::Serial),
            "threads" | "thread_pool" | "threadpool" | "multithreading" => {
                Ok(Self::ThreadPool { workers: 0 })
            }
            "distributed" | "mpi" => Ok(Self::Distributed),
            _ => Err(ParseExecutionModeError(s.to_string())),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => f.write_str("serial"),
            Self::ThreadPool { workers: 0 } => f.write_str("threads (auto)"),
            Self::ThreadPool { workers } => write!(f, "threads ({workers})"),
            Self::Distributed => f.write_str("distributed"),
        }
    }
}

/// Whether parents keep their charged forms during crossover and mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtonationMode {
    #[default]
    Protonated,
    /// Parents are neutralized before every operator call.
    Deprotonated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathsConfig {
    pub root_output_folder: PathBuf,
    pub source_compound_file: PathBuf,
    pub reagents_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub num_generations: u32,
    pub number_of_crossovers: usize,
    pub number_of_mutants: usize,
    pub over_provision_factor: f64,
    pub max_rounds: usize,
    pub protonation: ProtonationMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossoverConfig {
    pub min_atom_match_mcs: usize,
    pub max_time_mcs_prescreen: Duration,
    pub max_time_mcs_thorough: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub filters: Vec<FilterKind>,
    /// Names of registered user filters.
    pub custom: Vec<String>,
    pub filter_source_compounds: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionConfig {
    pub program: String,
    pub timeout: Duration,
}

/// Immutable, validated configuration of a complete run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub paths: PathsConfig,
    pub generation: GenerationConfig,
    pub crossover: CrossoverConfig,
    pub reactions: ReactionLibrarySource,
    pub filters: FilterConfig,
    pub execution: ExecutionMode,
    pub conversion: Option<ConversionConfig>,
    pub debug_mode: bool,
    pub rng_seed: Option<u64>,
}

#[derive(Default)]
pub struct RunConfigBuilder {
    root_output_folder: Option<PathBuf>,
    source_compound_file: Option<PathBuf>,
    reagents_dir: Option<PathBuf>,
    num_generations: Option<u32>,
    number_of_crossovers: Option<usize>,
    number_of_mutants: Option<usize>,
    over_provision_factor: Option<f64>,
    max_rounds: Option<usize>,
    protonation: ProtonationMode,
    min_atom_match_mcs: Option<usize>,
    max_time_mcs_prescreen: Option<Duration>,
    max_time_mcs_thorough: Option<Duration>,
    reactions: Option<ReactionLibrarySource>,
    filters: Vec<FilterKind>,
    custom_filters: Vec<String>,
    filter_source_compounds: bool,
    execution: Option<ExecutionMode>,
    conversion: Option<ConversionConfig>,
    debug_mode: bool,
    rng_seed: Option<u64>,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_output_folder(mut self, path: PathBuf) -> Self {
        self.root_output_folder = Some(path);
        self
    }
    pub fn source_compound_file(mut self, path: PathBuf) -> Self {
        self.source_compound_file = Some(path);
        self
    }
    pub fn reagents_dir(mut self, path: PathBuf) -> Self {
        self.reagents_dir = Some(path);
        self
    }
    pub fn num_generations(mut self, n: u32) -> Self {
        self.num_generations = Some(n);
        self
    }
    pub fn number_of_crossovers(mut self, n: usize) -> Self {
        self.number_of_crossovers = Some(n);
        self
    }
    pub fn number_of_mutants(mut self, n: usize) -> Self {
        self.number_of_mutants = Some(n);
        self
    }
    pub fn over_provision_factor(mut self, factor: f64) -> Self {
        self.over_provision_factor = Some(factor);
        self
    }
    pub fn max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = Some(rounds);
        self
    }
    pub fn protonation(mut self, mode: ProtonationMode) -> Self {
        self.protonation = mode;
        self
    }
    pub fn min_atom_match_mcs(mut self, atoms: usize) -> Self {
        self.min_atom_match_mcs = Some(atoms);
        self
    }
    pub fn max_time_mcs_prescreen(mut self, budget: Duration) -> Self {
        self.max_time_mcs_prescreen = Some(budget);
        self
    }
    pub fn max_time_mcs_thorough(mut self, budget: Duration) -> Self {
        self.max_time_mcs_thorough = Some(budget);
        self
    }
    pub fn reactions(mut self, source: ReactionLibrarySource) -> Self {
        self.reactions = Some(source);
        self
    }
    pub fn filters(mut self, filters: Vec<FilterKind>) -> Self {
        self.filters = filters;
        self
    }
    pub fn custom_filters(mut self, names: Vec<String>) -> Self {
        self.custom_filters = names;
        self
    }
    pub fn filter_source_compounds(mut self, enabled: bool) -> Self {
        self.filter_source_compounds = enabled;
        self
    }
    pub fn execution(mut self, mode: ExecutionMode) -> Self {
        self.execution = Some(mode);
        self
    }
    pub fn conversion(mut self, conversion: Option<ConversionConfig>) -> Self {
        self.conversion = conversion;
        self
    }
    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }
    pub fn rng_seed(mut self, seed: Option<u64>) -> Self {
        self.rng_seed = seed;
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let paths = PathsConfig {
            root_output_folder: self
                .root_output_folder
                .ok_or(ConfigError::MissingParameter("root_output_folder"))?,
            source_compound_file: self
                .source_compound_file
                .ok_or(ConfigError::MissingParameter("source_compound_file"))?,
            reagents_dir: self.reagents_dir,
        };

        let generation = GenerationConfig {
            num_generations: self
                .num_generations
                .ok_or(ConfigError::MissingParameter("num_generations"))?,
            number_of_crossovers: self
                .number_of_crossovers
                .ok_or(ConfigError::MissingParameter("number_of_crossovers"))?,
            number_of_mutants: self
                .number_of_mutants
                .ok_or(ConfigError::MissingParameter("number_of_mutants"))?,
            over_provision_factor: self
                .over_provision_factor
                .unwrap_or(DEFAULT_OVER_PROVISION_FACTOR),
            max_rounds: self.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS),
            protonation: self.protonation,
        };
        if generation.num_generations == 0 {
            return Err(invalid("num_generations", "must be at least 1"));
        }
        if generation.number_of_crossovers == 0 && generation.number_of_mutants == 0 {
            return Err(invalid(
                "number_of_crossovers",
                "crossover and mutant quotas cannot both be zero",
            ));
        }
        if !generation.over_provision_factor.is_finite() || generation.over_provision_factor < 1.0
        {
            return Err(invalid("over_provision_factor", "must be a number >= 1.0"));
        }
        if generation.max_rounds == 0 {
            return Err(invalid("max_rounds", "must be at least 1"));
        }
        if generation.number_of_mutants > 0 && paths.reagents_dir.is_none() {
            return Err(ConfigError::MissingParameter("reagents_dir"));
        }

        let crossover = CrossoverConfig {
            min_atom_match_mcs: self
                .min_atom_match_mcs
                .unwrap_or(DEFAULT_MIN_ATOM_MATCH_MCS),
            max_time_mcs_prescreen: self
                .max_time_mcs_prescreen
                .unwrap_or(DEFAULT_MCS_PRESCREEN_TIME),
            max_time_mcs_thorough: self
                .max_time_mcs_thorough
                .unwrap_or(DEFAULT_MCS_THOROUGH_TIME),
        };
        if crossover.min_atom_match_mcs == 0 {
            return Err(invalid("min_atom_match_mcs", "must be at least 1"));
        }

        let filters = self.filters;
        if filters.contains(&FilterKind::NoFilters)
            && (filters.len() > 1 || !self.custom_filters.is_empty())
        {
            return Err(ConfigError::ConflictingFilters);
        }

        let execution = self.execution.unwrap_or(ExecutionMode::Serial);
        match execution {
            ExecutionMode::Distributed => {
                return Err(ConfigError::Unsupported("distributed execution"));
            }
            #[cfg(not(feature = "parallel"))]
            ExecutionMode::ThreadPool { .. } => {
                return Err(ConfigError::Unsupported("thread pool execution"));
            }
            _ => {}
        }

        if let Some(conversion) = &self.conversion {
            if conversion.program.trim().is_empty() {
                return Err(invalid("conversion.program", "must not be empty"));
            }
            if conversion.timeout.is_zero() {
                return Err(invalid("conversion.timeout", "must be positive"));
            }
        }

        Ok(RunConfig {
            paths,
            generation,
            crossover,
            reactions: self.reactions.unwrap_or_default(),
            filters: FilterConfig {
                filters,
                custom: self.custom_filters,
                filter_source_compounds: self.filter_source_compounds,
            },
            execution,
            conversion: self.conversion,
            debug_mode: self.debug_mode,
            rng_seed: self.rng_seed,
        })
    }
}

fn invalid(parameter: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.to_string(),
    }
}
