use thiserror::Error;

use super::config::ConfigError;
use super::filters::FilterError;
use super::state::GenerationFailure;
use crate::core::io::smi::SmiError;
use crate::core::reactions::library::LibraryLoadError;
use crate::core::reagents::ReagentLoadError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Failed to load reaction library: {0}")]
    ReactionLibrary(#[from] LibraryLoadError),

    #[error("Failed to load reagents: {0}")]
    Reagents(#[from] ReagentLoadError),

    #[error("Filter setup failed: {0}")]
    Filters(#[from] FilterError),

    #[error("Failed to read seed file {path}: {source}")]
    SeedFile { path: String, source: SmiError },

    #[error("Failed to start executor: {0}")]
    Executor(String),

    #[error("{0}")]
    GenerationExhausted(#[from] Box<GenerationFailure>),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True for errors raised before any generation could run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::ReactionLibrary(_)
                | Self::Reagents(_)
                | Self::Filters(_)
                | Self::Executor(_)
        )
    }
}

impl From<GenerationFailure> for EngineError {
    fn from(failure: GenerationFailure) -> Self {
        Self::GenerationExhausted(Box::new(failure))
    }
}
