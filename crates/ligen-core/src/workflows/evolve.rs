use crate::core::reactions::library::ReactionLibrary;
use crate::core::reagents::ReagentIndex;
use crate::engine::config::{DEFAULT_CONVERSION_TIMEOUT, RunConfig};
use crate::engine::conversion::{
    CommandConverter, ConversionSummary, StructureConverter, convert_population,
};
use crate::engine::crossover::CrossoverParams;
use crate::engine::error::EngineError;
use crate::engine::executor::{Executor, ParallelExecutor};
use crate::engine::filters::{FilterChain, FilterRegistry};
use crate::engine::generation::{OperatorResources, PopulationGenerator};
use crate::engine::lifecycle::{
    cleanup_transient, generation_dir, next_generation_to_run, ranked_file_path,
    read_ranked_population, read_source_population, write_ranked_artifact,
};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::GenerationOutcome;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Golden-ratio increment used to derive independent per-generation seeds.
const GENERATION_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSummary {
    pub generation: u32,
    pub crossovers: usize,
    pub mutants: usize,
    pub rounds: usize,
    pub attempts: usize,
    pub ranked_file: PathBuf,
    pub conversion: Option<ConversionSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// First generation this invocation had to run (later ones on resume).
    pub start_generation: u32,
    pub generations: Vec<GenerationSummary>,
    /// Ranked artifact of the last configured generation, if it exists.
    pub final_ranked_file: Option<PathBuf>,
}

/// Runs (or resumes) a complete multi-generation search.
///
/// 3-D conversion runs after each generation when the configuration enables it.
#[instrument(skip_all, name = "evolve_workflow")]
pub fn run(
    config: &RunConfig,
    registry: &FilterRegistry,
    reporter: &ProgressReporter,
) -> Result<RunSummary, EngineError> {
    let converter = config.conversion.as_ref().map(CommandConverter::from_config);
    run_with_converter(
        config,
        registry,
        converter.as_ref().map(|c| c as &dyn StructureConverter),
        reporter,
    )
}

/// Like [`run`], with an explicit structure converter (or none).
#[instrument(skip_all, name = "evolve_workflow")]
pub fn run_with_converter(
    config: &RunConfig,
    registry: &FilterRegistry,
    converter: Option<&dyn StructureConverter>,
    reporter: &ProgressReporter,
) -> Result<RunSummary, EngineError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let root = &config.paths.root_output_folder;
    let executor = Executor::from_mode(config.execution)?;
    let filters =
        FilterChain::build(&config.filters.filters, &config.filters.custom, registry)?;
    let library = ReactionLibrary::load(&config.reactions)?;
    let reagents = match &config.paths.reagents_dir {
        Some(dir) => ReagentIndex::load(dir, &library)?,
        None => ReagentIndex::default(),
    };
    info!(
        executor = executor.name(),
        workers = executor.workers(),
        filters = ?filters.names(),
        reactions = library.templates().len(),
        reagent_groups = reagents.group_count(),
        reagents = reagents.total_reagents(),
        "Run resources ready"
    );
    std::fs::create_dir_all(root).map_err(|source| EngineError::Io {
        path: root.to_string_lossy().to_string(),
        source,
    })?;
    let resources = OperatorResources {
        library: Arc::new(library),
        reagents: Arc::new(reagents),
        filters: Arc::new(filters),
    };
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Resume detection ===
    let total = config.generation.num_generations;
    let start = next_generation_to_run(root);
    let mut summary = RunSummary {
        start_generation: start,
        generations: Vec::new(),
        final_ranked_file: None,
    };
    if start >= total {
        info!(total, "All configured generations are already complete");
    } else if start > 0 {
        info!(start, total, "Resuming run");
    }

    // === Phase 2: Generations ===
    let generator = PopulationGenerator::new(
        &executor,
        &resources,
        &config.generation,
        CrossoverParams::from(&config.crossover),
        reporter,
    );
    for generation in start..total {
        reporter.report(Progress::GenerationStart { generation, total });
        let seeds = if generation == 0 {
            let prefilter = (config.filters.filter_source_compounds
                && !resources.filters.is_pass_all())
            .then_some(resources.filters.as_ref());
            read_source_population(&config.paths.source_compound_file, prefilter)?
        } else {
            read_ranked_population(&ranked_file_path(root, generation - 1))?
        };
        info!(generation, seeds = seeds.len(), "Starting generation");

        let gen_dir = generation_dir(root, generation);
        std::fs::create_dir_all(&gen_dir).map_err(|source| EngineError::Io {
            path: gen_dir.to_string_lossy().to_string(),
            source,
        })?;

        let mut rng = generation_rng(config.rng_seed, generation);
        let (population, stats) = match generator.run(generation, &seeds, &mut rng)? {
            GenerationOutcome::Succeeded { population, stats } => (population, stats),
            GenerationOutcome::Exhausted(failure) => {
                error!(
                    generation,
                    crossover_failures = %failure.crossover_failures,
                    mutation_failures = %failure.mutation_failures,
                    "{failure}"
                );
                return Err(failure.into());
            }
        };
        let ranked_file = write_ranked_artifact(root, generation, &population)?;

        let conversion = converter.map(|converter| {
            let timeout = config
                .conversion
                .as_ref()
                .map_or(DEFAULT_CONVERSION_TIMEOUT, |c| c.timeout);
            convert_population(&executor, converter, &population, &gen_dir, timeout, reporter)
        });
        if conversion.is_some_and(|c| c.failed > 0) {
            warn!(generation, "Some ligands could not be converted to 3-D");
        }
        cleanup_transient(&gen_dir, generation, config.debug_mode);

        info!(
            generation,
            accepted = population.len(),
            rounds = stats.rounds,
            attempts = stats.attempts,
            surplus = stats.surplus,
            "Generation complete"
        );
        reporter.report(Progress::GenerationFinish {
            generation,
            accepted: population.len(),
        });
        summary.generations.push(GenerationSummary {
            generation,
            crossovers: config.generation.number_of_crossovers,
            mutants: config.generation.number_of_mutants,
            rounds: stats.rounds,
            attempts: stats.attempts,
            ranked_file,
            conversion,
        });
    }

    let last = ranked_file_path(root, total - 1);
    summary.final_ranked_file = last.is_file().then_some(last);
    Ok(summary)
}

/// Per-generation RNG: derived from the run seed when one is configured, so a resumed
/// run draws the same numbers as an uninterrupted one.
fn generation_rng(seed: Option<u64>, generation: u32) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(
            seed.wrapping_add(u64::from(generation).wrapping_mul(GENERATION_SEED_STRIDE)),
        ),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn generation_rngs_are_reproducible_and_distinct() {
        let mut a = generation_rng(Some(11), 3);
        let mut b = generation_rng(Some(11), 3);
        let mut c = generation_rng(Some(11), 4);
        let (x, y, z): (u64, u64, u64) = (a.r#gen(), b.r#gen(), c.r#gen());
        assert_eq!(x, y);
        assert_ne!(x, z);
    }
}
