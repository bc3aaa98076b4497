use super::config::{ConfigError, GenerationConfig, ProtonationMode};
use super::crossover::{CrossoverParams, crossover};
use super::error::EngineError;
use super::executor::ParallelExecutor;
use super::filters::FilterChain;
use super::mutation::mutate;
use super::progress::{Progress, ProgressReporter};
use super::state::{
    Diagnosis, FailureTally, GenerationFailure, GenerationOutcome, GenerationState,
    GenerationStats, RejectionCause,
};
use crate::core::models::ligand::{LigandRecord, Origin};
use crate::core::models::molecule::Molecule;
use crate::core::models::population::Population;
use crate::core::reactions::library::ReactionLibrary;
use crate::core::reagents::ReagentIndex;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Read-only resources shared by every operator attempt of a run.
#[derive(Debug, Clone)]
pub struct OperatorResources {
    pub library: Arc<ReactionLibrary>,
    pub reagents: Arc<ReagentIndex>,
    pub filters: Arc<FilterChain>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Crossover,
    Mutation,
}

/// One unit of work sent to the executor.
#[derive(Debug, Clone, Copy)]
struct Attempt {
    operator: Operator,
    first: usize,
    second: usize,
    seed: u64,
}

#[derive(Debug)]
struct Offspring {
    molecule: Molecule,
    parents: Vec<String>,
    detail: String,
}

/// Accepted children of one operator within a generation.
#[derive(Debug, Default)]
struct Accepted {
    target: usize,
    records: Vec<LigandRecord>,
    failures: FailureTally,
}

impl Accepted {
    fn new(target: usize) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    fn missing(&self) -> usize {
        self.target.saturating_sub(self.records.len())
    }
}

/// Drives one generation from a seed population to an exact quota of new ligands.
///
/// Each round dispatches an over-provisioned batch of attempts for whatever is still
/// missing, collects the results in submission order, and stops once both quotas are
/// met or the round budget runs out.
pub struct PopulationGenerator<'a, E: ParallelExecutor> {
    executor: &'a E,
    resources: &'a OperatorResources,
    config: &'a GenerationConfig,
    crossover: CrossoverParams,
    reporter: &'a ProgressReporter<'a>,
}

impl<'a, E: ParallelExecutor> PopulationGenerator<'a, E> {
    pub fn new(
        executor: &'a E,
        resources: &'a OperatorResources,
        config: &'a GenerationConfig,
        crossover: CrossoverParams,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            executor,
            resources,
            config,
            crossover,
            reporter,
        }
    }

    #[instrument(skip_all, name = "generation", fields(generation = number))]
    pub fn run(
        &self,
        number: u32,
        seeds: &Population,
        rng: &mut StdRng,
    ) -> Result<GenerationOutcome, EngineError> {
        if seeds.is_empty() {
            return Err(ConfigError::EmptySeedPopulation { generation: number }.into());
        }
        if self.config.number_of_crossovers > 0 && seeds.len() < 2 {
            return Err(ConfigError::InsufficientSeeds {
                generation: number,
                available: seeds.len(),
                required: 2,
            }
            .into());
        }

        let mut state = GenerationState::SeedLoaded;
        trace_state(state);

        let parents: Vec<Molecule> = seeds
            .iter()
            .map(|record| match self.config.protonation {
                ProtonationMode::Protonated => record.molecule().clone(),
                ProtonationMode::Deprotonated => record.molecule().neutralized(),
            })
            .collect();
        let names: Vec<&str> = seeds.iter().map(LigandRecord::name).collect();

        let mut crossovers = Accepted::new(self.config.number_of_crossovers);
        let mut mutants = Accepted::new(self.config.number_of_mutants);
        let mut seen: HashSet<String> = seeds.iter().map(|r| r.smiles().to_string()).collect();
        let mut stats = GenerationStats::default();

        self.reporter.report(Progress::TaskStart {
            total_steps: (crossovers.target + mutants.target) as u64,
        });

        let mut round = 0;
        while !state.is_terminal() {
            round += 1;
            state = GenerationState::Dispatching { round };
            trace_state(state);
            let attempts = self.plan_round(&crossovers, &mutants, parents.len(), rng);
            let operators: Vec<Operator> = attempts.iter().map(|a| a.operator).collect();
            stats.attempts += attempts.len();

            state = GenerationState::Collecting { round };
            trace_state(state);
            let (params, resources) = (&self.crossover, self.resources);
            let results = self.executor.run(attempts, |attempt| {
                run_attempt(attempt, &parents, &names, params, resources)
            });

            for (operator, result) in operators.into_iter().zip(results) {
                let accepted = match operator {
                    Operator::Crossover => &mut crossovers,
                    Operator::Mutation => &mut mutants,
                };
                let offspring = match result {
                    Ok(Ok(offspring)) => offspring,
                    Ok(Err(cause)) => {
                        accepted.failures.record(cause);
                        continue;
                    }
                    Err(e) => {
                        debug!(error = %e, "Operator attempt panicked");
                        accepted.failures.record(RejectionCause::WorkerPanic);
                        continue;
                    }
                };
                if accepted.missing() == 0 {
                    stats.surplus += 1;
                    continue;
                }
                if !seen.insert(offspring.molecule.canonical_smiles().to_string()) {
                    accepted.failures.record(RejectionCause::Duplicate);
                    continue;
                }
                let (origin, label) = match operator {
                    Operator::Crossover => (Origin::Crossover, "Cross"),
                    Operator::Mutation => (Origin::Mutation, "Mutant"),
                };
                let name = format!("Gen_{number}_{label}_{}", accepted.records.len() + 1);
                accepted.records.push(LigandRecord::new(
                    name,
                    offspring.molecule,
                    origin,
                    offspring.parents,
                    Some(offspring.detail),
                ));
                self.reporter.report(Progress::TaskIncrement);
            }

            state = GenerationState::QuotaCheck { round };
            trace_state(state);
            info!(
                round,
                crossovers = crossovers.records.len(),
                target_crossovers = crossovers.target,
                mutants = mutants.records.len(),
                target_mutants = mutants.target,
                "Round complete"
            );
            state = if crossovers.missing() == 0 && mutants.missing() == 0 {
                GenerationState::Succeeded
            } else if round >= self.config.max_rounds {
                GenerationState::Exhausted
            } else {
                continue;
            };
            trace_state(state);
        }
        self.reporter.report(Progress::TaskFinish);

        if state == GenerationState::Exhausted {
            let diagnosis = Diagnosis::from_shortfall(
                crossovers.missing() > 0,
                &crossovers.failures,
                mutants.missing() > 0,
                &mutants.failures,
            );
            return Ok(GenerationOutcome::Exhausted(GenerationFailure {
                generation: number,
                rounds: round,
                accepted_crossovers: crossovers.records.len(),
                target_crossovers: crossovers.target,
                accepted_mutants: mutants.records.len(),
                target_mutants: mutants.target,
                crossover_failures: crossovers.failures,
                mutation_failures: mutants.failures,
                diagnosis,
            }));
        }

        stats.rounds = round;
        stats.crossover_failures = crossovers.failures;
        stats.mutation_failures = mutants.failures;

        let mut population = Population::new();
        for record in crossovers.records.into_iter().chain(mutants.records) {
            population.try_push(record);
        }
        Ok(GenerationOutcome::Succeeded { population, stats })
    }

    fn plan_round(
        &self,
        crossovers: &Accepted,
        mutants: &Accepted,
        seed_count: usize,
        rng: &mut StdRng,
    ) -> Vec<Attempt> {
        let factor = self.config.over_provision_factor;
        let batch = |missing: usize| (missing as f64 * factor).ceil() as usize;
        let crossover_count = batch(crossovers.missing());
        let mutation_count = batch(mutants.missing());

        let mut attempts = Vec::with_capacity(crossover_count + mutation_count);
        for _ in 0..crossover_count {
            let pair = index::sample(rng, seed_count, 2);
            attempts.push(Attempt {
                operator: Operator::Crossover,
                first: pair.index(0),
                second: pair.index(1),
                seed: rng.r#gen(),
            });
        }
        for _ in 0..mutation_count {
            let parent = rng.gen_range(0..seed_count);
            attempts.push(Attempt {
                operator: Operator::Mutation,
                first: parent,
                second: parent,
                seed: rng.r#gen(),
            });
        }
        attempts
    }
}

/// Runs one operator call and the filter chain; executed on a worker.
fn run_attempt(
    attempt: Attempt,
    parents: &[Molecule],
    names: &[&str],
    params: &CrossoverParams,
    resources: &OperatorResources,
) -> Result<Offspring, RejectionCause> {
    let mut rng = StdRng::seed_from_u64(attempt.seed);
    let offspring = match attempt.operator {
        Operator::Crossover => {
            let product = crossover(
                &parents[attempt.first],
                &parents[attempt.second],
                params,
                &mut rng,
            )?;
            Offspring {
                molecule: product.molecule,
                parents: vec![
                    names[attempt.first].to_string(),
                    names[attempt.second].to_string(),
                ],
                detail: format!("mcs_atoms={}", product.mcs_atoms),
            }
        }
        Operator::Mutation => {
            let product = mutate(
                &parents[attempt.first],
                &resources.library,
                &resources.reagents,
                &mut rng,
            )?;
            let mut lineage = vec![names[attempt.first].to_string()];
            lineage.extend(product.reagents);
            Offspring {
                molecule: product.molecule,
                parents: lineage,
                detail: product.reaction,
            }
        }
    };
    if !resources.filters.passes(&offspring.molecule) {
        return Err(RejectionCause::FilterRejected);
    }
    // Canonicalize on the worker so collection stays cheap.
    offspring.molecule.canonical_smiles();
    Ok(offspring)
}

fn trace_state(state: GenerationState) {
    debug!(%state, "Generation state transition");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reactions::library::{BuiltinLibrary, ReactionLibrary};
    use crate::core::reagents::Reagent;
    use crate::core::smiles::parse_smiles;
    use crate::engine::config::{DEFAULT_MCS_PRESCREEN_TIME, DEFAULT_MCS_THOROUGH_TIME};
    use crate::engine::executor::SerialExecutor;
    use crate::engine::state::{AttemptFailure, Diagnosis};

    fn seeds(smiles: &[&str]) -> Population {
        let mut population = Population::new();
        for (i, s) in smiles.iter().enumerate() {
            population.try_push(LigandRecord::seed(
                format!("seed_{i}"),
                parse_smiles(s).unwrap(),
            ));
        }
        population
    }

    fn benzoic_seeds() -> Population {
        let substituents = ["C", "CC", "CCC", "OC", "OCC", "Cl", "F", "N", "CO", "C#N"];
        let mut smiles = Vec::new();
        for sub in substituents {
            smiles.push(format!("OC(=O)c1ccc({sub})cc1"));
            smiles.push(format!("OC(=O)c1cccc({sub})c1"));
        }
        let refs: Vec<&str> = smiles.iter().map(String::as_str).collect();
        seeds(&refs)
    }

    fn resources() -> OperatorResources {
        let mut reagents = ReagentIndex::default();
        reagents.insert(
            "Amine",
            ["CN", "CCN", "CCCN", "CC(C)N", "NCc1ccccc1", "C1CCNCC1"]
                .iter()
                .enumerate()
                .map(|(i, s)| Reagent {
                    name: format!("amine_{i}"),
                    molecule: parse_smiles(s).unwrap(),
                })
                .collect(),
        );
        reagents.insert(
            "Alcohol",
            vec![Reagent {
                name: "ethanol".to_string(),
                molecule: parse_smiles("CCO").unwrap(),
            }],
        );
        OperatorResources {
            library: Arc::new(ReactionLibrary::builtin(BuiltinLibrary::ClickChem).unwrap()),
            reagents: Arc::new(reagents),
            filters: Arc::new(FilterChain::pass_all()),
        }
    }

    fn generation_config(crossovers: usize, mutants: usize, max_rounds: usize) -> GenerationConfig {
        GenerationConfig {
            num_generations: 1,
            number_of_crossovers: crossovers,
            number_of_mutants: mutants,
            over_provision_factor: 1.5,
            max_rounds,
            protonation: ProtonationMode::Protonated,
        }
    }

    fn params(min_atom_match: usize) -> CrossoverParams {
        CrossoverParams {
            min_atom_match,
            prescreen_budget: DEFAULT_MCS_PRESCREEN_TIME,
            thorough_budget: DEFAULT_MCS_THOROUGH_TIME,
        }
    }

    #[test]
    fn quotas_are_met_exactly_with_unique_named_children() {
        let resources = resources();
        let config = generation_config(5, 5, 20);
        let reporter = ProgressReporter::new();
        let generator =
            PopulationGenerator::new(&SerialExecutor, &resources, &config, params(4), &reporter);
        let seeds = benzoic_seeds();
        let mut rng = StdRng::seed_from_u64(42);

        let GenerationOutcome::Succeeded { population, stats } =
            generator.run(1, &seeds, &mut rng).unwrap()
        else {
            panic!("generation should succeed");
        };
        assert_eq!(population.len(), 10);
        let names: Vec<&str> = population.iter().map(LigandRecord::name).collect();
        assert_eq!(
            names,
            vec![
                "Gen_1_Cross_1",
                "Gen_1_Cross_2",
                "Gen_1_Cross_3",
                "Gen_1_Cross_4",
                "Gen_1_Cross_5",
                "Gen_1_Mutant_1",
                "Gen_1_Mutant_2",
                "Gen_1_Mutant_3",
                "Gen_1_Mutant_4",
                "Gen_1_Mutant_5",
            ]
        );
        for record in population.iter() {
            assert!(!seeds.contains_smiles(record.smiles()));
        }
        assert!(stats.rounds >= 1);
        assert!(stats.attempts >= 10);
    }

    #[test]
    fn same_seed_gives_the_same_generation() {
        let resources = resources();
        let config = generation_config(4, 4, 20);
        let reporter = ProgressReporter::new();
        let generator =
            PopulationGenerator::new(&SerialExecutor, &resources, &config, params(4), &reporter);
        let seeds = benzoic_seeds();

        let run = |seed| match generator
            .run(1, &seeds, &mut StdRng::seed_from_u64(seed))
            .unwrap()
        {
            GenerationOutcome::Succeeded { population, .. } => population
                .iter()
                .map(|r| r.smiles().to_string())
                .collect::<Vec<_>>(),
            GenerationOutcome::Exhausted(failure) => panic!("{failure}"),
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn dissimilar_seeds_exhaust_with_a_diversity_diagnosis() {
        let resources = resources();
        let config = generation_config(3, 0, 3);
        let reporter = ProgressReporter::new();
        let generator =
            PopulationGenerator::new(&SerialExecutor, &resources, &config, params(3), &reporter);
        let seeds = seeds(&["CCCCCCCC", "c1ccncc1"]);
        let mut rng = StdRng::seed_from_u64(1);

        let GenerationOutcome::Exhausted(failure) = generator.run(0, &seeds, &mut rng).unwrap()
        else {
            panic!("generation should be exhausted");
        };
        assert_eq!(failure.rounds, 3);
        assert_eq!(failure.accepted_crossovers, 0);
        assert_eq!(failure.diagnosis, Diagnosis::InsufficientSeedDiversity);
        assert!(failure.crossover_failures.count(AttemptFailure::NoCommonScaffold) > 0);
    }

    #[test]
    fn seeds_without_reactive_groups_are_diagnosed() {
        let resources = resources();
        let config = generation_config(0, 2, 2);
        let reporter = ProgressReporter::new();
        let generator =
            PopulationGenerator::new(&SerialExecutor, &resources, &config, params(4), &reporter);
        let seeds = seeds(&["CCCCCC"]);
        let mut rng = StdRng::seed_from_u64(1);

        let GenerationOutcome::Exhausted(failure) = generator.run(2, &seeds, &mut rng).unwrap()
        else {
            panic!("generation should be exhausted");
        };
        assert_eq!(failure.diagnosis, Diagnosis::SeedsLackReactiveGroups);
        assert_eq!(failure.generation, 2);
    }

    #[test]
    fn invalid_seed_populations_are_configuration_errors() {
        let resources = resources();
        let config = generation_config(2, 0, 2);
        let reporter = ProgressReporter::new();
        let generator =
            PopulationGenerator::new(&SerialExecutor, &resources, &config, params(4), &reporter);
        let mut rng = StdRng::seed_from_u64(1);

        let empty = generator.run(0, &Population::new(), &mut rng).unwrap_err();
        assert!(matches!(
            empty,
            EngineError::Configuration(ConfigError::EmptySeedPopulation { generation: 0 })
        ));
        let single = generator
            .run(0, &seeds(&["OC(=O)c1ccccc1"]), &mut rng)
            .unwrap_err();
        assert!(matches!(
            single,
            EngineError::Configuration(ConfigError::InsufficientSeeds { available: 1, .. })
        ));
    }

    #[test]
    fn rejected_children_never_enter_the_population() {
        use crate::engine::filters::{FilterKind, FilterRegistry};
        let mut resources = resources();
        // Every child of these seeds carries an aliphatic chain longer than seven carbons.
        resources.filters = Arc::new(
            FilterChain::build(&[FilterKind::Brenk], &[], &FilterRegistry::new()).unwrap(),
        );
        let config = generation_config(2, 0, 2);
        let reporter = ProgressReporter::new();
        let generator =
            PopulationGenerator::new(&SerialExecutor, &resources, &config, params(4), &reporter);
        let seeds = seeds(&[
            "OC(=O)c1ccc(CCCCCCCC)cc1",
            "OC(=O)c1cccc(CCCCCCCC)c1",
            "OC(=O)c1ccc(CCCCCCCCC)cc1Cl",
        ]);
        let mut rng = StdRng::seed_from_u64(5);

        let GenerationOutcome::Exhausted(failure) = generator.run(1, &seeds, &mut rng).unwrap()
        else {
            panic!("generation should be exhausted");
        };
        assert_eq!(failure.accepted_crossovers, 0);
        assert!(failure.crossover_failures.count(RejectionCause::FilterRejected) > 0);
        assert_eq!(failure.diagnosis, Diagnosis::QuotasTooHigh);
    }
}
