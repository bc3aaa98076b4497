use super::defaults::DefaultsConfig;
use super::file::{
    FileConfig, FileConversionConfig, FileCustomFilter, FileExecutionConfig, FileProtonation,
    FileReactionsConfig,
};
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use ligen::core::reactions::library::{BuiltinLibrary, ReactionLibrarySource};
use ligen::engine::config::{self as core_config, ExecutionMode, ProtonationMode};
use ligen::engine::filters::FilterKind;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Merges defaults, the config file, `--set` overrides and command-line flags, in
/// increasing order of precedence, into a validated run configuration.
pub fn build_config(args: &RunArgs, threads: Option<usize>) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let paths_file = file_config.paths.take().unwrap_or_default();
    let source_compound_file = args
        .source_compound_file
        .clone()
        .or(paths_file.source_compound_file)
        .ok_or_else(|| {
            CliError::Config(
                "a source compound file is required (--source-compound-file or paths.source-compound-file)"
                    .to_string(),
            )
        })?;
    let root_output_folder = args
        .root_output_folder
        .clone()
        .or(paths_file.root_output_folder)
        .unwrap_or_else(|| PathBuf::from(&defaults.root_output_folder));
    let reagents_dir = args.reagents_dir.clone().or(paths_file.reagents_dir);

    let gen_file = file_config.generation.take().unwrap_or_default();
    let num_generations = args
        .num_generations
        .or(gen_file.num_generations)
        .unwrap_or(defaults.num_generations);
    let number_of_crossovers = args
        .number_of_crossovers
        .or(gen_file.number_of_crossovers)
        .unwrap_or(defaults.number_of_crossovers);
    let number_of_mutants = args
        .number_of_mutants
        .or(gen_file.number_of_mutants)
        .unwrap_or(defaults.number_of_mutants);

    let mut builder = core_config::RunConfigBuilder::new()
        .root_output_folder(root_output_folder)
        .source_compound_file(source_compound_file)
        .num_generations(num_generations)
        .number_of_crossovers(number_of_crossovers)
        .number_of_mutants(number_of_mutants);
    if let Some(dir) = reagents_dir {
        builder = builder.reagents_dir(dir);
    }
    if let Some(factor) = gen_file.over_provision_factor {
        builder = builder.over_provision_factor(factor);
    }
    if let Some(rounds) = gen_file.max_rounds {
        builder = builder.max_rounds(rounds);
    }
    if let Some(FileProtonation::Deprotonated) = gen_file.protonation {
        builder = builder.protonation(ProtonationMode::Deprotonated);
    }

    let crossover_file = file_config.crossover.take().unwrap_or_default();
    if let Some(atoms) = crossover_file.min_atom_match_mcs {
        builder = builder.min_atom_match_mcs(atoms);
    }
    if let Some(secs) = crossover_file.max_time_mcs_prescreen {
        builder = builder.max_time_mcs_prescreen(seconds("crossover.max-time-mcs-prescreen", secs)?);
    }
    if let Some(secs) = crossover_file.max_time_mcs_thorough {
        builder = builder.max_time_mcs_thorough(seconds("crossover.max-time-mcs-thorough", secs)?);
    }

    let reactions = resolve_reactions(
        args.reaction_library.as_deref(),
        file_config.reactions.take().unwrap_or_default(),
        &defaults,
    )?;

    let filters_file = file_config.filters.take().unwrap_or_default();
    let filters = if !args.filters.is_empty() {
        parse_filter_kinds(&args.filters)?
    } else if let Some(kinds) = &filters_file.kinds {
        parse_filter_kinds(kinds)?
    } else {
        defaults.filters.clone()
    };
    let mut rule_files: Vec<(String, PathBuf)> = filters_file
        .custom
        .into_iter()
        .map(|FileCustomFilter { name, path }| (name, path))
        .collect();
    for spec in &args.custom_filters {
        rule_files.push(parse_custom_filter(spec)?);
    }
    let custom_names = rule_files.iter().map(|(name, _)| name.clone()).collect();

    let execution = resolve_execution(threads, file_config.execution.take().unwrap_or_default())?;
    let conversion = resolve_conversion(
        args.convert_to_3d,
        file_config.conversion.take().unwrap_or_default(),
        &defaults,
    )?;

    let run = builder
        .reactions(reactions)
        .filters(filters)
        .custom_filters(custom_names)
        .filter_source_compounds(filters_file.filter_source_compounds.unwrap_or(false))
        .execution(execution)
        .conversion(conversion)
        .debug_mode(args.debug || file_config.debug_mode.unwrap_or(false))
        .rng_seed(args.rng_seed.or(file_config.rng_seed))
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig { run, rule_files })
}

fn resolve_reactions(
    cli_library: Option<&str>,
    file_val: FileReactionsConfig,
    defaults: &DefaultsConfig,
) -> Result<ReactionLibrarySource> {
    let name = cli_library
        .or(file_val.library.as_deref())
        .unwrap_or(defaults.reaction_library.as_str());
    if name.trim().eq_ignore_ascii_case("custom") {
        let reactions_path = file_val.custom_reactions.ok_or_else(|| {
            CliError::Config("a custom reaction library requires `reactions.custom-reactions`".to_string())
        })?;
        let groups_path = file_val.custom_groups.ok_or_else(|| {
            CliError::Config("a custom reaction library requires `reactions.custom-groups`".to_string())
        })?;
        return Ok(ReactionLibrarySource::Custom {
            reactions_path,
            groups_path,
        });
    }
    let kind = BuiltinLibrary::from_str(name).map_err(|e| CliError::Argument(e.to_string()))?;
    Ok(ReactionLibrarySource::Builtin(kind))
}

fn parse_filter_kinds(names: &[String]) -> Result<Vec<FilterKind>> {
    names
        .iter()
        .map(|name| FilterKind::from_str(name).map_err(|e| CliError::Argument(e.to_string())))
        .collect()
}

fn parse_custom_filter(spec: &str) -> Result<(String, PathBuf)> {
    match spec.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(CliError::Argument(format!(
            "Invalid --custom-filter '{}'. Expected NAME=PATH.",
            spec
        ))),
    }
}

fn resolve_execution(threads: Option<usize>, file_val: FileExecutionConfig) -> Result<ExecutionMode> {
    if let Some(workers) = threads {
        return Ok(ExecutionMode::ThreadPool { workers });
    }
    let mode = match file_val.mode.as_deref() {
        Some(mode) => ExecutionMode::from_str(mode).map_err(|e| CliError::Config(e.to_string()))?,
        None => ExecutionMode::Serial,
    };
    Ok(match (mode, file_val.workers) {
        (ExecutionMode::ThreadPool { .. }, Some(workers)) => ExecutionMode::ThreadPool { workers },
        (mode, _) => mode,
    })
}

fn resolve_conversion(
    cli_enabled: bool,
    file_val: FileConversionConfig,
    defaults: &DefaultsConfig,
) -> Result<Option<core_config::ConversionConfig>> {
    if !(cli_enabled || file_val.convert_to_3d.unwrap_or(false)) {
        return Ok(None);
    }
    let timeout = seconds(
        "conversion.timeout-secs",
        file_val
            .timeout_secs
            .unwrap_or(defaults.conversion_timeout_secs),
    )?;
    Ok(Some(core_config::ConversionConfig {
        program: file_val
            .program
            .unwrap_or_else(|| defaults.conversion_program.clone()),
        timeout,
    }))
}

fn seconds(key: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| CliError::Config(format!("Invalid duration for {}: {}", key, secs)))
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| CliError::Config(format!("Invalid value for {}: {} ({})", key, value, e)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();

        match key {
            "paths.root-output-folder" => {
                config.paths.get_or_insert_with(Default::default).root_output_folder =
                    Some(PathBuf::from(value_str));
            }
            "paths.source-compound-file" => {
                config.paths.get_or_insert_with(Default::default).source_compound_file =
                    Some(PathBuf::from(value_str));
            }
            "paths.reagents-dir" => {
                config.paths.get_or_insert_with(Default::default).reagents_dir =
                    Some(PathBuf::from(value_str));
            }
            "generation.num-generations" => {
                config.generation.get_or_insert_with(Default::default).num_generations =
                    Some(parse_value(key, value_str)?);
            }
            "generation.number-of-crossovers" => {
                config
                    .generation
                    .get_or_insert_with(Default::default)
                    .number_of_crossovers = Some(parse_value(key, value_str)?);
            }
            "generation.number-of-mutants" => {
                config.generation.get_or_insert_with(Default::default).number_of_mutants =
                    Some(parse_value(key, value_str)?);
            }
            "generation.over-provision-factor" => {
                config
                    .generation
                    .get_or_insert_with(Default::default)
                    .over_provision_factor = Some(parse_value(key, value_str)?);
            }
            "generation.max-rounds" => {
                config.generation.get_or_insert_with(Default::default).max_rounds =
                    Some(parse_value(key, value_str)?);
            }
            "generation.protonation" => {
                let mode = match value_str.trim().to_ascii_lowercase().as_str() {
                    "protonated" => FileProtonation::Protonated,
                    "deprotonated" => FileProtonation::Deprotonated,
                    _ => {
                        return Err(CliError::Config(format!(
                            "Invalid value for {}: {} (expected protonated or deprotonated)",
                            key, value_str
                        )));
                    }
                };
                config.generation.get_or_insert_with(Default::default).protonation = Some(mode);
            }
            "crossover.min-atom-match-mcs" => {
                config
                    .crossover
                    .get_or_insert_with(Default::default)
                    .min_atom_match_mcs = Some(parse_value(key, value_str)?);
            }
            "crossover.max-time-mcs-prescreen" => {
                config
                    .crossover
                    .get_or_insert_with(Default::default)
                    .max_time_mcs_prescreen = Some(parse_value(key, value_str)?);
            }
            "crossover.max-time-mcs-thorough" => {
                config
                    .crossover
                    .get_or_insert_with(Default::default)
                    .max_time_mcs_thorough = Some(parse_value(key, value_str)?);
            }
            "reactions.library" => {
                config.reactions.get_or_insert_with(Default::default).library =
                    Some(value_str.trim().to_string());
            }
            "filters.filter-source-compounds" => {
                config
                    .filters
                    .get_or_insert_with(Default::default)
                    .filter_source_compounds = Some(parse_value(key, value_str)?);
            }
            "execution.mode" => {
                config.execution.get_or_insert_with(Default::default).mode =
                    Some(value_str.trim().to_string());
            }
            "execution.workers" => {
                config.execution.get_or_insert_with(Default::default).workers =
                    Some(parse_value(key, value_str)?);
            }
            "conversion.convert-to-3d" => {
                config.conversion.get_or_insert_with(Default::default).convert_to_3d =
                    Some(parse_value(key, value_str)?);
            }
            "conversion.program" => {
                config.conversion.get_or_insert_with(Default::default).program =
                    Some(value_str.trim().to_string());
            }
            "conversion.timeout-secs" => {
                config.conversion.get_or_insert_with(Default::default).timeout_secs =
                    Some(parse_value(key, value_str)?);
            }
            "debug-mode" => config.debug_mode = Some(parse_value(key, value_str)?),
            "rng-seed" => config.rng_seed = Some(parse_value(key, value_str)?),
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
