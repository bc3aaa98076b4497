use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "LIGEN Developers",
    version,
    about = "LIGEN CLI - Evolve drug-like ligands generation by generation through MCS crossover and click-chemistry mutation.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Run operator attempts on a local pool with this many worker threads.
    /// Use 0 for one worker per logical core.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run (or resume) an evolutionary ligand search.
    Run(RunArgs),
    /// Report which generations of an output folder are complete.
    Status(StatusArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Path to the run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Paths ---
    /// Tab-delimited `.smi` file with the generation-0 seed compounds.
    #[arg(short = 's', long, value_name = "PATH")]
    pub source_compound_file: Option<PathBuf>,

    /// Folder that receives one `generation_N` directory per generation.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub root_output_folder: Option<PathBuf>,

    /// Folder holding one `<group>.smi` reagent file per functional group.
    #[arg(short = 'r', long, value_name = "PATH")]
    pub reagents_dir: Option<PathBuf>,

    // --- Generation Overrides ---
    /// Number of generations to produce.
    #[arg(short = 'g', long, value_name = "INT")]
    pub num_generations: Option<u32>,

    /// Crossover children required per generation.
    #[arg(long, value_name = "INT")]
    pub number_of_crossovers: Option<usize>,

    /// Mutants required per generation.
    #[arg(long, value_name = "INT")]
    pub number_of_mutants: Option<usize>,

    /// Seed for the random number generator; runs with the same seed are reproducible.
    #[arg(long, value_name = "INT")]
    pub rng_seed: Option<u64>,

    // --- Chemistry Overrides ---
    /// Reaction library: click_chem_rxns, robust_rxns, all_rxns or custom.
    #[arg(short = 'l', long, value_name = "NAME")]
    pub reaction_library: Option<String>,

    /// Drug-likeness filter to apply. Can be used multiple times; replaces the file's list.
    #[arg(short = 'f', long = "filter", value_name = "NAME")]
    pub filters: Vec<String>,

    /// Register a rule-file filter and apply it. Can be used multiple times.
    #[arg(long = "custom-filter", value_name = "NAME=PATH")]
    pub custom_filters: Vec<String>,

    // --- Lifecycle Overrides ---
    /// Convert every accepted ligand to 3-D structures after each generation.
    #[arg(long)]
    pub convert_to_3d: bool,

    /// Keep transient per-generation files instead of deleting them.
    #[arg(long)]
    pub debug: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S generation.max-rounds=30
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output folder of a previous or ongoing run.
    #[arg(required = true, value_name = "PATH")]
    pub root_output_folder: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_arguments_are_parsed() {
        let cli = Cli::try_parse_from([
            "ligen",
            "-vv",
            "run",
            "-c",
            "run.toml",
            "-g",
            "3",
            "--filter",
            "lipinski_strict",
            "--filter",
            "brenk",
            "--custom-filter",
            "mine=rules.toml",
            "-S",
            "generation.max-rounds=30",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected the run subcommand");
        };
        assert_eq!(args.config, Some(PathBuf::from("run.toml")));
        assert_eq!(args.num_generations, Some(3));
        assert_eq!(args.filters, vec!["lipinski_strict", "brenk"]);
        assert_eq!(args.custom_filters, vec!["mine=rules.toml"]);
        assert_eq!(args.set_values, vec!["generation.max-rounds=30"]);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["ligen", "-q", "-v", "status", "out"]).is_err());
    }
}
