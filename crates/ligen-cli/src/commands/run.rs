use crate::cli::RunArgs;
use crate::config::build_config;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use ligen::engine::error::EngineError;
use ligen::engine::filters::FilterRegistry;
use ligen::engine::progress::ProgressReporter;
use ligen::workflows;
use ligen::workflows::evolve::RunSummary;
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(
    args: RunArgs,
    threads: Option<usize>,
    ui_sender: mpsc::Sender<UiEvent>,
) -> Result<RunSummary> {
    info!("Merging configuration from defaults, file and CLI arguments...");
    let app = build_config(&args, threads)?;

    let mut registry = FilterRegistry::new();
    for (name, path) in &app.rule_files {
        info!("Registering rule-file filter '{}' from {:?}", name, path);
        registry
            .register_rule_file(name, path)
            .map_err(EngineError::from)?;
    }

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting ligand evolution in {}",
        app.run.paths.root_output_folder.display()
    );
    info!("Invoking the core evolution workflow...");

    let summary = tokio::task::block_in_place(|| {
        workflows::evolve::run(&app.run, &registry, &reporter)
    })?;

    print_summary(&summary, app.run.generation.num_generations);
    Ok(summary)
}

fn print_summary(summary: &RunSummary, total: u32) {
    if summary.generations.is_empty() {
        println!("All {} generation(s) were already complete; nothing to do.", total);
    } else if summary.start_generation > 0 {
        println!("Resumed at generation {}.", summary.start_generation);
    }
    for generation in &summary.generations {
        println!(
            "  Generation {}: {} crossovers + {} mutants in {} round(s), {} attempts",
            generation.generation,
            generation.crossovers,
            generation.mutants,
            generation.rounds,
            generation.attempts
        );
        if let Some(conversion) = generation.conversion {
            println!(
                "    3-D conversion: {} converted, {} failed",
                conversion.converted, conversion.failed
            );
        }
    }
    if let Some(path) = &summary.final_ranked_file {
        println!("✓ Final ranked population written to: {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_inputs(dir: &Path) {
        let mut seeds = String::new();
        for (i, sub) in ["C", "CC", "Cl", "F", "OC", "CO"].iter().enumerate() {
            seeds.push_str(&format!("OC(=O)c1ccc({sub})cc1\tpara_{i}\n"));
            seeds.push_str(&format!("OC(=O)c1cccc({sub})c1\tmeta_{i}\n"));
        }
        fs::write(dir.join("seeds.smi"), seeds).unwrap();
        fs::write(
            dir.join("reactions.toml"),
            r#"
[[reaction]]
name = "Amide_Coupling"
smirks = "[C:1](=[O:2])[OH].[NX3;H2,H1;!a:3]-[#6:4]>>[C:1](=[O:2])[N:3]-[#6:4]"
groups = ["Carboxylic_Acid", "Amine"]
"#,
        )
        .unwrap();
        fs::write(
            dir.join("groups.toml"),
            "Carboxylic_Acid = \"[CX3](=O)[OX2H1]\"\nAmine = \"[NX3;H2,H1;!a][CX4,c]\"\n",
        )
        .unwrap();
        fs::create_dir(dir.join("reagents")).unwrap();
        fs::write(
            dir.join("reagents/Amine.smi"),
            "CN\tmethylamine\nCCN\tethylamine\nCCCN\tpropylamine\nC1CCNCC1\tpiperidine\n",
        )
        .unwrap();
        fs::write(dir.join("reagents/Carboxylic_Acid.smi"), "CC(=O)O\tacetic_acid\n").unwrap();
        fs::write(
            dir.join("run.toml"),
            format!(
                r#"
rng-seed = 3

[paths]
root-output-folder = "{root}"
source-compound-file = "{seeds}"
reagents-dir = "{reagents}"

[generation]
num-generations = 1
number-of-crossovers = 3
number-of-mutants = 3

[reactions]
library = "custom"
custom-reactions = "{reactions}"
custom-groups = "{groups}"

[filters]
kinds = ["no_filters"]
"#,
                root = dir.join("out").display(),
                seeds = dir.join("seeds.smi").display(),
                reagents = dir.join("reagents").display(),
                reactions = dir.join("reactions.toml").display(),
                groups = dir.join("groups.toml").display(),
            ),
        )
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_command_evolves_and_resumes() {
        let dir = tempdir().unwrap();
        write_inputs(dir.path());
        let args = || RunArgs {
            config: Some(dir.path().join("run.toml")),
            ..Default::default()
        };
        let (sender, _receiver) = mpsc::channel(4096);

        let summary = run(args(), None, sender.clone()).await.unwrap();
        assert_eq!(summary.generations.len(), 1);
        let ranked = summary.final_ranked_file.clone().unwrap();
        assert!(ranked.starts_with(dir.path().join("out")));

        let resumed = run(args(), None, sender).await.unwrap();
        assert!(resumed.generations.is_empty());
        assert_eq!(resumed.final_ranked_file, Some(ranked));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn broken_rule_file_fails_before_the_run() {
        let dir = tempdir().unwrap();
        write_inputs(dir.path());
        fs::write(dir.path().join("rules.toml"), "alerts = { bad = \"[[\" }\n").unwrap();
        let args = RunArgs {
            config: Some(dir.path().join("run.toml")),
            filters: vec!["lipinski_strict".to_string()],
            custom_filters: vec![format!("bad={}", dir.path().join("rules.toml").display())],
            ..Default::default()
        };
        let (sender, _receiver) = mpsc::channel(16);

        let err = run(args, None, sender).await.unwrap_err();
        assert!(matches!(err, CliError::Core(ref e) if e.is_configuration()));
        assert!(!dir.path().join("out").exists());
    }
}
