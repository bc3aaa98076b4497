use crate::cli::StatusArgs;
use crate::error::{CliError, Result};
use ligen::engine::lifecycle::{
    determine_if_gen_completed, find_last_generation, generation_dir, next_generation_to_run,
    ranked_file_path, read_ranked_population,
};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationStatus {
    pub generation: u32,
    /// Ligands in the ranked artifact; `None` while the generation is incomplete.
    pub ligands: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatus {
    pub generations: Vec<GenerationStatus>,
    pub next_generation: u32,
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let status = collect_status(&args.root_output_folder)?;
    println!("Output folder: {}", args.root_output_folder.display());
    if status.generations.is_empty() {
        println!("  No generations have been started.");
    }
    for generation in &status.generations {
        match generation.ligands {
            Some(count) => println!(
                "  ✓ generation_{}: {} ligands",
                generation.generation, count
            ),
            None => println!("  … generation_{}: incomplete", generation.generation),
        }
    }
    println!("Next generation to run: {}", status.next_generation);
    Ok(())
}

pub fn collect_status(root: &Path) -> Result<RunStatus> {
    if !root.is_dir() {
        return Err(CliError::Argument(format!(
            "Output folder does not exist: {}",
            root.display()
        )));
    }
    let mut generations = Vec::new();
    if let Some(last) = find_last_generation(root) {
        for generation in 0..=last {
            let ligands = if determine_if_gen_completed(&generation_dir(root, generation), generation) {
                Some(read_ranked_population(&ranked_file_path(root, generation))?.len())
            } else {
                None
            };
            generations.push(GenerationStatus {
                generation,
                ligands,
            });
        }
    }
    let next_generation = next_generation_to_run(root);
    info!(generations = generations.len(), next_generation, "Collected run status");
    Ok(RunStatus {
        generations,
        next_generation,
    })
}
