//! On-disk bookkeeping for generations: directory layout, resume detection, the atomic
//! ranked artifact, and cleanup of transient conversion output.
//!
//! A generation is complete exactly when its ranked artifact exists:
//!
//! ```text
//! <root>/generation_<N>/generation_<N>_ranked.smi
//! ```

use super::error::EngineError;
use super::filters::FilterChain;
use crate::core::io::smi::{RankedFile, RankedRow, SmiFile};
use crate::core::io::traits::RecordFile;
use crate::core::models::ligand::LigandRecord;
use crate::core::models::population::Population;
use crate::core::smiles::parse_smiles;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directories created by structure conversion that are deleted once a generation is done.
pub const TRANSIENT_DIRS: [&str; 3] = ["3D_SDFs/log", "3D_SDFs", "conversion_submission_files"];

pub fn generation_dir(root: &Path, generation: u32) -> PathBuf {
    root.join(format!("generation_{generation}"))
}

pub fn ranked_file_path(root: &Path, generation: u32) -> PathBuf {
    ranked_file_in(&generation_dir(root, generation), generation)
}

fn ranked_file_in(gen_dir: &Path, generation: u32) -> PathBuf {
    gen_dir.join(format!("generation_{generation}_ranked.smi"))
}

/// Highest generation directory present under `root`.
///
/// Directories are probed from `generation_1` upwards until one is missing. When
/// `generation_1` does not exist the answer is `Some(0)` if `generation_0` does, and
/// `None` otherwise.
pub fn find_last_generation(root: &Path) -> Option<u32> {
    if !generation_dir(root, 1).is_dir() {
        return generation_dir(root, 0).is_dir().then_some(0);
    }
    let mut last = 1;
    while generation_dir(root, last + 1).is_dir() {
        last += 1;
    }
    Some(last)
}

pub fn determine_if_gen_completed(gen_dir: &Path, generation: u32) -> bool {
    ranked_file_in(gen_dir, generation).is_file()
}

/// The first generation without a ranked artifact, or the one after the last.
pub fn next_generation_to_run(root: &Path) -> u32 {
    match find_last_generation(root) {
        None => 0,
        Some(last) => (0..=last)
            .find(|&n| !determine_if_gen_completed(&generation_dir(root, n), n))
            .unwrap_or(last + 1),
    }
}

/// Writes the ranked artifact of `generation` so that it is never observed half
/// written: rows go to a `.tmp` sibling that is synced and then renamed into place.
pub fn write_ranked_artifact(
    root: &Path,
    generation: u32,
    population: &Population,
) -> Result<PathBuf, EngineError> {
    let gen_dir = generation_dir(root, generation);
    fs::create_dir_all(&gen_dir).map_err(|e| io_error(&gen_dir, e))?;
    let path = ranked_file_in(&gen_dir, generation);
    let tmp_path = path.with_extension("smi.tmp");

    let rows: Vec<RankedRow> = population
        .iter()
        .enumerate()
        .map(|(index, record)| RankedRow::from_record(record, index + 1))
        .collect();
    let mut buffer = Vec::new();
    RankedFile::write_to(&rows, &mut buffer)
        .map_err(|e| EngineError::Internal(format!("failed to serialize ranked rows: {e}")))?;

    let mut file = File::create(&tmp_path).map_err(|e| io_error(&tmp_path, e))?;
    file.write_all(&buffer)
        .and_then(|()| file.flush())
        .and_then(|()| file.sync_all())
        .map_err(|e| io_error(&tmp_path, e))?;
    drop(file);
    fs::rename(&tmp_path, &path).map_err(|e| io_error(&path, e))?;

    info!(generation, ligands = rows.len(), path = %path.display(), "Ranked artifact written");
    Ok(path)
}

/// Reads a ranked artifact back into a population, skipping rows whose SMILES no
/// longer parses.
pub fn read_ranked_population(path: &Path) -> Result<Population, EngineError> {
    let rows = RankedFile::read_from_path(path).map_err(|source| EngineError::SeedFile {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    let mut population = Population::new();
    for row in rows {
        match parse_smiles(&row.smiles) {
            Ok(molecule) => {
                population.try_push(LigandRecord::new(
                    row.name,
                    molecule,
                    row.origin,
                    row.parents,
                    row.detail,
                ));
            }
            Err(e) => {
                warn!(name = %row.name, smiles = %row.smiles, error = %e, "Skipping unparsable ranked row")
            }
        }
    }
    Ok(population)
}

/// Loads generation 0's seeds from the source compound file.
///
/// Unparsable rows and repeated structures are skipped. When `prefilter` is given,
/// compounds it rejects are dropped too.
pub fn read_source_population(
    path: &Path,
    prefilter: Option<&FilterChain>,
) -> Result<Population, EngineError> {
    let rows = SmiFile::read_from_path(path).map_err(|source| EngineError::SeedFile {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    let total = rows.len();
    let mut population = Population::new();
    let mut filtered = 0;
    for row in rows {
        let molecule = match parse_smiles(&row.smiles) {
            Ok(molecule) => molecule,
            Err(e) => {
                warn!(name = %row.name, smiles = %row.smiles, error = %e, "Skipping unparsable source compound");
                continue;
            }
        };
        if let Some(chain) = prefilter {
            let rejected_by = chain.rejections(&molecule);
            if !rejected_by.is_empty() {
                debug!(name = %row.name, filters = ?rejected_by, "Source compound rejected by filters");
                filtered += 1;
                continue;
            }
        }
        if !population.try_push(LigandRecord::seed(row.name, molecule)) {
            debug!(smiles = %row.smiles, "Skipping repeated source compound");
        }
    }
    info!(
        total,
        kept = population.len(),
        filtered,
        "Source compounds loaded"
    );
    Ok(population)
}

/// Deletes the transient conversion directories of a finished generation.
///
/// Nothing is removed in debug mode or while the ranked artifact is missing. Removal is
/// best effort: a failed deletion is retried after making the tree writable, and a
/// second failure is only logged. Returns how many paths were removed.
pub fn cleanup_transient(gen_dir: &Path, generation: u32, debug_mode: bool) -> usize {
    if debug_mode {
        debug!(generation, "Debug mode: keeping transient files");
        return 0;
    }
    if !determine_if_gen_completed(gen_dir, generation) {
        warn!(generation, "Ranked artifact missing; transient files kept");
        return 0;
    }
    let mut removed = 0;
    for relative in TRANSIENT_DIRS {
        let path = gen_dir.join(relative);
        if !path.exists() {
            continue;
        }
        let result = remove_path(&path).or_else(|first| {
            debug!(path = %path.display(), error = %first, "Retrying removal with write permissions");
            make_tree_writable(&path);
            remove_path(&path)
        });
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove transient path"),
        }
    }
    removed
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn make_tree_writable(path: &Path) {
    make_writable(path);
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            make_tree_writable(&entry.path());
        }
    }
}

#[cfg(unix)]
fn make_writable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = fs::symlink_metadata(path) {
        let mut permissions = metadata.permissions();
        permissions.set_mode(permissions.mode() | 0o700);
        let _ = fs::set_permissions(path, permissions);
    }
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path) {
    if let Ok(metadata) = fs::symlink_metadata(path) {
        let mut permissions = metadata.permissions();
        permissions.set_readonly(false);
        let _ = fs::set_permissions(path, permissions);
    }
}

fn io_error(path: &Path, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}
