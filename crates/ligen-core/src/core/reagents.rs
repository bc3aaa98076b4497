use crate::core::io::smi::{SmiError, SmiFile};
use crate::core::io::traits::RecordFile;
use crate::core::models::molecule::Molecule;
use crate::core::reactions::library::ReactionLibrary;
use crate::core::smiles::parse_smiles;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ReagentLoadError {
    #[error("Reagent file for functional group '{group}' not found at {path}")]
    MissingFile { group: String, path: String },
    #[error("Failed to read reagent file {path}: {source}")]
    Read { path: String, source: SmiError },
}

#[derive(Debug, Clone)]
pub struct Reagent {
    pub name: String,
    pub molecule: Molecule,
}

/// Candidate reagents for every functional group used by a reaction library.
///
/// Built once per run and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ReagentIndex {
    by_group: HashMap<String, Vec<Reagent>>,
}

impl ReagentIndex {
    /// Loads `<dir>/<group>.smi` for every functional group the library uses.
    ///
    /// A missing file is an error. Rows that fail to parse, or whose molecule does not
    /// carry the group, are skipped with a warning.
    pub fn load(dir: &Path, library: &ReactionLibrary) -> Result<Self, ReagentLoadError> {
        let mut by_group = HashMap::new();
        for group_name in library.used_groups() {
            let path = Self::file_for(dir, group_name);
            if !path.is_file() {
                return Err(ReagentLoadError::MissingFile {
                    group: group_name.to_string(),
                    path: path.to_string_lossy().to_string(),
                });
            }
            let rows = SmiFile::read_from_path(&path).map_err(|source| ReagentLoadError::Read {
                path: path.to_string_lossy().to_string(),
                source,
            })?;

            let pattern = library.group(group_name).map(|g| g.pattern());
            let total = rows.len();
            let mut reagents = Vec::with_capacity(total);
            for row in rows {
                let molecule = match parse_smiles(&row.smiles) {
                    Ok(molecule) => molecule,
                    Err(e) => {
                        warn!(group = group_name, reagent = %row.name, error = %e, "Skipping unparsable reagent");
                        continue;
                    }
                };
                if pattern.is_some_and(|p| !p.matches(&molecule)) {
                    warn!(group = group_name, reagent = %row.name, "Reagent does not carry its functional group; skipping");
                    continue;
                }
                reagents.push(Reagent {
                    name: row.name,
                    molecule,
                });
            }
            debug!(group = group_name, kept = reagents.len(), total, "Loaded reagents");
            by_group.insert(group_name.to_string(), reagents);
        }
        Ok(Self { by_group })
    }

    pub fn file_for(dir: &Path, group: &str) -> PathBuf {
        dir.join(format!("{group}.smi"))
    }

    pub fn insert(&mut self, group: impl Into<String>, reagents: Vec<Reagent>) {
        self.by_group.insert(group.into(), reagents);
    }

    /// Reagents for `group`; empty when the group is unknown.
    pub fn reagents(&self, group: &str) -> &[Reagent] {
        self.by_group.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn group_count(&self) -> usize {
        self.by_group.len()
    }

    pub fn total_reagents(&self) -> usize {
        self.by_group.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reactions::library::ReactionDefinition;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::tempdir;

    fn amide_library() -> ReactionLibrary {
        let groups: BTreeMap<String, String> = [
            ("Acid".to_string(), "[CX3](=O)[OX2H1]".to_string()),
            ("Amine".to_string(), "[NX3;H2,H1;!a][CX4,c]".to_string()),
        ]
        .into();
        ReactionLibrary::from_definitions(
            vec![ReactionDefinition {
                name: "Amide".into(),
                smirks: "[C:1](=[O:2])[OH].[NX3;H2,H1;!a:3]-[#6:4]>>[C:1](=[O:2])[N:3]-[#6:4]"
                    .into(),
                groups: vec!["Acid".into(), "Amine".into()],
            }],
            groups,
        )
        .unwrap()
    }

    #[test]
    fn loads_and_filters_reagents_per_group() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Acid.smi"), "CC(=O)O\tacetic\nCCO\tethanol\n").unwrap();
        fs::write(
            dir.path().join("Amine.smi"),
            "NCC\tethylamine\nnot_a_smiles\tbroken\nCNC\tdimethylamine\n",
        )
        .unwrap();

        let index = ReagentIndex::load(dir.path(), &amide_library()).unwrap();
        assert_eq!(index.group_count(), 2);
        assert_eq!(index.reagents("Acid").len(), 1);
        assert_eq!(index.reagents("Acid")[0].name, "acetic");
        assert_eq!(index.reagents("Amine").len(), 2);
        assert_eq!(index.total_reagents(), 3);
        assert!(index.reagents("Unknown").is_empty());
    }

    #[test]
    fn missing_group_file_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Acid.smi"), "CC(=O)O\tacetic\n").unwrap();
        let err = ReagentIndex::load(dir.path(), &amide_library()).unwrap_err();
        match err {
            ReagentLoadError::MissingFile { group, .. } => assert_eq!(group, "Amine"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
