use super::{Reaction, ReactionParseError};
use crate::core::models::molecule::Molecule;
use crate::core::smarts::{SmartsError, SmartsPattern};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryLoadError {
    #[error("I/O error reading file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error in file {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Functional group '{name}' has an invalid SMARTS: {source}")]
    InvalidGroup { name: String, source: SmartsError },
    #[error("Reaction '{name}' has an invalid SMIRKS: {source}")]
    InvalidReaction {
        name: String,
        source: ReactionParseError,
    },
    #[error("Reaction '{reaction}' refers to undefined functional group '{group}'")]
    UndefinedGroup { reaction: String, group: String },
    #[error("Reaction '{reaction}' lists {groups} functional groups for {reactants} reactants")]
    SlotMismatch {
        reaction: String,
        groups: usize,
        reactants: usize,
    },
    #[error("Reaction '{0}' is defined more than once")]
    DuplicateReaction(String),
    #[error("Reaction library contains no reactions")]
    Empty,
}

#[derive(Debug, Error)]
#[error("Unknown reaction library '{0}' (expected click_chem_rxns, robust_rxns or all_rxns)")]
pub struct UnknownLibraryError(String);

/// Reaction sets shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinLibrary {
    ClickChem,
    Robust,
    All,
}

impl BuiltinLibrary {
    pub fn name(self) -> &'static str {
        match self {
            Self::ClickChem => "click_chem_rxns",
            Self::Robust => "robust_rxns",
            Self::All => "all_rxns",
        }
    }

    fn includes(self, sets: &[BuiltinLibrary]) -> bool {
        self == Self::All || sets.contains(&self)
    }
}

impl FromStr for BuiltinLibrary {
    type Err = UnknownLibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "click_chem_rxns" | "click_chem" | "click" => Ok(Self::ClickChem),
            "robust_rxns" | "robust" => Ok(Self::Robust),
            "all_rxns" | "all" => Ok(Self::All),
            _ => Err(UnknownLibraryError(s.to_string())),
        }
    }
}

impl fmt::Display for BuiltinLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the mutation operator takes its reactions from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionLibrarySource {
    Builtin(BuiltinLibrary),
    Custom {
        reactions_path: PathBuf,
        groups_path: PathBuf,
    },
}

impl Default for ReactionLibrarySource {
    fn default() -> Self {
        Self::Builtin(BuiltinLibrary::All)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionalGroup {
    name: String,
    pattern: SmartsPattern,
}

impl FunctionalGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &SmartsPattern {
        &self.pattern
    }
}

/// A reaction together with the functional group each of its reactants must carry.
#[derive(Debug, Clone)]
pub struct ReactionTemplate {
    name: String,
    reaction: Reaction,
    groups: Vec<String>,
}

impl ReactionTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reaction(&self) -> &Reaction {
        &self.reaction
    }

    /// Functional group names, one per reactant slot.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }
}

#[derive(Debug, Deserialize)]
struct ReactionFile {
    #[serde(rename = "reaction", default)]
    reactions: Vec<ReactionDefinition>,
}

/// One `[[reaction]]` entry of a custom reaction file.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionDefinition {
    pub name: String,
    pub smirks: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReactionLibrary {
    templates: Vec<ReactionTemplate>,
    groups: BTreeMap<String, FunctionalGroup>,
}

impl ReactionLibrary {
    pub fn load(source: &ReactionLibrarySource) -> Result<Self, LibraryLoadError> {
        match source {
            ReactionLibrarySource::Builtin(kind) => Self::builtin(*kind),
            ReactionLibrarySource::Custom {
                reactions_path,
                groups_path,
            } => Self::from_files(reactions_path, groups_path),
        }
    }

    pub fn builtin(kind: BuiltinLibrary) -> Result<Self, LibraryLoadError> {
        let reactions = BUILTIN_REACTIONS
            .iter()
            .filter(|(_, sets, _, _)| kind.includes(sets))
            .map(|(name, _, smirks, groups)| ReactionDefinition {
                name: name.to_string(),
                smirks: smirks.to_string(),
                groups: groups.iter().map(|g| g.to_string()).collect(),
            })
            .collect();
        let groups = BUILTIN_GROUPS
            .iter()
            .map(|(name, smarts)| (name.to_string(), smarts.to_string()))
            .collect();
        Self::from_definitions(reactions, groups)
    }

    /// Loads a custom library: a TOML file of `[[reaction]]` tables and a TOML file
    /// mapping functional group names to SMARTS.
    pub fn from_files(reactions_path: &Path, groups_path: &Path) -> Result<Self, LibraryLoadError> {
        let reactions: ReactionFile = read_toml(reactions_path)?;
        let groups: BTreeMap<String, String> = read_toml(groups_path)?;
        Self::from_definitions(reactions.reactions, groups)
    }

    pub fn from_definitions(
        reactions: Vec<ReactionDefinition>,
        groups: BTreeMap<String, String>,
    ) -> Result<Self, LibraryLoadError> {
        let groups = groups
            .into_iter()
            .map(|(name, smarts)| {
                let pattern = SmartsPattern::parse(&smarts).map_err(|source| {
                    LibraryLoadError::InvalidGroup {
                        name: name.clone(),
                        source,
                    }
                })?;
                Ok((name.clone(), FunctionalGroup { name, pattern }))
            })
            .collect::<Result<BTreeMap<_, _>, LibraryLoadError>>()?;

        let mut seen = HashSet::new();
        let mut templates = Vec::with_capacity(reactions.len());
        for definition in reactions {
            if !seen.insert(definition.name.clone()) {
                return Err(LibraryLoadError::DuplicateReaction(definition.name));
            }
            let reaction = Reaction::parse(&definition.smirks).map_err(|source| {
                LibraryLoadError::InvalidReaction {
                    name: definition.name.clone(),
                    source,
                }
            })?;
            if reaction.reactant_count() != definition.groups.len() {
                return Err(LibraryLoadError::SlotMismatch {
                    reaction: definition.name,
                    groups: definition.groups.len(),
                    reactants: reaction.reactant_count(),
                });
            }
            if let Some(missing) = definition.groups.iter().find(|g| !groups.contains_key(*g)) {
                return Err(LibraryLoadError::UndefinedGroup {
                    reaction: definition.name.clone(),
                    group: missing.clone(),
                });
            }
            templates.push(ReactionTemplate {
                name: definition.name,
                reaction,
                groups: definition.groups,
            });
        }

        if templates.is_empty() {
            return Err(LibraryLoadError::Empty);
        }
        Ok(Self { templates, groups })
    }

    pub fn templates(&self) -> &[ReactionTemplate] {
        &self.templates
    }

    pub fn group(&self, name: &str) -> Option<&FunctionalGroup> {
        self.groups.get(name)
    }

    /// Names of the functional groups that appear in at least one reaction slot.
    pub fn used_groups(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .templates
            .iter()
            .flat_map(|t| t.groups.iter().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Every `(template index, reactant slot)` the molecule can occupy: it carries the
    /// slot's functional group and matches the slot's reactant template.
    pub fn applicable_slots(&self, molecule: &Molecule) -> Vec<(usize, usize)> {
        let mut slots = Vec::new();
        for (index, template) in self.templates.iter().enumerate() {
            for (slot, group) in template.groups.iter().enumerate() {
                let carries_group = self
                    .groups
                    .get(group)
                    .is_some_and(|g| g.pattern.matches(molecule));
                if carries_group && template.reaction.reactant_template(slot).matches(molecule) {
                    slots.push((index, slot));
                }
            }
        }
        slots
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LibraryLoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| LibraryLoadError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| LibraryLoadError::Toml {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

const BUILTIN_GROUPS: &[(&str, &str)] = &[
    ("Carboxylic_Acid", "[CX3](=O)[OX2H1]"),
    ("Amine", "[NX3;H2,H1;!a][CX4,c]"),
    ("Alcohol", "[OX2H1][CX4]"),
    ("Azide", "[NX2]=[N+]=[N-]"),
    ("Terminal_Alkyne", "[CX2]#[CX2H1]"),
    ("Alkyl_Halide", "[CX4][Cl,Br,I]"),
    ("Sulfonyl_Chloride", "[SX4](=O)(=O)Cl"),
    ("Isocyanate", "[NX2]=C=O"),
    ("Aldehyde", "[CX3H1](=O)[#6]"),
    ("Aryl_Halide", "c[Br,I]"),
    ("Boronic_Acid", "c[BX3]([OH])[OH]"),
    ("Alkyl_Ester", "[CX3](=O)[OX2][CX4]"),
];

use BuiltinLibrary::{ClickChem, Robust};

type BuiltinReaction = (
    &'static str,
    &'static [BuiltinLibrary],
    &'static str,
    &'static [&'static str],
);

const BUILTIN_REACTIONS: &[BuiltinReaction] = &[
    (
        "Azide_Alkyne_Cycloaddition",
        &[ClickChem],
        "[N:1]=[N+:2]=[N-:3].[C:4]#[CH:5]>>[n:1]1[n:2][n:3][c:4][c:5]1",
        &["Azide", "Terminal_Alkyne"],
    ),
    (
        "Amide_Coupling",
        &[ClickChem, Robust],
        "[C:1](=[O:2])[OH].[NX3;H2,H1;!a:3]-[#6:4]>>[C:1](=[O:2])[N:3]-[#6:4]",
        &["Carboxylic_Acid", "Amine"],
    ),
    (
        "Ester_Formation",
        &[ClickChem],
        "[C:1](=[O:2])[OH].[OX2H1:3]-[CX4:4]>>[C:1](=[O:2])[O:3]-[C:4]",
        &["Carboxylic_Acid", "Alcohol"],
    ),
    (
        "Sulfonamide_Formation",
        &[ClickChem, Robust],
        "[S:1](=[O:2])(=[O:3])Cl.[NX3;H2,H1;!a:4]-[#6:5]>>[S:1](=[O:2])(=[O:3])[N:4]-[#6:5]",
        &["Sulfonyl_Chloride", "Amine"],
    ),
    (
        "Urea_Formation",
        &[ClickChem],
        "[N:1]=[C:2]=[O:3].[NX3;H2,H1;!a:4]-[#6:5]>>[N:1][C:2](=[O:3])[N:4]-[#6:5]",
        &["Isocyanate", "Amine"],
    ),
    (
        "Amine_Alkylation",
        &[Robust],
        "[CX4:1][Cl,Br,I].[NX3;H2,H1;!a:2]-[#6:3]>>[C:1][N:2]-[#6:3]",
        &["Alkyl_Halide", "Amine"],
    ),
    (
        "Reductive_Amination",
        &[Robust],
        "[CH1:1](=O)[#6:2].[NX3;H2,H1;!a:3]-[#6:4]>>[CH2:1]([#6:2])[N:3]-[#6:4]",
        &["Aldehyde", "Amine"],
    ),
    (
        "Suzuki_Coupling",
        &[Robust],
        "[c:1][Br,I].[c:2][B]([OH])[OH]>>[c:1]-[c:2]",
        &["Aryl_Halide", "Boronic_Acid"],
    ),
    (
        "Ester_Hydrolysis",
        &[Robust],
        "[C:1](=[O:2])[O:3][CX4]>>[C:1](=[O:2])[O:3]",
        &["Alkyl_Ester"],
    ),
];
