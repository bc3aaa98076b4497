use super::molecule::Molecule;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How a ligand entered the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    Seed,
    Crossover,
    Mutation,
}

#[derive(Debug, Error)]
#[error("Invalid ligand origin: '{0}'")]
pub struct ParseOriginError(String);

impl FromStr for Origin {
    type Err = ParseOriginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "seed" | "source" => Ok(Self::Seed),
            "crossover" | "cross" => Ok(Self::Crossover),
            "mutation" | "mutant" => Ok(Self::Mutation),
            _ => Err(ParseOriginError(s.to_string())),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Seed => "seed",
            Self::Crossover => "crossover",
            Self::Mutation => "mutation",
        })
    }
}

/// A named molecule together with its provenance.
///
/// Records are built once and never mutated; the canonical SMILES of the molecule is
/// the record's identity within a [`Population`](super::population::Population).
#[derive(Debug, Clone)]
pub struct LigandRecord {
    name: String,
    molecule: Molecule,
    origin: Origin,
    parents: Vec<String>,
    detail: Option<String>,
}

impl LigandRecord {
    pub fn new(
        name: impl Into<String>,
        molecule: Molecule,
        origin: Origin,
        parents: Vec<String>,
        detail: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            molecule,
            origin,
            parents,
            detail,
        }
    }

    pub fn seed(name: impl Into<String>, molecule: Molecule) -> Self {
        Self::new(name, molecule, Origin::Seed, Vec::new(), None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn molecule(&self) -> &Molecule {
        &self.molecule
    }

    pub fn smiles(&self) -> &str {
        self.molecule.canonical_smiles()
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}
