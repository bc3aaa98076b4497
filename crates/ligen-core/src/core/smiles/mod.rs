//! SMILES line notation: parsing into sanitized [`Molecule`](crate::core::models::molecule::Molecule)
//! graphs and canonical writing.
//!
//! The parser covers the organic subset, bracket atoms, branches, ring closures and
//! disconnected components. Stereochemistry marks (`@`, `/`, `\`) are accepted and
//! discarded. The writer produces a canonical string, so two molecules describe the
//! same structure exactly when their canonical SMILES compare equal.

mod parser;
mod writer;

use crate::core::models::molecule::SanitizeError;
use thiserror::Error;

pub use parser::parse_smiles;
pub use writer::write_canonical;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SmilesError {
    #[error("Empty SMILES string")]
    Empty,
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedCharacter { ch: char, pos: usize },
    #[error("Unknown element '{symbol}' at position {pos}")]
    UnknownElement { symbol: String, pos: usize },
    #[error("Unclosed bracket atom starting at position {0}")]
    UnclosedBracket(usize),
    #[error("Unbalanced parentheses")]
    UnbalancedBranch,
    #[error("Ring closure {0} is never closed")]
    UnclosedRing(u16),
    #[error("Invalid ring closure {0}")]
    InvalidRingClosure(u16),
    #[error("Number at position {0} is out of range")]
    ValueOutOfRange(usize),
    #[error("Bond symbol at position {0} is not followed by an atom")]
    DanglingBond(usize),
    #[error("Invalid structure: {0}")]
    Sanitize(#[from] SanitizeError),
}
