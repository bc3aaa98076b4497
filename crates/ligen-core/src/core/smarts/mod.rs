//! SMARTS substructure queries.
//!
//! Supported: organic-subset and aromatic symbols, `*`, `a`, `A`, bracket expressions
//! with element symbols, `#n`, `Hn`, `Dn`, `Xn`, `R`/`R0`/`rn`, charges, atom-map
//! classes and the logical operators `!`, `&`, `,`, `;`. Bonds `- = # : ~ @` with
//! negation and logical operators; an omitted bond matches single or aromatic.
//! Recursive SMARTS (`$(...)`) is not supported.

mod matcher;
mod parser;

use crate::core::models::element::Element;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use thiserror::Error;

pub use matcher::SubstructureMatcher;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SmartsError {
    #[error("Empty SMARTS pattern")]
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
    #[error("Bond expression at position {0} is not followed by an atom")]
    DanglingBond(usize),
    #[error("Unsupported SMARTS feature '{feature}' at position {pos}")]
    Unsupported { feature: &'static str, pos: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomPrimitive {
    Any,
    Element { element: Element, aromatic: bool },
    AtomicNumber(u8),
    Aromatic,
    Aliphatic,
    TotalHydrogens(u8),
    Degree(u8),
    Connectivity(u8),
    InRing(bool),
    Charge(i8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomExpr {
    Primitive(AtomPrimitive),
    Not(Box<AtomExpr>),
    And(Vec<AtomExpr>),
    Or(Vec<AtomExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BondExpr {
    /// No bond symbol written: single or aromatic.
    Implicit,
    Any,
    Order(BondOrder),
    Ring,
    Not(Box<BondExpr>),
    And(Vec<BondExpr>),
    Or(Vec<BondExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAtom {
    pub expr: AtomExpr,
    pub map_class: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBond {
    pub atom1: usize,
    pub atom2: usize,
    pub expr: BondExpr,
}

impl AtomExpr {
    pub fn matches(&self, molecule: &Molecule, atom: usize) -> bool {
        match self {
            Self::Primitive(p) => p.matches(molecule, atom),
            Self::Not(inner) => !inner.matches(molecule, atom),
            Self::And(terms) => terms.iter().all(|t| t.matches(molecule, atom)),
            Self::Or(terms) => terms.iter().any(|t| t.matches(molecule, atom)),
        }
    }

    /// Primitives that must all hold, i.e. the top-level conjunction without any
    /// negated or alternative terms.
    fn required_primitives(&self) -> Vec<AtomPrimitive> {
        match self {
            Self::Primitive(p) => vec![*p],
            Self::And(terms) => terms
                .iter()
                .flat_map(|t| t.required_primitives())
                .collect(),
            Self::Not(_) | Self::Or(_) => Vec::new(),
        }
    }
}

impl AtomPrimitive {
    fn matches(&self, molecule: &Molecule, index: usize) -> bool {
        let atom = molecule.atom(index);
        match *self {
            Self::Any => true,
            Self::Element { element, aromatic } => {
                atom.element == element && atom.aromatic == aromatic
            }
            Self::AtomicNumber(n) => atom.element.atomic_number() == n,
            Self::Aromatic => atom.aromatic,
            Self::Aliphatic => !atom.aromatic,
            Self::TotalHydrogens(n) => atom.hydrogens == n,
            Self::Degree(n) => molecule.degree(index) == n as usize,
            Self::Connectivity(n) => molecule.degree(index) + atom.hydrogens as usize == n as usize,
            Self::InRing(in_ring) => molecule.is_ring_atom(index) == in_ring,
            Self::Charge(c) => atom.charge == c,
        }
    }
}

impl BondExpr {
    pub fn matches(&self, molecule: &Molecule, bond: usize) -> bool {
        let order = molecule.bond(bond).order;
        match self {
            Self::Implicit => matches!(order, BondOrder::Single | BondOrder::Aromatic),
            Self::Any => true,
            Self::Order(expected) => order == *expected,
            Self::Ring => molecule.is_ring_bond(bond),
            Self::Not(inner) => !inner.matches(molecule, bond),
            Self::And(terms) => terms.iter().all(|t| t.matches(molecule, bond)),
            Self::Or(terms) => terms.iter().any(|t| t.matches(molecule, bond)),
        }
    }

    /// The concrete bond order this expression stands for when used in a reaction
    /// product, if it names exactly one.
    pub fn order(&self) -> Option<BondOrder> {
        match self {
            Self::Order(order) => Some(*order),
            Self::And(terms) => terms.iter().find_map(|t| t.order()),
            _ => None,
        }
    }
}

impl QueryAtom {
    /// Element (and aromaticity, when the symbol fixes it) required by this atom.
    pub fn element(&self) -> Option<(Element, Option<bool>)> {
        let primitives = self.expr.required_primitives();
        let aromatic_flag = primitives.iter().find_map(|p| match p {
            AtomPrimitive::Aromatic => Some(true),
            AtomPrimitive::Aliphatic => Some(false),
            _ => None,
        });
        primitives.iter().find_map(|p| match *p {
            AtomPrimitive::Element { element, aromatic } => Some((element, Some(aromatic))),
            AtomPrimitive::AtomicNumber(n) => {
                Element::from_atomic_number(n).map(|e| (e, aromatic_flag))
            }
            _ => None,
        })
    }

    /// Formal charge required by this atom, if any.
    pub fn charge(&self) -> Option<i8> {
        self.expr
            .required_primitives()
            .iter()
            .find_map(|p| match *p {
                AtomPrimitive::Charge(c) => Some(c),
                _ => None,
            })
    }
}

/// A parsed SMARTS query graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartsPattern {
    source: String,
    atoms: Vec<QueryAtom>,
    bonds: Vec<QueryBond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl SmartsPattern {
    pub fn parse(source: &str) -> Result<Self, SmartsError> {
        let (atoms, bonds) = parser::parse(source.trim())?;
        Ok(Self::assemble(source.trim().to_string(), atoms, bonds))
    }

    /// An exact query for the whole molecule.
    pub fn from_molecule(molecule: &Molecule) -> Self {
        let all: Vec<usize> = (0..molecule.atom_count()).collect();
        Self::from_substructure(molecule, &all)
    }

    /// An exact query for the subgraph induced by `atoms`: each query atom requires
    /// the element, aromaticity and charge of its source atom, and each query bond the
    /// source bond order.
    pub fn from_substructure(molecule: &Molecule, atoms: &[usize]) -> Self {
        let mut remap = vec![usize::MAX; molecule.atom_count()];
        let query_atoms = atoms
            .iter()
            .enumerate()
            .map(|(new, &old)| {
                remap[old] = new;
                let atom = molecule.atom(old);
                QueryAtom {
                    expr: AtomExpr::And(vec![
                        AtomExpr::Primitive(AtomPrimitive::Element {
                            element: atom.element,
                            aromatic: atom.aromatic,
                        }),
                        AtomExpr::Primitive(AtomPrimitive::Charge(atom.charge)),
                    ]),
                    map_class: None,
                }
            })
            .collect();
        let query_bonds = molecule
            .bonds()
            .iter()
            .filter(|b| remap[b.atom1] != usize::MAX && remap[b.atom2] != usize::MAX)
            .map(|b| QueryBond {
                atom1: remap[b.atom1],
                atom2: remap[b.atom2],
                expr: BondExpr::Order(b.order),
            })
            .collect();
        Self::assemble(String::new(), query_atoms, query_bonds)
    }

    fn assemble(source: String, atoms: Vec<QueryAtom>, bonds: Vec<QueryBond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (index, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, index));
            adjacency[bond.atom2].push((bond.atom1, index));
        }
        Self {
            source,
            atoms,
            bonds,
            adjacency,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn atoms(&self) -> &[QueryAtom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[QueryBond] {
        &self.bonds
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn neighbors(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&QueryBond> {
        self.adjacency[a]
            .iter()
            .find(|&&(n, _)| n == b)
            .map(|&(_, bond)| &self.bonds[bond])
    }

    pub fn matches(&self, molecule: &Molecule) -> bool {
        SubstructureMatcher::new(self, molecule).is_match()
    }

    /// All matches that differ in the set of molecule atoms covered.
    pub fn find_unique_matches(&self, molecule: &Molecule) -> Vec<Vec<usize>> {
        SubstructureMatcher::new(self, molecule).find_all(true)
    }
}

impl std::str::FromStr for SmartsPattern {
    type Err = SmartsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
