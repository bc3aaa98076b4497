//! Reaction SMIRKS and their application to concrete molecules.
//!
//! A reaction is written `reactant1.reactant2>>product` where every template is a
//! SMARTS pattern. Atoms carrying the same map class on both sides are carried over
//! (and updated to the product template's element, aromaticity and charge), unmapped
//! reactant atoms are deleted, and unmapped product atoms are created.

pub mod library;

use crate::core::models::atom::{Atom, implicit_hydrogens};
use crate::core::models::element::Element;
use crate::core::models::molecule::{Molecule, SanitizeError, connected_components, extract};
use crate::core::models::topology::{Bond, BondOrder};
use crate::core::smarts::{SmartsError, SmartsPattern};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReactionParseError {
    #[error("Reaction '{0}' must contain exactly one '>>'")]
    MissingArrow(String),
    #[error("Reaction has no reactant templates")]
    NoReactants,
    #[error("Invalid reactant template {index}: {source}")]
    Reactant { index: usize, source: SmartsError },
    #[error("Invalid product template: {0}")]
    Product(#[source] SmartsError),
    #[error("Atom map {0} appears more than once among the reactant templates")]
    DuplicateMap(u16),
    #[error("Product atom map {0} does not occur in any reactant template")]
    UnknownMap(u16),
    #[error("Unmapped product atom {0} does not name an element")]
    UnspecifiedProductAtom(usize),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReactionError {
    #[error("Reaction expects {expected} reactants, got {actual}")]
    ReactantCount { expected: usize, actual: usize },
    #[error("Reactant {0} does not match its template")]
    NoMatch(usize),
    #[error("Product is not a valid molecule: {0}")]
    Sanitize(#[from] SanitizeError),
}

#[derive(Debug, Clone)]
pub struct Reaction {
    smirks: String,
    reactants: Vec<SmartsPattern>,
    product: SmartsPattern,
}

impl Reaction {
    pub fn parse(smirks: &str) -> Result<Self, ReactionParseError> {
        let smirks = smirks.trim();
        let mut sides = smirks.split(">>");
        let (Some(left), Some(right), None) = (sides.next(), sides.next(), sides.next()) else {
            return Err(ReactionParseError::MissingArrow(smirks.to_string()));
        };
        if left.trim().is_empty() {
            return Err(ReactionParseError::NoReactants);
        }

        let reactants = split_top_level(left)
            .into_iter()
            .enumerate()
            .map(|(index, part)| {
                SmartsPattern::parse(part)
                    .map_err(|source| ReactionParseError::Reactant { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let product = SmartsPattern::parse(right).map_err(ReactionParseError::Product)?;

        let mut reactant_maps = HashMap::new();
        for template in &reactants {
            for map in template.atoms().iter().filter_map(|a| a.map_class) {
                if reactant_maps.insert(map, ()).is_some() {
                    return Err(ReactionParseError::DuplicateMap(map));
                }
            }
        }
        for (index, atom) in product.atoms().iter().enumerate() {
            match atom.map_class {
                Some(map) if !reactant_maps.contains_key(&map) => {
                    return Err(ReactionParseError::UnknownMap(map));
                }
                None if atom.element().is_none() => {
                    return Err(ReactionParseError::UnspecifiedProductAtom(index));
                }
                _ => {}
            }
        }

        Ok(Self {
            smirks: smirks.to_string(),
            reactants,
            product,
        })
    }

    pub fn smirks(&self) -> &str {
        &self.smirks
    }

    pub fn reactant_count(&self) -> usize {
        self.reactants.len()
    }

    pub fn reactant_template(&self, slot: usize) -> &SmartsPattern {
        &self.reactants[slot]
    }

    /// Runs the reaction on `reactants`, choosing uniformly at random among the
    /// distinct matches of each reactant template.
    pub fn run<R: Rng + ?Sized>(
        &self,
        reactants: &[&Molecule],
        rng: &mut R,
    ) -> Result<Molecule, ReactionError> {
        if reactants.len() != self.reactants.len() {
            return Err(ReactionError::ReactantCount {
                expected: self.reactants.len(),
                actual: reactants.len(),
            });
        }
        let mut chosen = Vec::with_capacity(reactants.len());
        for (slot, (template, molecule)) in self.reactants.iter().zip(reactants).enumerate() {
            let matches = template.find_unique_matches(molecule);
            let pick = matches.choose(rng).ok_or(ReactionError::NoMatch(slot))?;
            chosen.push(pick.clone());
        }
        self.apply(reactants, &chosen)
    }

    /// Applies the reaction for one specific match per reactant template.
    pub fn apply(
        &self,
        reactants: &[&Molecule],
        matches: &[Vec<usize>],
    ) -> Result<Molecule, ReactionError> {
        if reactants.len() != self.reactants.len() || matches.len() != self.reactants.len() {
            return Err(ReactionError::ReactantCount {
                expected: self.reactants.len(),
                actual: reactants.len().min(matches.len()),
            });
        }

        let mut atoms: Vec<Atom> = Vec::new();
        let mut bonds: Vec<Bond> = Vec::new();
        let mut offsets = Vec::with_capacity(reactants.len());
        for molecule in reactants {
            let offset = atoms.len();
            offsets.push(offset);
            atoms.extend(molecule.atoms().iter().map(|a| Atom {
                map_class: None,
                ..*a
            }));
            bonds.extend(
                molecule
                    .bonds()
                    .iter()
                    .map(|b| Bond::new(b.atom1 + offset, b.atom2 + offset, b.order)),
            );
        }

        let mut removed = vec![false; atoms.len()];
        let mut map_to_atom: HashMap<u16, usize> = HashMap::new();
        for (slot, template) in self.reactants.iter().enumerate() {
            let mapping = &matches[slot];
            if mapping.len() != template.atom_count() {
                return Err(ReactionError::NoMatch(slot));
            }
            for (query, atom) in template.atoms().iter().enumerate() {
                let target = offsets[slot] + mapping[query];
                match atom.map_class {
                    Some(map) => {
                        map_to_atom.insert(map, target);
                    }
                    None => removed[target] = true,
                }
            }
        }

        let mut touched = vec![false; atoms.len()];
        let mut product_atoms = Vec::with_capacity(self.product.atom_count());
        let mut product_map: HashMap<u16, usize> = HashMap::new();
        for (index, query) in self.product.atoms().iter().enumerate() {
            let spec = query.element();
            let charge = query.charge();
            let target = match query.map_class.and_then(|m| map_to_atom.get(&m).copied()) {
                Some(target) => target,
                None => {
                    let element = spec.map_or(Element::CARBON, |(e, _)| e);
                    atoms.push(Atom::new(element));
                    removed.push(false);
                    touched.push(false);
                    atoms.len() - 1
                }
            };
            let atom = &mut atoms[target];
            if let Some((element, aromatic)) = spec {
                atom.element = element;
                if let Some(aromatic) = aromatic {
                    atom.aromatic = aromatic;
                }
                atom.charge = charge.unwrap_or(0);
            } else if let Some(charge) = charge {
                atom.charge = charge;
            }
            touched[target] = true;
            if let Some(map) = query.map_class {
                product_map.insert(map, index);
            }
            product_atoms.push(target);
        }

        let mut bond_removed = vec![false; bonds.len()];
        for (slot, template) in self.reactants.iter().enumerate() {
            for query_bond in template.bonds() {
                let ends = [query_bond.atom1, query_bond.atom2];
                let maps = ends.map(|q| template.atoms()[q].map_class);
                let [Some(m1), Some(m2)] = maps else { continue };
                let (Some(&p1), Some(&p2)) = (product_map.get(&m1), product_map.get(&m2)) else {
                    continue;
                };
                if self.product.bond_between(p1, p2).is_some() {
                    continue;
                }
                let a = offsets[slot] + matches[slot][query_bond.atom1];
                let b = offsets[slot] + matches[slot][query_bond.atom2];
                if let Some(index) = find_bond(&bonds, &bond_removed, a, b) {
                    bond_removed[index] = true;
                    touched[a] = true;
                    touched[b] = true;
                }
            }
        }

        for query_bond in self.product.bonds() {
            let a = product_atoms[query_bond.atom1];
            let b = product_atoms[query_bond.atom2];
            let order = query_bond.expr.order().unwrap_or(
                if atoms[a].aromatic && atoms[b].aromatic {
                    BondOrder::Aromatic
                } else {
                    BondOrder::Single
                },
            );
            match find_bond(&bonds, &bond_removed, a, b) {
                Some(index) => bonds[index].order = order,
                None => {
                    bonds.push(Bond::new(a, b, order));
                    bond_removed.push(false);
                }
            }
            touched[a] = true;
            touched[b] = true;
        }

        for (index, bond) in bonds.iter().enumerate() {
            if bond_removed[index] {
                continue;
            }
            if removed[bond.atom1] && !removed[bond.atom2] {
                touched[bond.atom2] = true;
            } else if removed[bond.atom2] && !removed[bond.atom1] {
                touched[bond.atom1] = true;
            }
        }

        let kept_bonds: Vec<Bond> = bonds
            .into_iter()
            .zip(bond_removed)
            .filter(|(b, gone)| !gone && !removed[b.atom1] && !removed[b.atom2])
            .map(|(b, _)| b)
            .collect();
        let kept_atoms: Vec<usize> = (0..atoms.len()).filter(|&i| !removed[i]).collect();
        let touched: Vec<bool> = kept_atoms.iter().map(|&i| touched[i]).collect();
        let (mut atoms, bonds) = extract(&atoms, &kept_bonds, &kept_atoms);

        let mut valence = vec![0u8; atoms.len()];
        for bond in &bonds {
            valence[bond.atom1] += bond.order.valence_contribution();
            valence[bond.atom2] += bond.order.valence_contribution();
        }
        for (index, atom) in atoms.iter_mut().enumerate() {
            if touched[index] {
                if let Some(h) =
                    implicit_hydrogens(atom.element, atom.charge, atom.aromatic, valence[index])
                {
                    atom.hydrogens = h;
                }
            }
        }

        let (atoms, bonds) = largest_component(atoms, bonds);
        Ok(Molecule::from_parts(atoms, bonds)?)
    }
}

fn find_bond(bonds: &[Bond], removed: &[bool], a: usize, b: usize) -> Option<usize> {
    bonds
        .iter()
        .enumerate()
        .position(|(i, bond)| !removed[i] && bond.contains(a) && bond.contains(b))
}

fn largest_component(atoms: Vec<Atom>, bonds: Vec<Bond>) -> (Vec<Atom>, Vec<Bond>) {
    let mut adjacency = vec![Vec::new(); atoms.len()];
    for (index, bond) in bonds.iter().enumerate() {
        adjacency[bond.atom1].push((bond.atom2, index));
        adjacency[bond.atom2].push((bond.atom1, index));
    }
    let components = connected_components(atoms.len(), &adjacency);
    if components.len() <= 1 {
        return (atoms, bonds);
    }
    match components.iter().max_by_key(|c| c.len()) {
        Some(keep) => extract(&atoms, &bonds, keep),
        None => (atoms, bonds),
    }
}

/// Splits reactant templates on `.` outside brackets and parentheses.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            '.' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}
