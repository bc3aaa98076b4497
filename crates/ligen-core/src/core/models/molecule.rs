use super::atom::{Atom, implicit_hydrogens};
use super::element::Element;
use super::topology::{Bond, BondOrder};
use crate::core::descriptors::Descriptors;
use crate::core::smiles::{self, SmilesError};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("Molecule has no atoms")]
    Empty,
    #[error("Bond {bond} references atom {atom}, but the molecule has only {count} atoms")]
    DanglingBond {
        bond: usize,
        atom: usize,
        count: usize,
    },
    #[error("Atom {0} is bonded to itself")]
    SelfBond(usize),
    #[error("Atoms {0} and {1} are bonded more than once")]
    DuplicateBond(usize, usize),
    #[error("Atom {index} ({element}) exceeds its maximum valence of {max}")]
    ValenceExceeded {
        index: usize,
        element: Element,
        max: u8,
    },
    #[error("Aromatic atom {0} is not part of a ring")]
    AromaticOutsideRing(usize),
    #[error("Aromatic bond between atoms {0} and {1} involves a non-aromatic atom")]
    AromaticBondMismatch(usize, usize),
}

#[derive(Debug, Clone)]
struct RingInfo {
    bond_in_ring: Vec<bool>,
    atom_in_ring: Vec<bool>,
    ring_count: usize,
}

/// An immutable, sanitized molecular graph.
///
/// A `Molecule` can only be obtained through [`Molecule::from_parts`] (or the SMILES
/// parser, which calls it), so every instance has passed valence and aromaticity
/// checks. Ring perception, descriptors and the canonical SMILES are computed lazily
/// and cached.
#[derive(Debug, Clone)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<(usize, usize)>>,
    rings: OnceLock<RingInfo>,
    descriptors: OnceLock<Descriptors>,
    canonical: OnceLock<String>,
}

impl Molecule {
    /// Builds and sanitizes a molecule from raw atoms and bonds.
    ///
    /// Aromatic bonds that turn out not to be ring bonds (for example the bond linking
    /// the two rings of biphenyl written without an explicit `-`) are demoted to single
    /// bonds before validation.
    pub fn from_parts(atoms: Vec<Atom>, mut bonds: Vec<Bond>) -> Result<Self, SanitizeError> {
        if atoms.is_empty() {
            return Err(SanitizeError::Empty);
        }
        let count = atoms.len();
        let mut seen = HashSet::with_capacity(bonds.len());
        for (index, bond) in bonds.iter().enumerate() {
            for atom in [bond.atom1, bond.atom2] {
                if atom >= count {
                    return Err(SanitizeError::DanglingBond {
                        bond: index,
                        atom,
                        count,
                    });
                }
            }
            if bond.atom1 == bond.atom2 {
                return Err(SanitizeError::SelfBond(bond.atom1));
            }
            let key = (bond.atom1.min(bond.atom2), bond.atom1.max(bond.atom2));
            if !seen.insert(key) {
                return Err(SanitizeError::DuplicateBond(key.0, key.1));
            }
        }

        let adjacency = build_adjacency(count, &bonds);
        let rings = perceive_rings(count, &bonds, &adjacency);
        for (index, bond) in bonds.iter_mut().enumerate() {
            if bond.order == BondOrder::Aromatic && !rings.bond_in_ring[index] {
                bond.order = BondOrder::Single;
            }
        }

        let molecule = Self {
            atoms,
            bonds,
            adjacency,
            rings: OnceLock::from(rings),
            descriptors: OnceLock::new(),
            canonical: OnceLock::new(),
        };
        molecule.validate()?;
        Ok(molecule)
    }

    fn validate(&self) -> Result<(), SanitizeError> {
        let rings = self.ring_info();
        for bond in &self.bonds {
            if bond.order == BondOrder::Aromatic
                && !(self.atoms[bond.atom1].aromatic && self.atoms[bond.atom2].aromatic)
            {
                return Err(SanitizeError::AromaticBondMismatch(bond.atom1, bond.atom2));
            }
        }
        for (index, atom) in self.atoms.iter().enumerate() {
            if atom.aromatic && !rings.atom_in_ring[index] {
                return Err(SanitizeError::AromaticOutsideRing(index));
            }
            let valences = atom.element.valences_for_charge(atom.charge);
            if let Some(&max) = valences.last() {
                let used = self.bond_valence(index).saturating_add(atom.hydrogens);
                if used > max {
                    return Err(SanitizeError::ValenceExceeded {
                        index,
                        element: atom.element,
                        max,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom(&self, index: usize) -> &Atom {
        &self.atoms[index]
    }

    pub fn bond(&self, index: usize) -> &Bond {
        &self.bonds[index]
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Neighbours of `atom` as `(neighbour index, bond index)` pairs.
    pub fn neighbors(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }

    /// Number of explicit (graph) neighbours.
    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        self.adjacency[a]
            .iter()
            .find(|&&(neighbor, _)| neighbor == b)
            .map(|&(_, bond)| &self.bonds[bond])
    }

    pub fn bond_index_between(&self, a: usize, b: usize) -> Option<usize> {
        self.adjacency[a]
            .iter()
            .find(|&&(neighbor, _)| neighbor == b)
            .map(|&(_, bond)| bond)
    }

    /// Sum of the valence contributions of all explicit bonds of `atom`.
    pub fn bond_valence(&self, atom: usize) -> u8 {
        self.adjacency[atom]
            .iter()
            .map(|&(_, bond)| self.bonds[bond].order.valence_contribution())
            .fold(0u8, u8::saturating_add)
    }

    pub fn is_ring_bond(&self, bond: usize) -> bool {
        self.ring_info().bond_in_ring[bond]
    }

    pub fn is_ring_atom(&self, atom: usize) -> bool {
        self.ring_info().atom_in_ring[atom]
    }

    /// Number of independent rings (cyclomatic number).
    pub fn ring_count(&self) -> usize {
        self.ring_info().ring_count
    }

    pub fn heavy_atom_count(&self) -> usize {
        self.atoms
            .iter()
            .filter(|a| !a.element.is_hydrogen())
            .count()
    }

    /// Atom indices of each connected component, in order of their lowest atom.
    pub fn components(&self) -> Vec<Vec<usize>> {
        connected_components(self.atoms.len(), &self.adjacency)
    }

    /// Cached drug-likeness descriptors.
    pub fn descriptors(&self) -> &Descriptors {
        self.descriptors.get_or_init(|| Descriptors::compute(self))
    }

    /// Cached canonical SMILES. Two molecules are the same structure exactly when
    /// their canonical SMILES are equal.
    pub fn canonical_smiles(&self) -> &str {
        self.canonical.get_or_init(|| smiles::write_canonical(self))
    }

    pub fn to_smiles(&self) -> String {
        self.canonical_smiles().to_string()
    }

    /// Keeps only the connected component with the most atoms.
    pub fn largest_fragment(&self) -> Result<Molecule, SanitizeError> {
        let components = self.components();
        if components.len() <= 1 {
            return Ok(self.clone());
        }
        let keep = components
            .iter()
            .max_by_key(|c| c.len())
            .cloned()
            .unwrap_or_default();
        let (atoms, bonds) = extract(&self.atoms, &self.bonds, &keep);
        Molecule::from_parts(atoms, bonds)
    }

    /// Returns the neutral form of simple ionized groups.
    ///
    /// Protonated amines (`[NH3+]`, `[nH+]`) lose a proton and anionic oxygens or
    /// sulfurs (`[O-]`) gain one. Zwitterionic pairs such as nitro groups, where the
    /// charged atom has an oppositely charged neighbour, are left untouched.
    pub fn neutralized(&self) -> Molecule {
        let mut atoms = self.atoms.clone();
        let mut changed = false;
        for (index, atom) in self.atoms.iter().enumerate() {
            let neighbor_charges = self.adjacency[index]
                .iter()
                .map(|&(n, _)| self.atoms[n].charge);
            let bond_valence = self.bond_valence(index);
            let neutral_h = implicit_hydrogens(atom.element, 0, atom.aromatic, bond_valence);
            match atom.charge {
                1 if matches!(atom.element, Element::NITROGEN | Element::PHOSPHORUS)
                    && atom.hydrogens > 0 =>
                {
                    if neighbor_charges.clone().all(|c| c >= 0)
                        && neutral_h == Some(atom.hydrogens - 1)
                    {
                        atoms[index].charge = 0;
                        atoms[index].hydrogens -= 1;
                        changed = true;
                    }
                }
                -1 if matches!(
                    atom.element,
                    Element::OXYGEN | Element::SULFUR | Element::NITROGEN
                ) =>
                {
                    if neighbor_charges.clone().all(|c| c <= 0)
                        && neutral_h == Some(atom.hydrogens + 1)
                    {
                        atoms[index].charge = 0;
                        atoms[index].hydrogens += 1;
                        changed = true;
                    }
                }
                _ => {}
            }
        }
        if !changed {
            return self.clone();
        }
        Molecule::from_parts(atoms, self.bonds.clone()).unwrap_or_else(|_| self.clone())
    }

    fn ring_info(&self) -> &RingInfo {
        self.rings
            .get_or_init(|| perceive_rings(self.atoms.len(), &self.bonds, &self.adjacency))
    }
}

impl PartialEq for Molecule {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_smiles() == other.canonical_smiles()
    }
}

impl Eq for Molecule {}

impl FromStr for Molecule {
    type Err = SmilesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        smiles::parse_smiles(s)
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_smiles())
    }
}

fn build_adjacency(count: usize, bonds: &[Bond]) -> Vec<Vec<(usize, usize)>> {
    let mut adjacency = vec![Vec::new(); count];
    for (index, bond) in bonds.iter().enumerate() {
        adjacency[bond.atom1].push((bond.atom2, index));
        adjacency[bond.atom2].push((bond.atom1, index));
    }
    adjacency
}

/// Copies the atoms listed in `keep` (and the bonds among them) into new vectors with
/// re-numbered indices.
pub(crate) fn extract(atoms: &[Atom], bonds: &[Bond], keep: &[usize]) -> (Vec<Atom>, Vec<Bond>) {
    let mut remap = vec![usize::MAX; atoms.len()];
    let mut new_atoms = Vec::with_capacity(keep.len());
    for (new_index, &old) in keep.iter().enumerate() {
        remap[old] = new_index;
        new_atoms.push(atoms[old]);
    }
    let new_bonds = bonds
        .iter()
        .filter(|b| remap[b.atom1] != usize::MAX && remap[b.atom2] != usize::MAX)
        .map(|b| Bond::new(remap[b.atom1], remap[b.atom2], b.order))
        .collect();
    (new_atoms, new_bonds)
}

pub(crate) fn connected_components(
    count: usize,
    adjacency: &[Vec<(usize, usize)>],
) -> Vec<Vec<usize>> {
    let mut component_of = vec![usize::MAX; count];
    let mut components = Vec::new();
    for start in 0..count {
        if component_of[start] != usize::MAX {
            continue;
        }
        let id = components.len();
        let mut members = vec![start];
        component_of[start] = id;
        let mut queue = VecDeque::from([start]);
        while let Some(atom) = queue.pop_front() {
            for &(neighbor, _) in &adjacency[atom] {
                if component_of[neighbor] == usize::MAX {
                    component_of[neighbor] = id;
                    members.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }
    components
}

/// Marks ring bonds as the bonds that are not bridges of the graph.
fn perceive_rings(count: usize, bonds: &[Bond], adjacency: &[Vec<(usize, usize)>]) -> RingInfo {
    struct Search<'a> {
        adjacency: &'a [Vec<(usize, usize)>],
        discovery: Vec<usize>,
        low: Vec<usize>,
        bridge: Vec<bool>,
        timer: usize,
    }

    impl Search<'_> {
        fn visit(&mut self, atom: usize, via: Option<usize>) {
            self.discovery[atom] = self.timer;
            self.low[atom] = self.timer;
            self.timer += 1;
            for &(neighbor, bond) in &self.adjacency[atom] {
                if Some(bond) == via {
                    continue;
                }
                if self.discovery[neighbor] == usize::MAX {
                    self.visit(neighbor, Some(bond));
                    self.low[atom] = self.low[atom].min(self.low[neighbor]);
                    if self.low[neighbor] > self.discovery[atom] {
                        self.bridge[bond] = true;
                    }
                } else {
                    self.low[atom] = self.low[atom].min(self.discovery[neighbor]);
                }
            }
        }
    }

    let mut search = Search {
        adjacency,
        discovery: vec![usize::MAX; count],
        low: vec![0; count],
        bridge: vec![false; bonds.len()],
        timer: 0,
    };
    for atom in 0..count {
        if search.discovery[atom] == usize::MAX {
            search.visit(atom, None);
        }
    }

    let bond_in_ring: Vec<bool> = search.bridge.iter().map(|&b| !b).collect();
    let mut atom_in_ring = vec![false; count];
    for (bond, &in_ring) in bonds.iter().zip(&bond_in_ring) {
        if in_ring {
            atom_in_ring[bond.atom1] = true;
            atom_in_ring[bond.atom2] = true;
        }
    }
    let components = connected_components(count, adjacency).len();
    RingInfo {
        bond_in_ring,
        atom_in_ring,
        ring_count: (bonds.len() + components).saturating_sub(count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::smiles::parse_smiles;

    #[test]
    fn ring_perception_distinguishes_ring_and_chain_bonds() {
        let mol = parse_smiles("c1ccccc1CC").unwrap();
        assert_eq!(mol.ring_count(), 1);
        assert!(mol.is_ring_atom(0));
        assert!(!mol.is_ring_atom(6));
        let exocyclic = mol
            .bonds()
            .iter()
            .position(|b| b.contains(5) && b.contains(6))
            .unwrap();
        assert!(!mol.is_ring_bond(exocyclic));
    }

    #[test]
    fn fused_rings_count_cyclomatically() {
        let naphthalene = parse_smiles("c1ccc2ccccc2c1").unwrap();
        assert_eq!(naphthalene.ring_count(), 2);
        assert!((0..naphthalene.atom_count()).all(|i| naphthalene.is_ring_atom(i)));
    }

    #[test]
    fn from_parts_rejects_valence_overflow() {
        let atoms = vec![
            Atom::new(Element::CARBON).with_hydrogens(3),
            Atom::new(Element::OXYGEN).with_hydrogens(1),
        ];
        let bonds = vec![Bond::new(0, 1, BondOrder::Double)];
        assert!(matches!(
            Molecule::from_parts(atoms, bonds),
            Err(SanitizeError::ValenceExceeded { .. })
        ));
    }

    #[test]
    fn from_parts_rejects_aromatic_atom_outside_ring() {
        let atoms = vec![
            Atom::aromatic(Element::CARBON).with_hydrogens(1),
            Atom::new(Element::CARBON).with_hydrogens(3),
        ];
        let bonds = vec![Bond::new(0, 1, BondOrder::Single)];
        assert_eq!(
            Molecule::from_parts(atoms, bonds).unwrap_err(),
            SanitizeError::AromaticOutsideRing(0)
        );
    }

    #[test]
    fn from_parts_rejects_duplicate_and_dangling_bonds() {
        let atoms = vec![Atom::new(Element::CARBON), Atom::new(Element::CARBON)];
        let duplicate = vec![
            Bond::new(0, 1, BondOrder::Single),
            Bond::new(1, 0, BondOrder::Single),
        ];
        assert_eq!(
            Molecule::from_parts(atoms.clone(), duplicate).unwrap_err(),
            SanitizeError::DuplicateBond(0, 1)
        );
        let dangling = vec![Bond::new(0, 7, BondOrder::Single)];
        assert!(matches!(
            Molecule::from_parts(atoms, dangling),
            Err(SanitizeError::DanglingBond { atom: 7, .. })
        ));
        assert_eq!(
            Molecule::from_parts(Vec::new(), Vec::new()).unwrap_err(),
            SanitizeError::Empty
        );
    }

    #[test]
    fn largest_fragment_drops_counter_ions() {
        let salt = parse_smiles("CCN.Cl").unwrap();
        assert_eq!(salt.components().len(), 2);
        let parent = salt.largest_fragment().unwrap();
        assert_eq!(parent.canonical_smiles(), "CCN");
    }

    #[test]
    fn neutralized_removes_simple_charges_but_keeps_nitro() {
        let ammonium = parse_smiles("CC[NH3+]").unwrap();
        assert_eq!(ammonium.neutralized(), parse_smiles("CCN").unwrap());

        let carboxylate = parse_smiles("CC(=O)[O-]").unwrap();
        assert_eq!(carboxylate.neutralized(), parse_smiles("CC(=O)O").unwrap());

        let nitro = parse_smiles("C[N+](=O)[O-]").unwrap();
        assert_eq!(nitro.neutralized(), nitro);
    }

    #[test]
    fn equality_is_structural() {
        let a = parse_smiles("OCC").unwrap();
        let b = parse_smiles("CCO").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, parse_smiles("COC").unwrap());
    }
}
