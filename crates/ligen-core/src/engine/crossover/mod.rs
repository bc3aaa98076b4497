//! MCS-based recombination of two parent molecules.
//!
//! The child keeps parent A's maximum-common-substructure scaffold and draws each group
//! of decorations (substituents hanging off the scaffold) from one of the two parents.

pub mod mcs;

use crate::core::models::atom::Atom;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::Bond;
use crate::engine::config::CrossoverConfig;
use crate::engine::state::AttemptFailure;
use mcs::{McsResult, find_mcs};
use rand::Rng;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
pub struct CrossoverParams {
    pub min_atom_match: usize,
    pub prescreen_budget: Duration,
    pub thorough_budget: Duration,
}

impl From<&CrossoverConfig> for CrossoverParams {
    fn from(config: &CrossoverConfig) -> Self {
        Self {
            min_atom_match: config.min_atom_match_mcs,
            prescreen_budget: config.max_time_mcs_prescreen,
            thorough_budget: config.max_time_mcs_thorough,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrossoverProduct {
    pub molecule: Molecule,
    pub mcs_atoms: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    A,
    B,
}

/// A connected group of non-scaffold atoms of one parent.
#[derive(Debug)]
struct Decoration {
    parent: Parent,
    atoms: Vec<usize>,
    /// Scaffold atoms it is bonded to, as indices into parent A.
    attachments: Vec<usize>,
}

pub fn crossover<R: Rng + ?Sized>(
    parent_a: &Molecule,
    parent_b: &Molecule,
    params: &CrossoverParams,
    rng: &mut R,
) -> Result<CrossoverProduct, AttemptFailure> {
    let prescreen = find_mcs(parent_a, parent_b, params.prescreen_budget);
    if prescreen.atom_count() < params.min_atom_match {
        return Err(AttemptFailure::NoCommonScaffold);
    }
    let common = if prescreen.complete {
        prescreen
    } else {
        let thorough = find_mcs(parent_a, parent_b, params.thorough_budget);
        if thorough.atom_count() > prescreen.atom_count() {
            thorough
        } else {
            prescreen
        }
    };
    trace!(
        mcs_atoms = common.atom_count(),
        complete = common.complete,
        "Common scaffold found"
    );
    if common.atom_count() < params.min_atom_match {
        return Err(AttemptFailure::NoCommonScaffold);
    }

    let molecule = recombine(parent_a, parent_b, &common, rng)?;
    if molecule.canonical_smiles() == parent_a.canonical_smiles()
        || molecule.canonical_smiles() == parent_b.canonical_smiles()
    {
        return Err(AttemptFailure::IdenticalToParent);
    }
    Ok(CrossoverProduct {
        molecule,
        mcs_atoms: common.atom_count(),
    })
}

fn recombine<R: Rng + ?Sized>(
    a: &Molecule,
    b: &Molecule,
    common: &McsResult,
    rng: &mut R,
) -> Result<Molecule, AttemptFailure> {
    // Both parents mapped onto parent A's scaffold numbering.
    let mut a_to_scaffold = vec![None; a.atom_count()];
    let mut b_to_scaffold = vec![None; b.atom_count()];
    for &(atom_a, atom_b) in &common.pairs {
        a_to_scaffold[atom_a] = Some(atom_a);
        b_to_scaffold[atom_b] = Some(atom_a);
    }
    let core_a: Vec<bool> = a_to_scaffold.iter().map(Option::is_some).collect();

    let mut decorations = decorations_of(a, Parent::A, &a_to_scaffold);
    decorations.extend(decorations_of(b, Parent::B, &b_to_scaffold));

    let units = group_into_units(a.atom_count(), &decorations);
    let mut choices: Vec<Parent> = units
        .iter()
        .map(|_| if rng.r#gen::<bool>() { Parent::A } else { Parent::B })
        .collect();
    if choices.len() > 1 && choices.iter().all(|&c| c == choices[0]) {
        let flip = rng.gen_range(0..choices.len());
        choices[flip] = match choices[flip] {
            Parent::A => Parent::B,
            Parent::B => Parent::A,
        };
    }

    // Scaffold first, in parent A numbering order.
    let mut atoms: Vec<Atom> = Vec::new();
    let mut bonds: Vec<Bond> = Vec::new();
    let mut scaffold_index = vec![usize::MAX; a.atom_count()];
    for (atom, _) in core_a.iter().enumerate().filter(|&(_, &in_core)| in_core) {
        scaffold_index[atom] = atoms.len();
        let mut copy = *a.atom(atom);
        copy.map_class = None;
        atoms.push(copy);
    }
    for bond in a.bonds() {
        if core_a[bond.atom1] && core_a[bond.atom2] {
            bonds.push(Bond::new(
                scaffold_index[bond.atom1],
                scaffold_index[bond.atom2],
                bond.order,
            ));
        }
    }

    for (unit, &choice) in units.iter().zip(&choices) {
        for decoration in unit.iter().map(|&d| &decorations[d]) {
            if decoration.parent != choice {
                continue;
            }
            let (source, to_scaffold) = match choice {
                Parent::A => (a, &a_to_scaffold),
                Parent::B => (b, &b_to_scaffold),
            };
            graft(source, decoration, to_scaffold, &scaffold_index, &mut atoms, &mut bonds);
        }
    }

    // Scaffold atoms keep their total valence: hydrogens absorb the change in bonding.
    let mut bond_valence = vec![0u8; atoms.len()];
    for bond in &bonds {
        bond_valence[bond.atom1] += bond.order.valence_contribution();
        bond_valence[bond.atom2] += bond.order.valence_contribution();
    }
    for (atom, _) in core_a.iter().enumerate().filter(|&(_, &in_core)| in_core) {
        let index = scaffold_index[atom];
        let total = i16::from(a.atom(atom).hydrogens) + i16::from(a.bond_valence(atom));
        let hydrogens = total - i16::from(bond_valence[index]);
        atoms[index].hydrogens =
            u8::try_from(hydrogens).map_err(|_| AttemptFailure::MalformedProduct)?;
    }

    Molecule::from_parts(atoms, bonds).map_err(|_| AttemptFailure::MalformedProduct)
}

/// Connected components of the non-core atoms of `molecule` that touch the core.
fn decorations_of(
    molecule: &Molecule,
    parent: Parent,
    to_scaffold: &[Option<usize>],
) -> Vec<Decoration> {
    let mut visited: Vec<bool> = to_scaffold.iter().map(Option::is_some).collect();
    let mut decorations = Vec::new();
    for start in 0..molecule.atom_count() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut atoms = vec![start];
        let mut attachments = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(atom) = queue.pop_front() {
            for &(neighbor, _) in molecule.neighbors(atom) {
                if let Some(scaffold) = to_scaffold[neighbor] {
                    attachments.push(scaffold);
                } else if !visited[neighbor] {
                    visited[neighbor] = true;
                    atoms.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        attachments.sort_unstable();
        attachments.dedup();
        if !attachments.is_empty() {
            decorations.push(Decoration {
                parent,
                atoms,
                attachments,
            });
        }
    }
    decorations
}

/// Groups decorations whose attachment points overlap, so a ring closed through the
/// scaffold is never assembled from two different parents.
fn group_into_units(scaffold_size: usize, decorations: &[Decoration]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..scaffold_size).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }
    for decoration in decorations {
        let first = decoration.attachments[0];
        for &other in &decoration.attachments[1..] {
            let (ra, rb) = (find(&mut parent, first), find(&mut parent, other));
            if ra != rb {
                parent[rb] = ra;
            }
        }
    }
    let mut units: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, decoration) in decorations.iter().enumerate() {
        let root = find(&mut parent, decoration.attachments[0]);
        units.entry(root).or_default().push(index);
    }
    units.into_values().collect()
}

fn graft(
    source: &Molecule,
    decoration: &Decoration,
    to_scaffold: &[Option<usize>],
    scaffold_index: &[usize],
    atoms: &mut Vec<Atom>,
    bonds: &mut Vec<Bond>,
) {
    let mut local = vec![usize::MAX; source.atom_count()];
    for &atom in &decoration.atoms {
        local[atom] = atoms.len();
        let mut copy = *source.atom(atom);
        copy.map_class = None;
        atoms.push(copy);
    }
    for bond in source.bonds() {
        let (x, y) = (bond.atom1, bond.atom2);
        let end = |atom: usize| {
            if local[atom] != usize::MAX {
                Some(local[atom])
            } else {
                to_scaffold[atom].map(|scaffold| scaffold_index[scaffold])
            }
        };
        let touches = local[x] != usize::MAX || local[y] != usize::MAX;
        if let (true, Some(i), Some(j)) = (touches, end(x), end(y)) {
            bonds.push(Bond::new(i, j, bond.order));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::smiles::parse_smiles;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn params(min_atom_match: usize) -> CrossoverParams {
        CrossoverParams {
            min_atom_match,
            prescreen_budget: Duration::from_secs(5),
            thorough_budget: Duration::from_secs(5),
        }
    }

    #[test]
    fn children_differ_from_both_parents_and_keep_the_scaffold() {
        let a = parse_smiles("OC(=O)c1ccc(Cl)cc1CC").unwrap();
        let b = parse_smiles("OC(=O)c1ccc(Br)cc1OC").unwrap();
        let scaffold = crate::core::smarts::SmartsPattern::parse("OC(=O)c1ccccc1").unwrap();
        let mut successes = 0;
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            match crossover(&a, &b, &params(4), &mut rng) {
                Ok(child) => {
                    successes += 1;
                    assert_eq!(child.mcs_atoms, 9);
                    assert_ne!(child.molecule.canonical_smiles(), a.canonical_smiles());
                    assert_ne!(child.molecule.canonical_smiles(), b.canonical_smiles());
                    assert!(scaffold.matches(&child.molecule));
                }
                Err(failure) => assert_eq!(failure, AttemptFailure::IdenticalToParent),
            }
        }
        assert!(successes > 0);
    }

    #[test]
    fn small_common_scaffold_is_rejected() {
        let a = parse_smiles("CCCCCCCC").unwrap();
        let b = parse_smiles("c1ccncc1").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            crossover(&a, &b, &params(3), &mut rng).unwrap_err(),
            AttemptFailure::NoCommonScaffold
        );
    }

    #[test]
    fn single_unit_child_identical_to_a_parent_is_rejected() {
        // Only the para position differs: every child reproduces one of the parents.
        let a = parse_smiles("OC(=O)c1ccc(Cl)cc1").unwrap();
        let b = parse_smiles("OC(=O)c1ccc(Br)cc1").unwrap();
        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(
                crossover(&a, &b, &params(4), &mut rng).unwrap_err(),
                AttemptFailure::IdenticalToParent
            );
        }
    }

    #[test]
    fn scaffold_hydrogens_follow_the_new_substitution() {
        // Para position is substituted in A only, the meta position in B only.
        let a = parse_smiles("OC(=O)c1ccc(C)cc1").unwrap();
        let b = parse_smiles("OC(=O)c1cccc(N)c1").unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let child = crossover(&a, &b, &params(4), &mut rng).unwrap();
        let smiles = child.molecule.canonical_smiles().to_string();
        let candidates: Vec<String> = ["OC(=O)c1ccccc1", "OC(=O)c1ccc(C)c(N)c1"]
            .iter()
            .map(|s| parse_smiles(s).unwrap().canonical_smiles().to_string())
            .collect();
        assert!(candidates.contains(&smiles), "unexpected child {smiles}");
    }
}
