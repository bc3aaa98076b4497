use crate::core::models::molecule::Molecule;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// A common substructure of two molecules as `(atom in A, atom in B)` pairs.
#[derive(Debug, Clone, Default)]
pub struct McsResult {
    pub pairs: Vec<(usize, usize)>,
    /// False when the time budget ran out before the search space was exhausted.
    pub complete: bool,
}

impl McsResult {
    pub fn atom_count(&self) -> usize {
        self.pairs.len()
    }
}

/// Finds the largest connected, induced common substructure of `a` and `b`.
///
/// Atoms are compatible when element and aromaticity agree; bonds when order and ring
/// membership agree. The budget is soft: once it is spent the best mapping found so
/// far is returned with `complete` unset.
pub fn find_mcs(a: &Molecule, b: &Molecule, budget: Duration) -> McsResult {
    let mut search = Search::new(a, b, Instant::now().checked_add(budget));
    search.run();
    McsResult {
        pairs: search.best,
        complete: !search.timed_out,
    }
}

type Label = (u8, bool);

fn label(molecule: &Molecule, atom: usize) -> Label {
    let atom = molecule.atom(atom);
    (atom.element.atomic_number(), atom.aromatic)
}

struct Search<'m> {
    a: &'m Molecule,
    b: &'m Molecule,
    deadline: Option<Instant>,
    nodes: u64,
    timed_out: bool,
    map_a: Vec<Option<usize>>,
    map_b: Vec<Option<usize>>,
    excluded: Vec<bool>,
    order: Vec<(usize, usize)>,
    best: Vec<(usize, usize)>,
}

impl<'m> Search<'m> {
    fn new(a: &'m Molecule, b: &'m Molecule, deadline: Option<Instant>) -> Self {
        Self {
            a,
            b,
            deadline,
            nodes: 0,
            timed_out: false,
            map_a: vec![None; a.atom_count()],
            map_b: vec![None; b.atom_count()],
            excluded: vec![false; a.atom_count()],
            order: Vec::new(),
            best: Vec::new(),
        }
    }

    fn run(&mut self) {
        for root_a in 0..self.a.atom_count() {
            for root_b in 0..self.b.atom_count() {
                if self.timed_out {
                    return;
                }
                if label(self.a, root_a) != label(self.b, root_b) {
                    continue;
                }
                self.push(root_a, root_b);
                self.extend();
                self.pop();
            }
            // Every subgraph containing this root has now been explored.
            self.excluded[root_a] = true;
        }
    }

    fn push(&mut self, a: usize, b: usize) {
        self.map_a[a] = Some(b);
        self.map_b[b] = Some(a);
        self.order.push((a, b));
        if self.order.len() > self.best.len() {
            self.best = self.order.clone();
        }
    }

    fn pop(&mut self) {
        if let Some((a, b)) = self.order.pop() {
            self.map_a[a] = None;
            self.map_b[b] = None;
        }
    }

    fn tick(&mut self) -> bool {
        self.nodes += 1;
        if self.nodes % DEADLINE_CHECK_INTERVAL == 0
            && self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
        {
            self.timed_out = true;
        }
        self.timed_out
    }

    fn extend(&mut self) {
        if self.tick() || self.order.len() + self.upper_bound() <= self.best.len() {
            return;
        }
        let Some(next) = self.next_frontier_atom() else {
            return;
        };

        for candidate in self.candidates_for(next) {
            self.push(next, candidate);
            self.extend();
            self.pop();
            if self.timed_out {
                return;
            }
        }

        self.excluded[next] = true;
        self.extend();
        self.excluded[next] = false;
    }

    /// Lowest-index unmapped, non-excluded atom of A adjacent to the current mapping.
    fn next_frontier_atom(&self) -> Option<usize> {
        self.order
            .iter()
            .flat_map(|&(mapped, _)| self.a.neighbors(mapped).iter().map(|&(n, _)| n))
            .filter(|&n| self.map_a[n].is_none() && !self.excluded[n])
            .min()
    }

    fn candidates_for(&self, atom_a: usize) -> Vec<usize> {
        let mut candidates: Vec<usize> = self
            .a
            .neighbors(atom_a)
            .iter()
            .filter_map(|&(n, _)| self.map_a[n])
            .flat_map(|mapped_b| self.b.neighbors(mapped_b).iter().map(|&(n, _)| n))
            .filter(|&atom_b| self.map_b[atom_b].is_none())
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates.retain(|&atom_b| self.is_compatible(atom_a, atom_b));
        candidates
    }

    /// Induced check: every mapped pair is bonded in A exactly when it is bonded in B,
    /// with compatible bonds.
    fn is_compatible(&self, atom_a: usize, atom_b: usize) -> bool {
        if label(self.a, atom_a) != label(self.b, atom_b) {
            return false;
        }
        self.order.iter().all(|&(mapped_a, mapped_b)| {
            match (
                self.a.bond_index_between(atom_a, mapped_a),
                self.b.bond_index_between(atom_b, mapped_b),
            ) {
                (None, None) => true,
                (Some(bond_a), Some(bond_b)) => {
                    self.a.bond(bond_a).order == self.b.bond(bond_b).order
                        && self.a.is_ring_bond(bond_a) == self.b.is_ring_bond(bond_b)
                }
                _ => false,
            }
        })
    }

    /// How many more pairs could be added at most, by label counts.
    fn upper_bound(&self) -> usize {
        let mut remaining: HashMap<Label, (usize, usize)> = HashMap::new();
        for atom in 0..self.a.atom_count() {
            if self.map_a[atom].is_none() && !self.excluded[atom] {
                remaining.entry(label(self.a, atom)).or_default().0 += 1;
            }
        }
        for atom in 0..self.b.atom_count() {
            if self.map_b[atom].is_none() {
                remaining.entry(label(self.b, atom)).or_default().1 += 1;
            }
        }
        remaining.values().map(|&(x, y)| x.min(y)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::smiles::parse_smiles;

    fn mcs_size(a: &str, b: &str) -> usize {
        let a = parse_smiles(a).unwrap();
        let b = parse_smiles(b).unwrap();
        let result = find_mcs(&a, &b, Duration::from_secs(10));
        assert!(result.complete);
        result.atom_count()
    }

    #[test]
    fn identical_molecules_map_completely() {
        assert_eq!(mcs_size("CC(=O)Oc1ccccc1C(=O)O", "CC(=O)Oc1ccccc1C(=O)O"), 13);
    }

    #[test]
    fn shared_benzoic_acid_core_is_found() {
        // Benzoic acid (9 heavy atoms) is common to both.
        assert_eq!(mcs_size("OC(=O)c1ccc(CC)cc1", "OC(=O)c1ccc(OC)cc1"), 9);
    }

    #[test]
    fn bond_order_and_ring_membership_must_agree() {
        // Propene versus propane: only a C-C single bond is shared.
        assert_eq!(mcs_size("C=CC", "CCC"), 2);
        // Ring carbons of cyclohexane cannot map onto a hexane chain through ring bonds.
        assert_eq!(mcs_size("C1CCCCC1", "CCCCCC"), 1);
    }

    #[test]
    fn aromatic_and_aliphatic_atoms_do_not_match() {
        assert_eq!(mcs_size("c1ccccc1", "C1CCCCC1"), 0);
    }

    #[test]
    fn mapping_is_connected_and_induced() {
        let a = parse_smiles("CCOCC").unwrap();
        let b = parse_smiles("CCOC(C)CCC").unwrap();
        let result = find_mcs(&a, &b, Duration::from_secs(10));
        assert_eq!(result.atom_count(), 5);
        for &(x, y) in &result.pairs {
            for &(u, v) in &result.pairs {
                assert_eq!(
                    a.bond_between(x, u).is_some(),
                    b.bond_between(y, v).is_some()
                );
            }
        }
    }

    #[test]
    fn zero_budget_returns_a_partial_result() {
        let a = parse_smiles("c1ccc2ccccc2c1CCCCCCCCCC").unwrap();
        let b = parse_smiles("c1ccc2ccccc2c1CCCCCCCCCO").unwrap();
        let result = find_mcs(&a, &b, Duration::ZERO);
        assert!(result.atom_count() >= 1);
    }
}
