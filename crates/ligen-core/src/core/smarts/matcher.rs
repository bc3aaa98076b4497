use super::SmartsPattern;
use crate::core::models::molecule::Molecule;
use std::collections::HashSet;

const UNMAPPED: usize = usize::MAX;

/// Backtracking subgraph matcher for a [`SmartsPattern`] against a [`Molecule`].
///
/// A match is a vector indexed by query atom holding the matched molecule atom.
/// Query atoms are visited in depth-first order so that every atom after the first of
/// its component is constrained to the neighbours of an already-mapped atom.
pub struct SubstructureMatcher<'a> {
    pattern: &'a SmartsPattern,
    molecule: &'a Molecule,
    order: Vec<(usize, Option<usize>)>,
}

impl<'a> SubstructureMatcher<'a> {
    pub fn new(pattern: &'a SmartsPattern, molecule: &'a Molecule) -> Self {
        let count = pattern.atom_count();
        let mut order = Vec::with_capacity(count);
        let mut visited = vec![false; count];
        for root in 0..count {
            if visited[root] {
                continue;
            }
            visited[root] = true;
            let mut stack = vec![(root, None)];
            while let Some((atom, parent)) = stack.pop() {
                order.push((atom, parent));
                for &(neighbor, _) in pattern.neighbors(atom).iter().rev() {
                    if !visited[neighbor] {
                        visited[neighbor] = true;
                        stack.push((neighbor, Some(atom)));
                    }
                }
            }
        }
        Self {
            pattern,
            molecule,
            order,
        }
    }

    pub fn is_match(&self) -> bool {
        self.find_first().is_some()
    }

    pub fn find_first(&self) -> Option<Vec<usize>> {
        let mut results = Vec::new();
        self.run(false, Some(1), &mut results);
        results.pop()
    }

    /// Every mapping of the query onto the molecule. With `unique`, mappings that
    /// cover the same set of molecule atoms are reported once.
    pub fn find_all(&self, unique: bool) -> Vec<Vec<usize>> {
        let mut results = Vec::new();
        self.run(unique, None, &mut results);
        results
    }

    fn run(&self, unique: bool, limit: Option<usize>, results: &mut Vec<Vec<usize>>) {
        if self.pattern.atom_count() == 0 || self.pattern.atom_count() > self.molecule.atom_count()
        {
            return;
        }
        let mut state = SearchState {
            mapping: vec![UNMAPPED; self.pattern.atom_count()],
            used: vec![false; self.molecule.atom_count()],
            seen: HashSet::new(),
            unique,
            limit,
        };
        self.extend(0, &mut state, results);
    }

    /// Returns `true` when the search should stop.
    fn extend(&self, depth: usize, state: &mut SearchState, results: &mut Vec<Vec<usize>>) -> bool {
        if depth == self.order.len() {
            if state.unique {
                let mut key = state.mapping.clone();
                key.sort_unstable();
                if !state.seen.insert(key) {
                    return false;
                }
            }
            results.push(state.mapping.clone());
            return state.limit.is_some_and(|l| results.len() >= l);
        }

        let (query_atom, parent) = self.order[depth];
        let candidates: Vec<usize> = match parent {
            Some(parent) => self
                .molecule
                .neighbors(state.mapping[parent])
                .iter()
                .map(|&(n, _)| n)
                .collect(),
            None => (0..self.molecule.atom_count()).collect(),
        };

        for candidate in candidates {
            if state.used[candidate] || !self.compatible(query_atom, candidate, &state.mapping) {
                continue;
            }
            state.mapping[query_atom] = candidate;
            state.used[candidate] = true;
            if self.extend(depth + 1, state, results) {
                return true;
            }
            state.mapping[query_atom] = UNMAPPED;
            state.used[candidate] = false;
        }
        false
    }

    fn compatible(&self, query_atom: usize, candidate: usize, mapping: &[usize]) -> bool {
        if !self.pattern.atoms()[query_atom]
            .expr
            .matches(self.molecule, candidate)
        {
            return false;
        }
        self.pattern
            .neighbors(query_atom)
            .iter()
            .filter(|&&(q, _)| mapping[q] != UNMAPPED)
            .all(|&(q, query_bond)| {
                self.molecule
                    .bond_index_between(candidate, mapping[q])
                    .is_some_and(|bond| {
                        self.pattern.bonds()[query_bond]
                            .expr
                            .matches(self.molecule, bond)
                    })
            })
    }
}

struct SearchState {
    mapping: Vec<usize>,
    used: Vec<bool>,
    seen: HashSet<Vec<usize>>,
    unique: bool,
    limit: Option<usize>,
}
