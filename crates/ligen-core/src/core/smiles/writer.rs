use crate::core::models::atom::implicit_hydrogens;
use crate::core::models::element::Element;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use std::collections::BTreeSet;

/// Writes the canonical SMILES of a molecule.
///
/// Atoms are ranked by iterative refinement of local invariants with deterministic
/// tie breaking; each component is then written depth-first from its lowest-ranked
/// atom, visiting neighbours in rank order. Components are sorted lexically.
pub fn write_canonical(molecule: &Molecule) -> String {
    let ranks = canonical_ranks(molecule);
    let mut parts: Vec<String> = molecule
        .components()
        .iter()
        .map(|component| write_component(molecule, &ranks, component))
        .collect();
    parts.sort();
    parts.join(".")
}

fn bond_code(order: BondOrder) -> u8 {
    match order {
        BondOrder::Single => 1,
        BondOrder::Double => 2,
        BondOrder::Triple => 3,
        BondOrder::Aromatic => 4,
    }
}

/// Dense ranks: atoms with equal keys share a rank, ranks start at zero.
fn rank_by<T: Ord>(keys: &[T]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    let mut ranks = vec![0; keys.len()];
    let mut current = 0;
    for window in 0..order.len() {
        if window > 0 && keys[order[window]] != keys[order[window - 1]] {
            current += 1;
        }
        ranks[order[window]] = current;
    }
    ranks
}

fn class_count(ranks: &[usize]) -> usize {
    ranks.iter().collect::<BTreeSet<_>>().len()
}

fn refine(molecule: &Molecule, mut ranks: Vec<usize>) -> Vec<usize> {
    loop {
        let keys: Vec<(usize, Vec<(usize, u8)>)> = (0..molecule.atom_count())
            .map(|atom| {
                let mut neighborhood: Vec<(usize, u8)> = molecule
                    .neighbors(atom)
                    .iter()
                    .map(|&(n, b)| (ranks[n], bond_code(molecule.bond(b).order)))
                    .collect();
                neighborhood.sort_unstable();
                (ranks[atom], neighborhood)
            })
            .collect();
        let refined = rank_by(&keys);
        if class_count(&refined) == class_count(&ranks) {
            return refined;
        }
        ranks = refined;
    }
}

pub(crate) fn canonical_ranks(molecule: &Molecule) -> Vec<usize> {
    let count = molecule.atom_count();
    let invariants: Vec<_> = (0..count)
        .map(|i| {
            let atom = molecule.atom(i);
            (
                molecule.degree(i),
                atom.element.atomic_number(),
                atom.isotope.unwrap_or(0),
                atom.charge,
                atom.hydrogens,
                atom.aromatic,
                molecule.is_ring_atom(i),
            )
        })
        .collect();
    let mut ranks = refine(molecule, rank_by(&invariants));

    while class_count(&ranks) < count {
        let mut seen = vec![false; count];
        let mut tied = None;
        for &rank in &ranks {
            if seen[rank] {
                tied = Some(tied.map_or(rank, |t: usize| t.min(rank)));
            }
            seen[rank] = true;
        }
        let Some(tied) = tied else { break };
        let chosen = ranks.iter().position(|&r| r == tied).unwrap_or(0);
        let broken: Vec<usize> = ranks
            .iter()
            .enumerate()
            .map(|(i, &r)| if r == tied && i != chosen { 2 * r + 1 } else { 2 * r })
            .collect();
        ranks = refine(molecule, rank_by(&broken));
    }
    ranks
}

struct Closure {
    opener: usize,
    closer: usize,
    bond: usize,
}

struct Walk<'a> {
    molecule: &'a Molecule,
    ranks: &'a [usize],
    visited: Vec<bool>,
    children: Vec<Vec<(usize, usize)>>,
    closures: Vec<Closure>,
    closed_bonds: Vec<bool>,
}

impl Walk<'_> {
    fn visit(&mut self, atom: usize, via: Option<usize>) {
        self.visited[atom] = true;
        let mut neighbors: Vec<(usize, usize)> = self
            .molecule
            .neighbors(atom)
            .iter()
            .copied()
            .filter(|&(_, bond)| Some(bond) != via)
            .collect();
        neighbors.sort_by_key(|&(n, _)| self.ranks[n]);
        for (neighbor, bond) in neighbors {
            if self.visited[neighbor] {
                if !self.closed_bonds[bond] {
                    self.closed_bonds[bond] = true;
                    self.closures.push(Closure {
                        opener: neighbor,
                        closer: atom,
                        bond,
                    });
                }
            } else {
                self.closed_bonds[bond] = true;
                self.children[atom].push((neighbor, bond));
                self.visit(neighbor, Some(bond));
            }
        }
    }
}

struct Emitter<'a> {
    molecule: &'a Molecule,
    ranks: &'a [usize],
    children: &'a [Vec<(usize, usize)>],
    closures: &'a [Closure],
    digits: Vec<Option<u16>>,
    in_use: BTreeSet<u16>,
    out: String,
}

impl Emitter<'_> {
    fn emit(&mut self, atom: usize) {
        self.out.push_str(&atom_token(self.molecule, atom));

        let mut closing: Vec<usize> = (0..self.closures.len())
            .filter(|&c| self.closures[c].closer == atom)
            .collect();
        closing.sort_by_key(|&c| self.digits[c]);
        let mut opening: Vec<usize> = (0..self.closures.len())
            .filter(|&c| self.closures[c].opener == atom)
            .collect();
        opening.sort_by_key(|&c| self.ranks[self.closures[c].closer]);

        let mut released = Vec::new();
        for &c in &closing {
            if let Some(digit) = self.digits[c] {
                push_ring_digit(&mut self.out, digit);
                released.push(digit);
            }
        }
        for &c in &opening {
            let digit = (1..).find(|d| !self.in_use.contains(d)).unwrap_or(1);
            self.in_use.insert(digit);
            self.digits[c] = Some(digit);
            self.out
                .push_str(bond_symbol(self.molecule, self.closures[c].bond));
            push_ring_digit(&mut self.out, digit);
        }
        for digit in released {
            self.in_use.remove(&digit);
        }

        let children = self.children;
        let children = &children[atom];
        for (position, &(child, bond)) in children.iter().enumerate() {
            let last = position + 1 == children.len();
            if !last {
                self.out.push('(');
            }
            self.out.push_str(bond_symbol(self.molecule, bond));
            self.emit(child);
            if !last {
                self.out.push(')');
            }
        }
    }
}

fn push_ring_digit(out: &mut String, digit: u16) {
    if digit < 10 {
        out.push_str(&digit.to_string());
    } else {
        out.push_str(&format!("%{digit:02}"));
    }
}

fn write_component(molecule: &Molecule, ranks: &[usize], component: &[usize]) -> String {
    let Some(&start) = component.iter().min_by_key(|&&a| ranks[a]) else {
        return String::new();
    };
    let mut walk = Walk {
        molecule,
        ranks,
        visited: vec![false; molecule.atom_count()],
        children: vec![Vec::new(); molecule.atom_count()],
        closures: Vec::new(),
        closed_bonds: vec![false; molecule.bond_count()],
    };
    walk.visit(start, None);

    let mut emitter = Emitter {
        molecule,
        ranks,
        children: &walk.children,
        closures: &walk.closures,
        digits: vec![None; walk.closures.len()],
        in_use: BTreeSet::new(),
        out: String::new(),
    };
    emitter.emit(start);
    emitter.out
}

fn bond_symbol(molecule: &Molecule, bond: usize) -> &'static str {
    let bond = molecule.bond(bond);
    let both_aromatic = molecule.atom(bond.atom1).aromatic && molecule.atom(bond.atom2).aromatic;
    match bond.order {
        BondOrder::Single if both_aromatic => "-",
        BondOrder::Single => "",
        BondOrder::Double => "=",
        BondOrder::Triple => "#",
        BondOrder::Aromatic if both_aromatic => "",
        BondOrder::Aromatic => ":",
    }
}

fn atom_token(molecule: &Molecule, index: usize) -> String {
    let atom = molecule.atom(index);
    let symbol = if atom.aromatic {
        atom.element.symbol().to_lowercase()
    } else {
        atom.element.symbol().to_string()
    };

    let expected_h = if atom.element == Element::WILDCARD {
        Some(0)
    } else {
        implicit_hydrogens(atom.element, 0, atom.aromatic, molecule.bond_valence(index))
    };
    let bare = atom.element.is_organic_subset()
        && atom.charge == 0
        && atom.isotope.is_none()
        && atom.map_class.is_none()
        && expected_h == Some(atom.hydrogens);
    if bare {
        return symbol;
    }

    let mut token = String::from("[");
    if let Some(isotope) = atom.isotope {
        token.push_str(&isotope.to_string());
    }
    token.push_str(&symbol);
    match atom.hydrogens {
        0 => {}
        1 => token.push('H'),
        n => token.push_str(&format!("H{n}")),
    }
    match atom.charge {
        0 => {}
        1 => token.push('+'),
        -1 => token.push('-'),
        c if c > 0 => token.push_str(&format!("+{c}")),
        c => token.push_str(&format!("-{}", -c)),
    }
    if let Some(map) = atom.map_class {
        token.push_str(&format!(":{map}"));
    }
    token.push(']');
    token
}
