use super::SmilesError;
use crate::core::models::atom::{Atom, implicit_hydrogens};
use crate::core::models::element::Element;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::{Bond, BondOrder};
use std::collections::BTreeMap;

/// Parses a SMILES string into a sanitized molecule.
///
/// Unbracketed atoms receive implicit hydrogens from their default valence; bracket
/// atoms carry exactly the hydrogens written. Plain `[H]` atoms bonded to a single heavy
/// atom are folded into that atom's hydrogen count.
pub fn parse_smiles(input: &str) -> Result<Molecule, SmilesError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SmilesError::Empty);
    }
    Parser::new(input).parse()
}

struct RingOpening {
    atom: usize,
    order: Option<BondOrder>,
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    atoms: Vec<Atom>,
    bracketed: Vec<bool>,
    bonds: Vec<Bond>,
    branches: Vec<Option<usize>>,
    previous: Option<usize>,
    pending_bond: Option<(BondOrder, usize)>,
    rings: BTreeMap<u16, RingOpening>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bracketed: Vec::new(),
            bonds: Vec::new(),
            branches: Vec::new(),
            previous: None,
            pending_bond: None,
            rings: BTreeMap::new(),
        }
    }

    fn parse(mut self) -> Result<Molecule, SmilesError> {
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            match c {
                b'(' => {
                    if self.previous.is_none() {
                        return Err(self.unexpected());
                    }
                    self.branches.push(self.previous);
                    self.pos += 1;
                }
                b')' => {
                    let restored = self.branches.pop().ok_or(SmilesError::UnbalancedBranch)?;
                    if let Some((_, pos)) = self.pending_bond {
                        return Err(SmilesError::DanglingBond(pos));
                    }
                    self.previous = restored;
                    self.pos += 1;
                }
                b'.' => {
                    if let Some((_, pos)) = self.pending_bond {
                        return Err(SmilesError::DanglingBond(pos));
                    }
                    self.previous = None;
                    self.pos += 1;
                }
                b'-' | b'=' | b'#' | b':' | b'/' | b'\\' => {
                    if self.pending_bond.is_some() {
                        return Err(self.unexpected());
                    }
                    let order = match c {
                        b'=' => BondOrder::Double,
                        b'#' => BondOrder::Triple,
                        b':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    };
                    self.pending_bond = Some((order, self.pos));
                    self.pos += 1;
                }
                b'0'..=b'9' => {
                    let number = (c - b'0') as u16;
                    self.pos += 1;
                    self.ring_bond(number)?;
                }
                b'%' => {
                    let digits = self.bytes.get(self.pos + 1..self.pos + 3);
                    let number = match digits {
                        Some([a, b]) if a.is_ascii_digit() && b.is_ascii_digit() => {
                            ((a - b'0') * 10 + (b - b'0')) as u16
                        }
                        _ => return Err(self.unexpected()),
                    };
                    self.pos += 3;
                    self.ring_bond(number)?;
                }
                b'[' => {
                    let atom = self.bracket_atom()?;
                    self.add_atom(atom, true)?;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.add_atom(atom, false)?;
                }
            }
        }

        if !self.branches.is_empty() {
            return Err(SmilesError::UnbalancedBranch);
        }
        if let Some((&number, _)) = self.rings.iter().next() {
            return Err(SmilesError::UnclosedRing(number));
        }
        if let Some((_, pos)) = self.pending_bond {
            return Err(SmilesError::DanglingBond(pos));
        }
        self.finish()
    }

    fn unexpected(&self) -> SmilesError {
        let ch = self.input[self.pos..].chars().next().unwrap_or('\0');
        SmilesError::UnexpectedCharacter { ch, pos: self.pos }
    }

    fn implicit_order(&self, a: usize, b: usize) -> BondOrder {
        if self.atoms[a].aromatic && self.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn add_atom(&mut self, atom: Atom, bracketed: bool) -> Result<(), SmilesError> {
        let index = self.atoms.len();
        self.atoms.push(atom);
        self.bracketed.push(bracketed);
        match (self.previous, self.pending_bond.take()) {
            (Some(previous), explicit) => {
                let order = explicit
                    .map(|(order, _)| order)
                    .unwrap_or_else(|| self.implicit_order(previous, index));
                self.bonds.push(Bond::new(previous, index, order));
            }
            (None, Some((_, pos))) => return Err(SmilesError::DanglingBond(pos)),
            (None, None) => {}
        }
        self.previous = Some(index);
        Ok(())
    }

    fn ring_bond(&mut self, number: u16) -> Result<(), SmilesError> {
        let current = self.previous.ok_or(SmilesError::InvalidRingClosure(number))?;
        let explicit = self.pending_bond.take().map(|(order, _)| order);
        match self.rings.remove(&number) {
            Some(opening) => {
                if opening.atom == current
                    || self.bonds.iter().any(|b| b.contains(opening.atom) && b.contains(current))
                {
                    return Err(SmilesError::InvalidRingClosure(number));
                }
                let order = match (opening.order, explicit) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(SmilesError::InvalidRingClosure(number));
                    }
                    (a, b) => a.or(b),
                };
                let order = order.unwrap_or_else(|| self.implicit_order(opening.atom, current));
                self.bonds.push(Bond::new(opening.atom, current, order));
            }
            None => {
                self.rings.insert(
                    number,
                    RingOpening {
                        atom: current,
                        order: explicit,
                    },
                );
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom, SmilesError> {
        let c = self.bytes[self.pos];
        let next = self.bytes.get(self.pos + 1).copied();
        let (element, aromatic, width) = match (c, next) {
            (b'B', Some(b'r')) => (Element::BROMINE, false, 2),
            (b'C', Some(b'l')) => (Element::CHLORINE, false, 2),
            (b'B', _) => (Element::BORON, false, 1),
            (b'C', _) => (Element::CARBON, false, 1),
            (b'N', _) => (Element::NITROGEN, false, 1),
            (b'O', _) => (Element::OXYGEN, false, 1),
            (b'P', _) => (Element::PHOSPHORUS, false, 1),
            (b'S', _) => (Element::SULFUR, false, 1),
            (b'F', _) => (Element::FLUORINE, false, 1),
            (b'I', _) => (Element::IODINE, false, 1),
            (b'b', _) => (Element::BORON, true, 1),
            (b'c', _) => (Element::CARBON, true, 1),
            (b'n', _) => (Element::NITROGEN, true, 1),
            (b'o', _) => (Element::OXYGEN, true, 1),
            (b'p', _) => (Element::PHOSPHORUS, true, 1),
            (b's', _) => (Element::SULFUR, true, 1),
            (b'*', _) => (Element::WILDCARD, false, 1),
            (c, _) if c.is_ascii_alphabetic() => {
                return Err(SmilesError::UnknownElement {
                    symbol: (c as char).to_string(),
                    pos: self.pos,
                });
            }
            _ => return Err(self.unexpected()),
        };
        self.pos += width;
        Ok(Atom {
            aromatic,
            ..Atom::new(element)
        })
    }

    /// Reads an optional decimal number that must fit in `T`.
    fn read_number<T: TryFrom<u32>>(&mut self) -> Result<Option<T>, SmilesError> {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        self.input[start..self.pos]
            .parse::<u32>()
            .ok()
            .and_then(|n| T::try_from(n).ok())
            .map(Some)
            .ok_or(SmilesError::ValueOutOfRange(start))
    }

    fn bracket_atom(&mut self) -> Result<Atom, SmilesError> {
        let start = self.pos;
        self.pos += 1;
        let isotope = self.read_number::<u16>()?;

        let symbol_pos = self.pos;
        let (element, aromatic) = self.bracket_symbol().ok_or_else(|| {
            let symbol: String = self.input[symbol_pos..]
                .chars()
                .take_while(|c| c.is_ascii_alphabetic())
                .take(2)
                .collect();
            if symbol.is_empty() && symbol_pos >= self.bytes.len() {
                SmilesError::UnclosedBracket(start)
            } else {
                SmilesError::UnknownElement {
                    symbol,
                    pos: symbol_pos,
                }
            }
        })?;

        while self.peek() == Some(b'@') {
            self.pos += 1;
        }

        let mut hydrogens = 0u8;
        if self.peek() == Some(b'H') {
            self.pos += 1;
            hydrogens = self.read_number::<u8>()?.unwrap_or(1);
        }

        let mut charge = 0i8;
        if let Some(sign @ (b'+' | b'-')) = self.peek() {
            let unit: i8 = if sign == b'+' { 1 } else { -1 };
            let sign_pos = self.pos;
            self.pos += 1;
            if let Some(magnitude) = self.read_number::<i8>()? {
                charge = magnitude * unit;
            } else {
                charge = unit;
                while self.peek() == Some(sign) {
                    charge = charge
                        .checked_add(unit)
                        .ok_or(SmilesError::ValueOutOfRange(sign_pos))?;
                    self.pos += 1;
                }
            }
        }

        let mut map_class = None;
        if self.peek() == Some(b':') {
            self.pos += 1;
            map_class = self.read_number::<u16>()?;
        }

        if self.peek() != Some(b']') {
            return Err(SmilesError::UnclosedBracket(start));
        }
        self.pos += 1;

        Ok(Atom {
            element,
            charge,
            isotope,
            aromatic,
            hydrogens,
            map_class,
        })
    }

    fn bracket_symbol(&mut self) -> Option<(Element, bool)> {
        let first = self.peek()?;
        let second = self.bytes.get(self.pos + 1).copied();
        if first == b'*' {
            self.pos += 1;
            return Some((Element::WILDCARD, false));
        }
        if first.is_ascii_uppercase() {
            if let Some(second) = second.filter(u8::is_ascii_lowercase) {
                let two = [first, second];
                let symbol = std::str::from_utf8(&two).ok()?;
                if let Some(element) = Element::from_symbol(symbol) {
                    self.pos += 2;
                    return Some((element, false));
                }
            }
            let one = [first];
            let element = Element::from_symbol(std::str::from_utf8(&one).ok()?)?;
            self.pos += 1;
            return Some((element, false));
        }
        if first.is_ascii_lowercase() {
            let (symbol, width) = match (first, second) {
                (b's', Some(b'e')) => ("Se", 2),
                (b'a', Some(b's')) => ("As", 2),
                (b'b', _) => ("B", 1),
                (b'c', _) => ("C", 1),
                (b'n', _) => ("N", 1),
                (b'o', _) => ("O", 1),
                (b'p', _) => ("P", 1),
                (b's', _) => ("S", 1),
                _ => return None,
            };
            let element = Element::from_symbol(symbol)?;
            self.pos += width;
            return Some((element, true));
        }
        None
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn finish(mut self) -> Result<Molecule, SmilesError> {
        let mut bond_valence = vec![0u8; self.atoms.len()];
        for bond in &self.bonds {
            let contribution = bond.order.valence_contribution();
            bond_valence[bond.atom1] = bond_valence[bond.atom1].saturating_add(contribution);
            bond_valence[bond.atom2] = bond_valence[bond.atom2].saturating_add(contribution);
        }
        for (index, atom) in self.atoms.iter_mut().enumerate() {
            if !self.bracketed[index] && atom.element != Element::WILDCARD {
                atom.hydrogens =
                    implicit_hydrogens(atom.element, 0, atom.aromatic, bond_valence[index])
                        .unwrap_or(0);
            }
        }

        let (atoms, bonds) = fold_explicit_hydrogens(self.atoms, self.bonds);
        Ok(Molecule::from_parts(atoms, bonds)?)
    }
}

/// Removes plain hydrogen atoms singly bonded to a heavy atom and adds them to that
/// atom's hydrogen count.
fn fold_explicit_hydrogens(mut atoms: Vec<Atom>, bonds: Vec<Bond>) -> (Vec<Atom>, Vec<Bond>) {
    let mut degree = vec![0usize; atoms.len()];
    for bond in &bonds {
        degree[bond.atom1] += 1;
        degree[bond.atom2] += 1;
    }
    let is_plain_hydrogen = |atom: &Atom| {
        atom.element.is_hydrogen()
            && atom.isotope.is_none()
            && atom.charge == 0
            && atom.map_class.is_none()
            && atom.hydrogens == 0
    };

    let mut removed = vec![false; atoms.len()];
    for bond in &bonds {
        if bond.order != BondOrder::Single {
            continue;
        }
        for (h, heavy) in [(bond.atom1, bond.atom2), (bond.atom2, bond.atom1)] {
            if degree[h] == 1
                && is_plain_hydrogen(&atoms[h])
                && !atoms[heavy].element.is_hydrogen()
                && !removed[h]
            {
                removed[h] = true;
                atoms[heavy].hydrogens = atoms[heavy].hydrogens.saturating_add(1);
            }
        }
    }
    if !removed.iter().any(|&r| r) {
        return (atoms, bonds);
    }

    let mut remap = vec![usize::MAX; atoms.len()];
    let mut kept_atoms = Vec::with_capacity(atoms.len());
    for (index, atom) in atoms.into_iter().enumerate() {
        if !removed[index] {
            remap[index] = kept_atoms.len();
            kept_atoms.push(atom);
        }
    }
    let kept_bonds = bonds
        .into_iter()
        .filter(|b| !removed[b.atom1] && !removed[b.atom2])
        .map(|b| Bond::new(remap[b.atom1], remap[b.atom2], b.order))
        .collect();
    (kept_atoms, kept_bonds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::SanitizeError;

    #[test]
    fn parses_organic_subset_with_implicit_hydrogens() {
        let ethanol = parse_smiles("CCO").unwrap();
        assert_eq!(ethanol.atom_count(), 3);
        let hydrogens: Vec<u8> = ethanol.atoms().iter().map(|a| a.hydrogens).collect();
        assert_eq!(hydrogens, [3, 2, 1]);
    }

    #[test]
    fn parses_aromatic_rings() {
        let benzene = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(benzene.bond_count(), 6);
        assert!(benzene.bonds().iter().all(|b| b.order == BondOrder::Aromatic));
        assert!(benzene.atoms().iter().all(|a| a.aromatic && a.hydrogens == 1));

        let pyridine = parse_smiles("c1ccncc1").unwrap();
        let nitrogen = pyridine
            .atoms()
            .iter()
            .find(|a| a.element == Element::NITROGEN)
            .unwrap();
        assert_eq!(nitrogen.hydrogens, 0);
    }

    #[test]
    fn parses_bracket_atoms() {
        let mol = parse_smiles("[13CH3][NH3+].[O-]C(=O)C").unwrap();
        let carbon = mol.atom(0);
        assert_eq!(carbon.isotope, Some(13));
        assert_eq!(carbon.hydrogens, 3);
        let nitrogen = mol.atom(1);
        assert_eq!(nitrogen.charge, 1);
        assert_eq!(nitrogen.hydrogens, 3);
        assert_eq!(mol.atom(2).charge, -1);
        assert_eq!(mol.components().len(), 2);
    }

    #[test]
    fn parses_multi_sign_charges_and_map_classes() {
        let mol = parse_smiles("[Fe++].[C:7]").unwrap();
        assert_eq!(mol.atom(0).charge, 2);
        assert_eq!(mol.atom(1).map_class, Some(7));
        assert_eq!(mol.atom(1).hydrogens, 0);
    }

    #[test]
    fn two_letter_ring_closures_are_supported() {
        let a = parse_smiles("C%10CCCCC%10").unwrap();
        let b = parse_smiles("C1CCCCC1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn explicit_hydrogens_are_folded() {
        let mol = parse_smiles("[H]OC([H])([H])[H]").unwrap();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol, parse_smiles("CO").unwrap());
    }

    #[test]
    fn non_ring_aromatic_bond_becomes_single() {
        let biphenyl = parse_smiles("c1ccccc1c1ccccc1").unwrap();
        let linker = biphenyl
            .bonds()
            .iter()
            .find(|b| b.contains(5) && b.contains(6))
            .unwrap();
        assert_eq!(linker.order, BondOrder::Single);
    }

    #[test]
    fn stereo_marks_are_ignored() {
        let a = parse_smiles("F/C=C/F").unwrap();
        let b = parse_smiles("FC=CF").unwrap();
        assert_eq!(a, b);
        let c = parse_smiles("N[C@@H](C)C(=O)O").unwrap();
        assert_eq!(c, parse_smiles("NC(C)C(=O)O").unwrap());
    }

    #[test]
    fn reports_syntax_errors() {
        assert_eq!(parse_smiles("  ").unwrap_err(), SmilesError::Empty);
        assert_eq!(parse_smiles("C1CC").unwrap_err(), SmilesError::UnclosedRing(1));
        assert_eq!(parse_smiles("C(C").unwrap_err(), SmilesError::UnbalancedBranch);
        assert_eq!(parse_smiles("CC)").unwrap_err(), SmilesError::UnbalancedBranch);
        assert!(matches!(
            parse_smiles("C[Xx]").unwrap_err(),
            SmilesError::UnknownElement { .. }
        ));
        assert_eq!(parse_smiles("[CH4").unwrap_err(), SmilesError::UnclosedBracket(0));
        assert_eq!(parse_smiles("CC=").unwrap_err(), SmilesError::DanglingBond(2));
        assert!(matches!(
            parse_smiles("C?C").unwrap_err(),
            SmilesError::UnexpectedCharacter { ch: '?', pos: 1 }
        ));
        assert!(matches!(
            parse_smiles("Q").unwrap_err(),
            SmilesError::UnknownElement { .. }
        ));
    }

    #[test]
    fn out_of_range_bracket_numbers_are_errors() {
        assert_eq!(parse_smiles("[C+200]").unwrap_err(), SmilesError::ValueOutOfRange(3));
        assert_eq!(parse_smiles("[C-128]").unwrap_err(), SmilesError::ValueOutOfRange(3));
        assert_eq!(parse_smiles("[CH300]").unwrap_err(), SmilesError::ValueOutOfRange(3));
        assert_eq!(parse_smiles("[70000C]").unwrap_err(), SmilesError::ValueOutOfRange(1));
        assert_eq!(parse_smiles("[CH4:70000]").unwrap_err(), SmilesError::ValueOutOfRange(5));
        assert_eq!(
            parse_smiles("[C-127]").unwrap().atom(0).charge,
            -127,
            "largest magnitude that fits is kept as written"
        );
    }

    #[test]
    fn long_sign_runs_overflow_into_an_error() {
        let smiles = format!("[C{}]", "+".repeat(130));
        assert_eq!(parse_smiles(&smiles).unwrap_err(), SmilesError::ValueOutOfRange(2));
        let mol = parse_smiles("[C+++]").unwrap();
        assert_eq!(mol.atom(0).charge, 3);
    }

    #[test]
    fn hundreds_of_branches_are_a_valence_error() {
        let smiles = format!("C{}", "(F)".repeat(300));
        assert!(matches!(
            parse_smiles(&smiles).unwrap_err(),
            SmilesError::Sanitize(SanitizeError::ValenceExceeded { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_invalid_ring_closures() {
        assert_eq!(parse_smiles("C11").unwrap_err(), SmilesError::InvalidRingClosure(1));
        assert_eq!(parse_smiles("C12CC12").unwrap_err(), SmilesError::InvalidRingClosure(2));
    }

    #[test]
    fn rejects_chemically_invalid_structures() {
        assert!(matches!(
            parse_smiles("C(C)(C)(C)(C)C").unwrap_err(),
            SmilesError::Sanitize(SanitizeError::ValenceExceeded { .. })
        ));
        assert!(matches!(
            parse_smiles("Cc").unwrap_err(),
            SmilesError::Sanitize(SanitizeError::AromaticOutsideRing(_))
        ));
        assert!(matches!(
            parse_smiles("O=O=O").unwrap_err(),
            SmilesError::Sanitize(SanitizeError::ValenceExceeded { .. })
        ));
    }
}
