//! Whole-molecule descriptors used by the drug-likeness filters.
//!
//! LogP and molar refractivity follow a simplified Wildman-Crippen atom typing;
//! TPSA uses the Ertl fragment contributions for N, O, S and P.

use crate::core::models::element::Element;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptors {
    pub molecular_weight: f64,
    pub heavy_atoms: usize,
    /// All atoms including hydrogens.
    pub total_atoms: usize,
    /// Lipinski donors: hydrogens on N and O.
    pub hbd: usize,
    /// Lipinski acceptors: N and O atoms.
    pub hba: usize,
    pub logp: f64,
    pub molar_refractivity: f64,
    pub tpsa: f64,
    pub rotatable_bonds: usize,
    pub rings: usize,
    pub oxygens: usize,
    pub nitrogens: usize,
    pub halogens: usize,
}

impl Descriptors {
    pub fn compute(molecule: &Molecule) -> Self {
        let atoms = molecule.atoms();
        let molecular_weight = atoms.iter().map(|a| a.mass()).sum();
        let heavy_atoms = molecule.heavy_atom_count();
        let total_atoms = atoms.len() + atoms.iter().map(|a| a.hydrogens as usize).sum::<usize>();
        let count = |element: Element| atoms.iter().filter(|a| a.element == element).count();
        let oxygens = count(Element::OXYGEN);
        let nitrogens = count(Element::NITROGEN);
        let hbd = atoms
            .iter()
            .filter(|a| matches!(a.element, Element::NITROGEN | Element::OXYGEN))
            .map(|a| a.hydrogens as usize)
            .sum();
        let (logp, molar_refractivity) = crippen(molecule);

        Self {
            molecular_weight,
            heavy_atoms,
            total_atoms,
            hbd,
            hba: oxygens + nitrogens,
            logp,
            molar_refractivity,
            tpsa: (0..molecule.atom_count())
                .map(|i| tpsa_contribution(molecule, i))
                .sum(),
            rotatable_bonds: rotatable_bonds(molecule),
            rings: molecule.ring_count(),
            oxygens,
            nitrogens,
            halogens: atoms.iter().filter(|a| a.element.is_halogen()).count(),
        }
    }
}

fn has_bond_of_order(molecule: &Molecule, atom: usize, order: BondOrder) -> bool {
    molecule
        .neighbors(atom)
        .iter()
        .any(|&(_, b)| molecule.bond(b).order == order)
}

/// Single, acyclic bonds between two non-terminal heavy atoms, excluding bonds to
/// triple-bonded atoms.
fn rotatable_bonds(molecule: &Molecule) -> usize {
    let heavy_degree = |atom: usize| {
        molecule
            .neighbors(atom)
            .iter()
            .filter(|&&(n, _)| !molecule.atom(n).element.is_hydrogen())
            .count()
    };
    molecule
        .bonds()
        .iter()
        .enumerate()
        .filter(|&(index, bond)| {
            bond.order == BondOrder::Single
                && !molecule.is_ring_bond(index)
                && [bond.atom1, bond.atom2].iter().all(|&a| {
                    heavy_degree(a) >= 2 && !has_bond_of_order(molecule, a, BondOrder::Triple)
                })
        })
        .count()
}

fn crippen(molecule: &Molecule) -> (f64, f64) {
    let mut logp = 0.0;
    let mut mr = 0.0;
    for index in 0..molecule.atom_count() {
        let atom = molecule.atom(index);
        let (lp, m) = crippen_atom_contribution(molecule, index);
        logp += lp;
        mr += m;
        let h = atom.hydrogens as f64;
        if atom.element == Element::CARBON {
            logp += h * 0.1230;
        } else {
            logp += h * -0.2677;
        }
        mr += h * 1.057;
    }
    (logp, mr)
}

fn crippen_atom_contribution(molecule: &Molecule, index: usize) -> (f64, f64) {
    let atom = molecule.atom(index);
    let has_double = has_bond_of_order(molecule, index, BondOrder::Double);
    let hetero_neighbor = molecule.neighbors(index).iter().any(|&(n, _)| {
        !matches!(
            molecule.atom(n).element,
            Element::CARBON | Element::HYDROGEN
        )
    });

    match atom.element {
        Element::CARBON => {
            if atom.aromatic {
                if hetero_neighbor {
                    (-0.14, 3.509)
                } else {
                    (0.296, 3.509)
                }
            } else if has_double {
                if hetero_neighbor {
                    (-0.03, 3.509)
                } else {
                    (0.08, 3.509)
                }
            } else if molecule.is_ring_atom(index) {
                (0.1441, 3.509)
            } else {
                match molecule.degree(index) {
                    0..=2 => (0.1441, 3.509),
                    3 => (0.0, 3.509),
                    _ => (-0.04, 3.509),
                }
            }
        }
        Element::NITROGEN => {
            if atom.aromatic {
                (-0.3187, 2.188)
            } else if atom.charge > 0 {
                (-1.0190, 2.188)
            } else if has_double {
                (-0.5262, 2.188)
            } else {
                (-0.4458, 2.262)
            }
        }
        Element::OXYGEN => {
            if atom.charge < 0 {
                (-1.189, 1.476)
            } else if has_double {
                (-0.3339, 1.476)
            } else if molecule.degree(index) >= 2 {
                (-0.2893, 1.476)
            } else {
                (-0.3567, 1.476)
            }
        }
        Element::FLUORINE => (0.4118, 1.108),
        Element::PHOSPHORUS => (0.2836, 6.920),
        Element::SULFUR => {
            if has_double {
                (-0.1084, 7.365)
            } else if atom.charge != 0 {
                (-0.5188, 7.365)
            } else {
                (0.6237, 7.365)
            }
        }
        Element::CHLORINE => (0.6895, 5.853),
        Element::BROMINE => (0.8813, 8.927),
        Element::IODINE => (1.050, 13.940),
        _ => (0.0, 0.0),
    }
}

fn tpsa_contribution(molecule: &Molecule, index: usize) -> f64 {
    let atom = molecule.atom(index);
    let degree = molecule.degree(index);
    let h = atom.hydrogens;
    let has_double = has_bond_of_order(molecule, index, BondOrder::Double);
    let has_triple = has_bond_of_order(molecule, index, BondOrder::Triple);

    match atom.element {
        Element::NITROGEN => {
            if atom.charge > 0 {
                return match h {
                    0 => if degree == 4 { 0.0 } else { 3.01 },
                    1 => 4.44,
                    2 => 16.61,
                    _ => 27.64,
                };
            }
            if atom.aromatic {
                return if h >= 1 { 15.79 } else { 12.89 };
            }
            match (degree, h, has_double, has_triple) {
                (1, 0, _, true) => 23.79,
                (1, 2, _, _) => 26.02,
                (1, 1, true, _) => 23.85,
                (2, 1, false, _) => 12.03,
                (2, 0, true, _) => 12.36,
                (3, 0, false, _) => 3.24,
                (3, 0, true, _) => 11.68,
                (2, 0, false, _) => 13.60,
                _ => match h {
                    0 => 3.24,
                    1 => 12.03,
                    _ => 26.02,
                },
            }
        }
        Element::OXYGEN => {
            if atom.charge < 0 {
                return 23.06;
            }
            if atom.aromatic {
                return 13.14;
            }
            if h >= 1 {
                20.23
            } else if has_double {
                17.07
            } else {
                9.23
            }
        }
        Element::SULFUR => {
            if atom.aromatic {
                28.24
            } else if h >= 1 {
                38.80
            } else if has_double {
                32.09
            } else {
                25.30
            }
        }
        Element::PHOSPHORUS => {
            if has_double {
                34.14
            } else if h >= 1 {
                23.47
            } else {
                13.59
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use crate::core::smiles::parse_smiles;

    #[test]
    fn ethanol_basic_counts() {
        let d = parse_smiles("CCO").unwrap().descriptors().clone();
        assert!((d.molecular_weight - 46.069).abs() < 0.01);
        assert_eq!(d.heavy_atoms, 3);
        assert_eq!(d.total_atoms, 9);
        assert_eq!(d.hbd, 1);
        assert_eq!(d.hba, 1);
        assert_eq!(d.rings, 0);
        assert_eq!(d.rotatable_bonds, 0);
    }

    #[test]
    fn aspirin_descriptors_are_plausible() {
        let d = parse_smiles("CC(=O)Oc1ccccc1C(=O)O")
            .unwrap()
            .descriptors()
            .clone();
        assert!((d.molecular_weight - 180.16).abs() < 0.05);
        assert!((d.tpsa - 63.6).abs() < 1.0, "tpsa = {}", d.tpsa);
        assert_eq!(d.hbd, 1);
        assert_eq!(d.hba, 4);
        assert_eq!(d.rings, 1);
        assert_eq!(d.oxygens, 4);
        assert_eq!(d.nitrogens, 0);
        assert!(d.logp > 0.0 && d.logp < 3.0, "logp = {}", d.logp);
        assert_eq!(d.rotatable_bonds, 3);
    }

    #[test]
    fn halogens_and_logp_trend() {
        let benzene = parse_smiles("c1ccccc1").unwrap().descriptors().logp;
        let chlorobenzene = parse_smiles("Clc1ccccc1").unwrap();
        assert_eq!(chlorobenzene.descriptors().halogens, 1);
        assert!(chlorobenzene.descriptors().logp > benzene);
        let phenol = parse_smiles("Oc1ccccc1").unwrap().descriptors().logp;
        assert!(phenol < benzene);
    }

    #[test]
    fn terminal_and_ring_bonds_are_not_rotatable() {
        let d = parse_smiles("CCCC").unwrap().descriptors().clone();
        assert_eq!(d.rotatable_bonds, 1);
        let ring = parse_smiles("C1CCCCC1").unwrap().descriptors().clone();
        assert_eq!(ring.rotatable_bonds, 0);
        assert_eq!(ring.rings, 1);
        let alkyne = parse_smiles("CC#CCC").unwrap().descriptors().clone();
        assert_eq!(alkyne.rotatable_bonds, 0);
    }
}
