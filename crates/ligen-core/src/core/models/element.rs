use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static SYMBOL_TO_ATOMIC_NUMBER: Map<&'static str, u8> = phf_map! {
    "*" => 0,
    "H" => 1, "He" => 2, "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7, "O" => 8,
    "F" => 9, "Ne" => 10, "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15,
    "S" => 16, "Cl" => 17, "Ar" => 18, "K" => 19, "Ca" => 20, "Sc" => 21, "Ti" => 22,
    "V" => 23, "Cr" => 24, "Mn" => 25, "Fe" => 26, "Co" => 27, "Ni" => 28, "Cu" => 29,
    "Zn" => 30, "Ga" => 31, "Ge" => 32, "As" => 33, "Se" => 34, "Br" => 35, "Kr" => 36,
    "Rb" => 37, "Sr" => 38, "Y" => 39, "Zr" => 40, "Nb" => 41, "Mo" => 42, "Tc" => 43,
    "Ru" => 44, "Rh" => 45, "Pd" => 46, "Ag" => 47, "Cd" => 48, "In" => 49, "Sn" => 50,
    "Sb" => 51, "Te" => 52, "I" => 53, "Xe" => 54,
};

/// Symbol and standard atomic weight, indexed by atomic number.
const ELEMENT_DATA: [(&str, f64); 55] = [
    ("*", 0.0),
    ("H", 1.008),
    ("He", 4.0026),
    ("Li", 6.94),
    ("Be", 9.0122),
    ("B", 10.81),
    ("C", 12.011),
    ("N", 14.007),
    ("O", 15.999),
    ("F", 18.998),
    ("Ne", 20.180),
    ("Na", 22.990),
    ("Mg", 24.305),
    ("Al", 26.982),
    ("Si", 28.085),
    ("P", 30.974),
    ("S", 32.06),
    ("Cl", 35.45),
    ("Ar", 39.948),
    ("K", 39.098),
    ("Ca", 40.078),
    ("Sc", 44.956),
    ("Ti", 47.867),
    ("V", 50.942),
    ("Cr", 51.996),
    ("Mn", 54.938),
    ("Fe", 55.845),
    ("Co", 58.933),
    ("Ni", 58.693),
    ("Cu", 63.546),
    ("Zn", 65.38),
    ("Ga", 69.723),
    ("Ge", 72.630),
    ("As", 74.922),
    ("Se", 78.971),
    ("Br", 79.904),
    ("Kr", 83.798),
    ("Rb", 85.468),
    ("Sr", 87.62),
    ("Y", 88.906),
    ("Zr", 91.224),
    ("Nb", 92.906),
    ("Mo", 95.95),
    ("Tc", 98.0),
    ("Ru", 101.07),
    ("Rh", 102.91),
    ("Pd", 106.42),
    ("Ag", 107.87),
    ("Cd", 112.41),
    ("In", 114.82),
    ("Sn", 118.71),
    ("Sb", 121.76),
    ("Te", 127.60),
    ("I", 126.90),
    ("Xe", 131.29),
];

/// A chemical element identified by its atomic number.
///
/// Atomic number `0` is the wildcard atom `*`, which carries no mass and no
/// default valence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown element symbol: '{0}'")]
pub struct UnknownElementError(pub String);

impl Element {
    pub const WILDCARD: Element = Element(0);
    pub const HYDROGEN: Element = Element(1);
    pub const BORON: Element = Element(5);
    pub const CARBON: Element = Element(6);
    pub const NITROGEN: Element = Element(7);
    pub const OXYGEN: Element = Element(8);
    pub const FLUORINE: Element = Element(9);
    pub const PHOSPHORUS: Element = Element(15);
    pub const SULFUR: Element = Element(16);
    pub const CHLORINE: Element = Element(17);
    pub const BROMINE: Element = Element(35);
    pub const IODINE: Element = Element(53);

    pub fn from_atomic_number(number: u8) -> Option<Self> {
        ((number as usize) < ELEMENT_DATA.len()).then_some(Element(number))
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        SYMBOL_TO_ATOMIC_NUMBER.get(symbol).copied().map(Element)
    }

    pub fn atomic_number(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        ELEMENT_DATA[self.0 as usize].0
    }

    pub fn atomic_mass(self) -> f64 {
        ELEMENT_DATA[self.0 as usize].1
    }

    /// Valences an uncharged atom of this element may adopt, lowest first.
    ///
    /// Only the organic subset (plus hydrogen) has defined valences; every other
    /// element returns an empty slice and is never given implicit hydrogens.
    pub fn default_valences(self) -> &'static [u8] {
        match self.0 {
            1 => &[1],
            5 => &[3],
            6 => &[4],
            7 => &[3, 5],
            8 => &[2],
            9 | 17 | 35 | 53 => &[1],
            15 => &[3, 5],
            16 => &[2, 4, 6],
            _ => &[],
        }
    }

    /// Valences after accounting for a formal charge.
    ///
    /// Charged forms follow the isoelectronic neighbour (`[N+]` behaves like carbon,
    /// `[O-]` like fluorine). Unlisted combinations have no defined valence.
    pub fn valences_for_charge(self, charge: i8) -> &'static [u8] {
        match (self.0, charge) {
            (_, 0) => self.default_valences(),
            (5, -1) => &[4],
            (6, 1) | (6, -1) => &[3],
            (7, 1) | (15, 1) => &[4],
            (7, -1) => &[2],
            (8, 1) => &[3],
            (8, -1) => &[1],
            (16, 1) => &[3],
            (16, -1) => &[1],
            _ => &[],
        }
    }

    /// Elements that may be written without brackets in SMILES.
    pub fn is_organic_subset(self) -> bool {
        matches!(self.0, 0 | 5 | 6 | 7 | 8 | 9 | 15 | 16 | 17 | 35 | 53)
    }

    /// Elements that may appear as lowercase aromatic symbols.
    pub fn can_be_aromatic(self) -> bool {
        matches!(self.0, 0 | 5 | 6 | 7 | 8 | 15 | 16 | 33 | 34)
    }

    pub fn is_halogen(self) -> bool {
        matches!(self.0, 9 | 17 | 35 | 53)
    }

    pub fn is_hydrogen(self) -> bool {
        self.0 == 1
    }
}

impl FromStr for Element {
    type Err = UnknownElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Element::from_symbol(s).ok_or_else(|| UnknownElementError(s.to_string()))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_table_is_consistent_with_atomic_numbers() {
        for (number, (symbol, _)) in ELEMENT_DATA.iter().enumerate() {
            let element = Element::from_symbol(symbol).unwrap();
            assert_eq!(element.atomic_number() as usize, number);
            assert_eq!(element.symbol(), *symbol);
        }
        assert_eq!(SYMBOL_TO_ATOMIC_NUMBER.len(), ELEMENT_DATA.len());
    }

    #[test]
    fn from_str_rejects_unknown_symbols() {
        assert_eq!("Cl".parse::<Element>().unwrap(), Element::CHLORINE);
        assert!("Xx".parse::<Element>().is_err());
        assert!("cl".parse::<Element>().is_err());
    }

    #[test]
    fn charged_valences_follow_isoelectronic_neighbour() {
        assert_eq!(Element::NITROGEN.valences_for_charge(1), &[4]);
        assert_eq!(Element::OXYGEN.valences_for_charge(-1), &[1]);
        assert_eq!(Element::CARBON.valences_for_charge(0), &[4]);
        assert!(Element::CARBON.valences_for_charge(2).is_empty());
    }

    #[test]
    fn wildcard_has_no_mass_or_valence() {
        assert_eq!(Element::WILDCARD.atomic_mass(), 0.0);
        assert!(Element::WILDCARD.default_valences().is_empty());
        assert_eq!(Element::WILDCARD.to_string(), "*");
    }
}
