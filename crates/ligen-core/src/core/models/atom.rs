use super::element::Element;

/// An atom of a molecular graph.
///
/// Hydrogens are never stored as separate atoms unless they are isotopic or charged;
/// `hydrogens` is the total number of hydrogens attached to this heavy atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom {
    /// The chemical element of the atom.
    pub element: Element,
    /// Formal charge in elementary charge units.
    pub charge: i8,
    /// Mass number, if one was written explicitly.
    pub isotope: Option<u16>,
    /// Whether the atom takes part in an aromatic system.
    pub aromatic: bool,
    /// Total attached hydrogen count.
    pub hydrogens: u8,
    /// Atom-map class (`[C:3]`), used by reaction templates.
    pub map_class: Option<u16>,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            charge: 0,
            isotope: None,
            aromatic: false,
            hydrogens: 0,
            map_class: None,
        }
    }

    pub fn aromatic(element: Element) -> Self {
        Self {
            aromatic: true,
            ..Self::new(element)
        }
    }

    pub fn with_charge(mut self, charge: i8) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_hydrogens(mut self, hydrogens: u8) -> Self {
        self.hydrogens = hydrogens;
        self
    }

    /// Mass of the atom including its attached hydrogens.
    pub fn mass(&self) -> f64 {
        self.element.atomic_mass() + self.hydrogens as f64 * Element::HYDROGEN.atomic_mass()
    }
}

/// Number of implicit hydrogens an atom receives given the valence already used by
/// its explicit bonds (aromatic bonds count as one).
///
/// The smallest allowed valence that accommodates `bond_valence` wins. Aromatic atoms
/// only ever use their lowest valence, minus one unit for the pi system. Returns `None`
/// when the element has no defined valence for the given charge, in which case callers
/// must keep whatever hydrogen count was written explicitly.
pub fn implicit_hydrogens(
    element: Element,
    charge: i8,
    aromatic: bool,
    bond_valence: u8,
) -> Option<u8> {
    let valences = element.valences_for_charge(charge);
    let &lowest = valences.first()?;
    if aromatic {
        return Some(lowest.saturating_sub(bond_valence.saturating_add(1)));
    }
    let target = valences
        .iter()
        .copied()
        .find(|&v| v >= bond_valence)
        .unwrap_or(bond_valence);
    Some(target - bond_valence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_hydrogens_fill_lowest_valence() {
        assert_eq!(implicit_hydrogens(Element::CARBON, 0, false, 1), Some(3));
        assert_eq!(implicit_hydrogens(Element::NITROGEN, 0, false, 1), Some(2));
        assert_eq!(implicit_hydrogens(Element::SULFUR, 0, false, 3), Some(1));
        assert_eq!(implicit_hydrogens(Element::NITROGEN, 0, false, 4), Some(1));
    }

    #[test]
    fn implicit_hydrogens_reserve_pi_valence_for_aromatic_atoms() {
        assert_eq!(implicit_hydrogens(Element::CARBON, 0, true, 2), Some(1));
        assert_eq!(implicit_hydrogens(Element::CARBON, 0, true, 3), Some(0));
        assert_eq!(implicit_hydrogens(Element::NITROGEN, 0, true, 2), Some(0));
        assert_eq!(implicit_hydrogens(Element::NITROGEN, 0, true, 3), Some(0));
    }

    #[test]
    fn charged_atoms_use_charge_adjusted_valence() {
        assert_eq!(implicit_hydrogens(Element::NITROGEN, 1, false, 1), Some(3));
        assert_eq!(implicit_hydrogens(Element::OXYGEN, -1, false, 1), Some(0));
        assert_eq!(implicit_hydrogens(Element::from_symbol("Fe").unwrap(), 2, false, 0), None);
    }

    #[test]
    fn atom_mass_includes_hydrogens() {
        let methyl = Atom::new(Element::CARBON).with_hydrogens(3);
        assert!((methyl.mass() - 15.035).abs() < 1e-9);
    }
}
