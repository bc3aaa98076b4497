use super::Filter;
use crate::core::models::molecule::Molecule;

/// Lipinski's rule of five: MW < 500, HBA <= 10, HBD <= 5, logP < 5.
///
/// The strict variant requires every criterion; the lenient one tolerates a single
/// violation.
#[derive(Debug, Clone, Copy)]
pub struct LipinskiFilter {
    allowed_violations: usize,
}

impl LipinskiFilter {
    pub fn strict() -> Self {
        Self {
            allowed_violations: 0,
        }
    }

    pub fn lenient() -> Self {
        Self {
            allowed_violations: 1,
        }
    }

    fn violations(molecule: &Molecule) -> usize {
        let d = molecule.descriptors();
        [
            d.molecular_weight >= 500.0,
            d.hba > 10,
            d.hbd > 5,
            d.logp >= 5.0,
        ]
        .into_iter()
        .filter(|&violated| violated)
        .count()
    }
}

impl Filter for LipinskiFilter {
    fn name(&self) -> &str {
        if self.allowed_violations == 0 {
            "LipinskiStrict"
        } else {
            "LipinskiLenient"
        }
    }

    fn passes(&self, molecule: &Molecule) -> bool {
        Self::violations(molecule) <= self.allowed_violations
    }
}

/// Ghose: 160 <= MW <= 480 (500 for the modified variant), -0.4 <= logP <= 5.6,
/// 40 <= MR <= 130 and 20 <= total atoms <= 70.
#[derive(Debug, Clone, Copy)]
pub struct GhoseFilter {
    max_molecular_weight: f64,
}

impl GhoseFilter {
    pub fn standard() -> Self {
        Self {
            max_molecular_weight: 480.0,
        }
    }

    pub fn modified() -> Self {
        Self {
            max_molecular_weight: 500.0,
        }
    }
}

impl Filter for GhoseFilter {
    fn name(&self) -> &str {
        if self.max_molecular_weight > 480.0 {
            "GhoseModified"
        } else {
            "Ghose"
        }
    }

    fn passes(&self, molecule: &Molecule) -> bool {
        let d = molecule.descriptors();
        (160.0..=self.max_molecular_weight).contains(&d.molecular_weight)
            && (-0.4..=5.6).contains(&d.logp)
            && (40.0..=130.0).contains(&d.molar_refractivity)
            && (20..=70).contains(&d.total_atoms)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MozziconacciFilter;

impl Filter for MozziconacciFilter {
    fn name(&self) -> &str {
        "Mozziconacci"
    }

    fn passes(&self, molecule: &Molecule) -> bool {
        let d = molecule.descriptors();
        d.rotatable_bonds <= 15
            && d.rings <= 6
            && d.oxygens >= 1
            && d.nitrogens >= 1
            && d.halogens <= 7
    }
}

/// Blood-brain-barrier oriented limits: MW < 450 and TPSA < 90.
#[derive(Debug, Clone, Copy)]
pub struct VandeWaterbeemdFilter;

impl Filter for VandeWaterbeemdFilter {
    fn name(&self) -> &str {
        "VandeWaterbeemd"
    }

    fn passes(&self, molecule: &Molecule) -> bool {
        let d = molecule.descriptors();
        d.molecular_weight < 450.0 && d.tpsa < 90.0
    }
}
