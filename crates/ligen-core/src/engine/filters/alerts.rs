use super::{Filter, FilterError};
use crate::core::models::molecule::Molecule;
use crate::core::smarts::SmartsPattern;

/// The built-in structural alert collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSet {
    /// Pan-assay interference compounds.
    Pains,
    /// Reactive and undesirable groups flagged for screening libraries.
    Nih,
    /// Unwanted functionalities for lead-like compounds.
    Brenk,
}

impl AlertSet {
    pub fn name(self) -> &'static str {
        match self {
            Self::Pains => "PAINS",
            Self::Nih => "NIH",
            Self::Brenk => "BRENK",
        }
    }

    fn patterns(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Pains => PAINS_ALERTS,
            Self::Nih => NIH_ALERTS,
            Self::Brenk => BRENK_ALERTS,
        }
    }
}

/// Rejects any molecule matching one of its SMARTS alerts.
#[derive(Debug, Clone)]
pub struct StructuralAlertFilter {
    name: String,
    alerts: Vec<(String, SmartsPattern)>,
}

impl StructuralAlertFilter {
    pub fn builtin(set: AlertSet) -> Result<Self, FilterError> {
        let alerts = set
            .patterns()
            .iter()
            .map(|&(label, smarts)| {
                SmartsPattern::parse(smarts)
                    .map(|pattern| (label.to_string(), pattern))
                    .map_err(|source| FilterError::InvalidAlert {
                        set: set.name(),
                        smarts,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: set.name().to_string(),
            alerts,
        })
    }

    pub fn new(name: impl Into<String>, alerts: Vec<(String, SmartsPattern)>) -> Self {
        Self {
            name: name.into(),
            alerts,
        }
    }

    /// Labels of the alerts `molecule` triggers.
    pub fn hits(&self, molecule: &Molecule) -> Vec<&str> {
        self.alerts
            .iter()
            .filter(|(_, pattern)| pattern.matches(molecule))
            .map(|(label, _)| label.as_str())
            .collect()
    }
}

impl Filter for StructuralAlertFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn passes(&self, molecule: &Molecule) -> bool {
        !self.alerts.iter().any(|(_, pattern)| pattern.matches(molecule))
    }
}

const PAINS_ALERTS: &[(&str, &str)] = &[
    ("azo_A", "cN=Nc"),
    ("quinone_A", "O=C1C=CC(=O)C=C1"),
    ("quinone_B", "O=C1C(=O)C=CC=C1"),
    ("catechol_A", "c([OH])c[OH]"),
    ("hydroquinone_A", "[OH]c1ccc([OH])cc1"),
    ("ene_rhod_A", "[#6]=C1SC(=S)[#7]C1=O"),
    ("ene_five_het_A", "[#6]=[#6]1[#6](=O)[#7][#6](=[O,S])[#7,#16]1"),
    ("hzone_phenol_A", "[OH]c1ccccc1[CX3]=N[NX3]"),
    ("mannich_A", "[OH]c1ccccc1[CH2][NX3]([CX4])[CX4]"),
    ("anil_di_alk_A", "[CX4][NX3]([CX4])c1ccc([NX3;H2,H1])cc1"),
    ("keto_keto_beta_A", "[#6]C(=O)[CH2]C(=O)C(=O)"),
    ("thiophene_amino_A", "[NH2]c1sccc1C=O"),
    ("ene_cyano_A", "N#CC(C#N)=[#6]"),
    ("cyano_ene_amine_A", "N#C[#6]=[#6][NH2]"),
    ("imine_one_A", "[#6]=[#7][#6](=O)[#6]=[#6]"),
    ("amino_acridine_A", "[NX3]c1c2ccccc2nc2ccccc12"),
];

const NIH_ALERTS: &[(&str, &str)] = &[
    ("acyl_halide", "C(=O)[F,Cl,Br,I]"),
    ("aldehyde", "[CX3H1](=O)[#6]"),
    ("alkyl_halide", "[CH2][Cl,Br,I]"),
    ("anhydride", "C(=O)OC(=O)"),
    ("azide", "N=[N+]=[N-]"),
    ("aziridine", "C1NC1"),
    ("epoxide", "C1OC1"),
    ("diazo", "[#6]=[N+]=[N-]"),
    ("disulfide", "SS"),
    ("hydrazine", "[NX3][NX3]"),
    ("isocyanate", "N=C=O"),
    ("isothiocyanate", "N=C=S"),
    ("nitroso", "[#6]N=O"),
    ("peroxide", "OO"),
    ("sulfonyl_halide", "S(=O)(=O)[F,Cl,Br,I]"),
    ("thiol", "[SX2H1]"),
    ("triflate", "OS(=O)(=O)C(F)(F)F"),
];

const BRENK_ALERTS: &[(&str, &str)] = &[
    ("nitro_group", "[N+](=O)[O-]"),
    ("michael_acceptor", "[CH2]=[CH]C(=O)"),
    ("aliphatic_long_chain", "[CH2][CH2][CH2][CH2][CH2][CH2][CH2]"),
    ("2_halo_pyridine", "n1c([F,Cl,Br,I])cccc1"),
    ("thioester", "SC(=O)"),
    ("thiocarbonyl", "C=S"),
    ("polyene", "C=CC=CC=C"),
    ("oxime", "[#6]=N[OH]"),
    ("hydroxamic_acid", "C(=O)N[OH]"),
    ("imine", "[#6][CX3]=[NX2][#6]"),
    ("phosphor", "P"),
    ("triple_bond", "C#C"),
    ("azo_group", "N=N"),
    ("hydrazine", "N[NH2]"),
    ("iodine", "I"),
    ("quaternary_nitrogen", "[NX4+]"),
    ("sulfonic_acid", "S(=O)(=O)[OH]"),
    ("diketo_group", "[#6]C(=O)C(=O)[#6]"),
    ("het_C_het_not_in_ring", "[NX3,O,S;R0][CH2;R0][NX3,O,S;R0]"),
    ("perfluorinated_chain", "C(F)(F)C(F)(F)C(F)F"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::smiles::parse_smiles;

    fn filter(set: AlertSet) -> StructuralAlertFilter {
        StructuralAlertFilter::builtin(set).unwrap()
    }

    #[test]
    fn every_builtin_alert_parses() {
        for set in [AlertSet::Pains, AlertSet::Nih, AlertSet::Brenk] {
            let built = filter(set);
            assert_eq!(built.alerts.len(), set.patterns().len());
            assert_eq!(built.name(), set.name());
        }
    }

    #[test]
    fn pains_flags_azo_dyes_and_catechols() {
        let pains = filter(AlertSet::Pains);
        let azo = parse_smiles("O=C(O)c1ccccc1N=Nc1ccccc1").unwrap();
        assert_eq!(pains.hits(&azo), vec!["azo_A"]);
        assert!(!pains.passes(&parse_smiles("Oc1ccccc1O").unwrap()));
        assert!(pains.passes(&parse_smiles("CC(=O)Oc1ccccc1C(=O)O").unwrap()));
    }

    #[test]
    fn nih_flags_reactive_groups() {
        let nih = filter(AlertSet::Nih);
        assert!(!nih.passes(&parse_smiles("CCC=O").unwrap()));
        assert!(!nih.passes(&parse_smiles("CCS").unwrap()));
        assert!(!nih.passes(&parse_smiles("CC(=O)Cl").unwrap()));
        assert!(nih.passes(&parse_smiles("CC(C)Cc1ccc(cc1)C(C)C(=O)O").unwrap()));
    }

    #[test]
    fn brenk_flags_nitro_and_long_chains() {
        let brenk = filter(AlertSet::Brenk);
        assert_eq!(
            brenk.hits(&parse_smiles("[O-][N+](=O)c1ccccc1").unwrap()),
            vec!["nitro_group"]
        );
        assert!(!brenk.passes(&parse_smiles("CCCCCCCCCC(=O)O").unwrap()));
        assert!(brenk.passes(&parse_smiles("CC(=O)Nc1ccc(O)cc1").unwrap()));
    }
}
