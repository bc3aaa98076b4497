use super::Filter;
use crate::core::descriptors::Descriptors;
use crate::core::models::molecule::Molecule;
use crate::core::smarts::{SmartsError, SmartsPattern};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleFileError {
    #[error("I/O error reading file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error in file {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Alert '{name}' has an invalid SMARTS: {source}")]
    InvalidAlert { name: String, source: SmartsError },
    #[error("Rule file {0} defines neither alerts nor bounds")]
    Empty(String),
}

/// Upper and lower descriptor limits; unset limits are not checked.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorBounds {
    pub max_molecular_weight: Option<f64>,
    pub min_molecular_weight: Option<f64>,
    pub max_logp: Option<f64>,
    pub max_hbd: Option<usize>,
    pub max_hba: Option<usize>,
    pub max_tpsa: Option<f64>,
    pub max_rotatable_bonds: Option<usize>,
}

impl DescriptorBounds {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn accepts(&self, d: &Descriptors) -> bool {
        self.max_molecular_weight.is_none_or(|max| d.molecular_weight <= max)
            && self.min_molecular_weight.is_none_or(|min| d.molecular_weight >= min)
            && self.max_logp.is_none_or(|max| d.logp <= max)
            && self.max_hbd.is_none_or(|max| d.hbd <= max)
            && self.max_hba.is_none_or(|max| d.hba <= max)
            && self.max_tpsa.is_none_or(|max| d.tpsa <= max)
            && self.max_rotatable_bonds.is_none_or(|max| d.rotatable_bonds <= max)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default)]
    alerts: BTreeMap<String, String>,
    #[serde(default)]
    bounds: DescriptorBounds,
}

/// A user filter described by a TOML file:
///
/// ```toml
/// [alerts]
/// nitro = "[N+](=O)[O-]"
///
/// [bounds]
/// max_molecular_weight = 400.0
/// max_hbd = 3
/// ```
///
/// A molecule passes when it triggers no alert and stays within every bound.
#[derive(Debug, Clone)]
pub struct RuleFileFilter {
    name: String,
    alerts: Vec<(String, SmartsPattern)>,
    bounds: DescriptorBounds,
}

impl RuleFileFilter {
    pub fn load(name: &str, path: &Path) -> Result<Self, RuleFileError> {
        let content = std::fs::read_to_string(path).map_err(|e| RuleFileError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: RuleFile = toml::from_str(&content).map_err(|e| RuleFileError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        if file.alerts.is_empty() && file.bounds.is_empty() {
            return Err(RuleFileError::Empty(path.to_string_lossy().to_string()));
        }

        let alerts = file
            .alerts
            .into_iter()
            .map(|(alert, smarts)| match SmartsPattern::parse(&smarts) {
                Ok(pattern) => Ok((alert, pattern)),
                Err(source) => Err(RuleFileError::InvalidAlert {
                    name: alert,
                    source,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            alerts,
            bounds: file.bounds,
        })
    }
}

impl Filter for RuleFileFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn passes(&self, molecule: &Molecule) -> bool {
        self.bounds.accepts(molecule.descriptors())
            && !self.alerts.iter().any(|(_, p)| p.matches(molecule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::smiles::parse_smiles;
    use std::fs;
    use tempfile::tempdir;

    fn write_rules(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn alerts_and_bounds_both_apply() {
        let (_dir, path) = write_rules(
            r#"
[alerts]
nitro = "[N+](=O)[O-]"

[bounds]
max_molecular_weight = 200.0
max_hbd = 1
"#,
        );
        let filter = RuleFileFilter::load("house_rules", &path).unwrap();
        assert_eq!(filter.name(), "house_rules");
        assert!(filter.passes(&parse_smiles("CCO").unwrap()));
        assert!(!filter.passes(&parse_smiles("[O-][N+](=O)C").unwrap()));
        assert!(!filter.passes(&parse_smiles("OCCO").unwrap()));
        assert!(!filter.passes(&parse_smiles("CC(C)Cc1ccc(cc1)C(C)C(=O)O").unwrap()));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let (_dir, path) = write_rules("[bounds]\nmax_weight = 10.0\n");
        assert!(matches!(
            RuleFileFilter::load("x", &path),
            Err(RuleFileError::Toml { .. })
        ));
    }

    #[test]
    fn invalid_alert_is_reported_by_name() {
        let (_dir, path) = write_rules("[alerts]\nbroken = \"C(\"\n");
        match RuleFileFilter::load("x", &path) {
            Err(RuleFileError::InvalidAlert { name, .. }) => assert_eq!(name, "broken"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn empty_rule_file_is_an_error() {
        let (_dir, path) = write_rules("");
        assert!(matches!(
            RuleFileFilter::load("x", &path),
            Err(RuleFileError::Empty(_))
        ));
    }
}
