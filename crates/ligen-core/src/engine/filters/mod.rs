//! Drug-likeness and structural-alert filters, and the chain that combines them.
//!
//! A molecule passes a [`FilterChain`] iff it passes every filter in it, so the
//! result never depends on the order filters were listed in.

mod alerts;
mod druglike;
pub mod rules;

pub use alerts::{AlertSet, StructuralAlertFilter};
pub use druglike::{GhoseFilter, LipinskiFilter, MozziconacciFilter, VandeWaterbeemdFilter};
pub use rules::{RuleFileError, RuleFileFilter};

use crate::core::models::molecule::Molecule;
use crate::core::smarts::SmartsError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// A pure predicate over molecules.
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;

    fn passes(&self, molecule: &Molecule) -> bool;
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Unknown filter '{0}'")]
    Unknown(String),
    #[error("'NoFilters' cannot be combined with other filters")]
    Conflicting,
    #[error("A filter named '{0}' is already registered")]
    Duplicate(String),
    #[error("Built-in alert set {set} contains an invalid pattern '{smarts}': {source}")]
    InvalidAlert {
        set: &'static str,
        smarts: &'static str,
        source: SmartsError,
    },
    #[error("Failed to load rule file for filter '{name}': {source}")]
    RuleFile { name: String, source: RuleFileError },
}

/// The built-in filters selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterKind {
    LipinskiStrict,
    LipinskiLenient,
    Ghose,
    GhoseModified,
    Mozziconacci,
    VandeWaterbeemd,
    Pains,
    Nih,
    Brenk,
    NoFilters,
}

impl FilterKind {
    pub const ALL: [FilterKind; 10] = [
        Self::LipinskiStrict,
        Self::LipinskiLenient,
        Self::Ghose,
        Self::GhoseModified,
        Self::Mozziconacci,
        Self::VandeWaterbeemd,
        Self::Pains,
        Self::Nih,
        Self::Brenk,
        Self::NoFilters,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LipinskiStrict => "LipinskiStrict",
            Self::LipinskiLenient => "LipinskiLenient",
            Self::Ghose => "Ghose",
            Self::GhoseModified => "GhoseModified",
            Self::Mozziconacci => "Mozziconacci",
            Self::VandeWaterbeemd => "VandeWaterbeemd",
            Self::Pains => "PAINS",
            Self::Nih => "NIH",
            Self::Brenk => "BRENK",
            Self::NoFilters => "NoFilters",
        }
    }

    /// Instantiates the filter; `None` for `NoFilters`.
    pub fn build(self) -> Result<Option<Arc<dyn Filter>>, FilterError> {
        let filter: Arc<dyn Filter> = match self {
            Self::LipinskiStrict => Arc::new(LipinskiFilter::strict()),
            Self::LipinskiLenient => Arc::new(LipinskiFilter::lenient()),
            Self::Ghose => Arc::new(GhoseFilter::standard()),
            Self::GhoseModified => Arc::new(GhoseFilter::modified()),
            Self::Mozziconacci => Arc::new(MozziconacciFilter),
            Self::VandeWaterbeemd => Arc::new(VandeWaterbeemdFilter),
            Self::Pains => Arc::new(StructuralAlertFilter::builtin(AlertSet::Pains)?),
            Self::Nih => Arc::new(StructuralAlertFilter::builtin(AlertSet::Nih)?),
            Self::Brenk => Arc::new(StructuralAlertFilter::builtin(AlertSet::Brenk)?),
            Self::NoFilters => return Ok(None),
        };
        Ok(Some(filter))
    }
}

impl FromStr for FilterKind {
    type Err = FilterError;

    /// Accepts the display names plus `snake_case`, `kebab-case` and `..._Filter` forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        let key = key.strip_suffix("filter").unwrap_or(&key);
        match key {
            "lipinskistrict" => Ok(Self::LipinskiStrict),
            "lipinskilenient" => Ok(Self::LipinskiLenient),
            "ghose" => Ok(Self::Ghose),
            "ghosemodified" => Ok(Self::GhoseModified),
            "mozziconacci" => Ok(Self::Mozziconacci),
            "vandewaterbeemd" => Ok(Self::VandeWaterbeemd),
            "pains" => Ok(Self::Pains),
            "nih" => Ok(Self::Nih),
            "brenk" => Ok(Self::Brenk),
            "no" | "nofilters" | "none" => Ok(Self::NoFilters),
            _ => Err(FilterError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named user filters, populated once at startup.
#[derive(Default, Clone)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Arc<dyn Filter>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        filter: Arc<dyn Filter>,
    ) -> Result<(), FilterError> {
        let name = name.into();
        if self.filters.contains_key(&name) || name.parse::<FilterKind>().is_ok() {
            return Err(FilterError::Duplicate(name));
        }
        self.filters.insert(name, filter);
        Ok(())
    }

    /// Loads a [`RuleFileFilter`] from `path` and registers it under `name`.
    pub fn register_rule_file(&mut self, name: &str, path: &Path) -> Result<(), FilterError> {
        let filter = RuleFileFilter::load(name, path).map_err(|source| FilterError::RuleFile {
            name: name.to_string(),
            source,
        })?;
        self.register(name, Arc::new(filter))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.filters.keys()).finish()
    }
}

/// Logical AND over the active filters.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    /// A chain that accepts everything.
    pub fn pass_all() -> Self {
        Self::default()
    }

    pub fn build(
        kinds: &[FilterKind],
        custom: &[String],
        registry: &FilterRegistry,
    ) -> Result<Self, FilterError> {
        if kinds.contains(&FilterKind::NoFilters) {
            if kinds.len() > 1 || !custom.is_empty() {
                return Err(FilterError::Conflicting);
            }
            return Ok(Self::pass_all());
        }

        let mut unique = kinds.to_vec();
        unique.sort_unstable();
        unique.dedup();
        let mut filters = Vec::with_capacity(unique.len() + custom.len());
        for kind in unique {
            filters.extend(kind.build()?);
        }
        for name in custom {
            let filter = registry
                .get(name)
                .ok_or_else(|| FilterError::Unknown(name.clone()))?;
            filters.push(filter);
        }
        Ok(Self { filters })
    }

    pub fn passes(&self, molecule: &Molecule) -> bool {
        self.filters.iter().all(|f| f.passes(molecule))
    }

    /// Names of the filters that reject `molecule`.
    pub fn rejections(&self, molecule: &Molecule) -> Vec<&str> {
        self.filters
            .iter()
            .filter(|f| !f.passes(molecule))
            .map(|f| f.name())
            .collect()
    }

    pub fn is_pass_all(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::smiles::parse_smiles;

    struct MaxHeavyAtoms(usize);

    impl Filter for MaxHeavyAtoms {
        fn name(&self) -> &str {
            "max_heavy_atoms"
        }

        fn passes(&self, molecule: &Molecule) -> bool {
            molecule.heavy_atom_count() <= self.0
        }
    }

    #[test]
    fn filter_kind_parses_common_spellings() {
        assert_eq!(
            "Lipinski_Strict_Filter".parse::<FilterKind>().unwrap(),
            FilterKind::LipinskiStrict
        );
        assert_eq!("pains".parse::<FilterKind>().unwrap(), FilterKind::Pains);
        assert_eq!(
            "vande-waterbeemd".parse::<FilterKind>().unwrap(),
            FilterKind::VandeWaterbeemd
        );
        assert_eq!("NoFilters".parse::<FilterKind>().unwrap(), FilterKind::NoFilters);
        assert!(matches!(
            "Shiny".parse::<FilterKind>(),
            Err(FilterError::Unknown(_))
        ));
        for kind in FilterKind::ALL {
            assert_eq!(kind.to_string().parse::<FilterKind>().unwrap(), kind);
        }
    }

    #[test]
    fn every_builtin_filter_builds() {
        for kind in FilterKind::ALL {
            let built = kind.build().unwrap();
            assert_eq!(built.is_none(), kind == FilterKind::NoFilters);
        }
    }

    #[test]
    fn no_filters_passes_everything_and_is_exclusive() {
        let registry = FilterRegistry::new();
        let chain = FilterChain::build(&[FilterKind::NoFilters], &[], &registry).unwrap();
        assert!(chain.is_pass_all());
        let huge = parse_smiles(&"C".repeat(80)).unwrap();
        assert!(chain.passes(&huge));

        assert!(matches!(
            FilterChain::build(&[FilterKind::NoFilters, FilterKind::Ghose], &[], &registry),
            Err(FilterError::Conflicting)
        ));
    }

    #[test]
    fn chain_is_and_over_filters_regardless_of_order() {
        let mut registry = FilterRegistry::new();
        registry
            .register("small", Arc::new(MaxHeavyAtoms(12)))
            .unwrap();
        let molecules = [
            "CCO",
            "CC(=O)Oc1ccccc1C(=O)O",
            "O=C(O)c1ccccc1N=Nc1ccccc1",
            "CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC(=O)O",
        ]
        .map(|s| parse_smiles(s).unwrap());

        let forward = FilterChain::build(
            &[FilterKind::LipinskiStrict, FilterKind::Pains],
            &["small".to_string()],
            &registry,
        )
        .unwrap();
        let backward = FilterChain::build(
            &[FilterKind::Pains, FilterKind::LipinskiStrict],
            &["small".to_string()],
            &registry,
        )
        .unwrap();
        let lipinski = FilterKind::LipinskiStrict.build().unwrap().unwrap();
        let pains = FilterKind::Pains.build().unwrap().unwrap();
        let small = registry.get("small").unwrap();

        for molecule in &molecules {
            let expected =
                lipinski.passes(molecule) && pains.passes(molecule) && small.passes(molecule);
            assert_eq!(forward.passes(molecule), expected);
            assert_eq!(backward.passes(molecule), expected);
        }
        assert!(forward.passes(&molecules[0]));
        assert_eq!(forward.rejections(&molecules[3]), vec!["LipinskiStrict", "small"]);
    }

    #[test]
    fn unknown_custom_filter_is_an_error() {
        let registry = FilterRegistry::new();
        assert!(matches!(
            FilterChain::build(&[], &["ghost".to_string()], &registry),
            Err(FilterError::Unknown(name)) if name == "ghost"
        ));
    }

    #[test]
    fn registry_rejects_duplicate_and_builtin_names() {
        let mut registry = FilterRegistry::new();
        registry.register("mine", Arc::new(MaxHeavyAtoms(5))).unwrap();
        assert!(matches!(
            registry.register("mine", Arc::new(MaxHeavyAtoms(6))),
            Err(FilterError::Duplicate(_))
        ));
        assert!(matches!(
            registry.register("PAINS", Arc::new(MaxHeavyAtoms(6))),
            Err(FilterError::Duplicate(_))
        ));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["mine"]);
    }
}
