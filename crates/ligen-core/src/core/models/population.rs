use super::ligand::LigandRecord;
use std::collections::HashMap;

/// An ordered collection of ligands with no two sharing a canonical SMILES.
///
/// Iteration order is insertion order; for a generated population that order is also
/// the rank written to the ranked artifact.
#[derive(Debug, Clone, Default)]
pub struct Population {
    records: Vec<LigandRecord>,
    index: HashMap<String, usize>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `record` unless a structurally identical ligand is already present.
    /// Returns whether the record was added.
    pub fn try_push(&mut self, record: LigandRecord) -> bool {
        if self.index.contains_key(record.smiles()) {
            return false;
        }
        self.index
            .insert(record.smiles().to_string(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn contains_smiles(&self, canonical_smiles: &str) -> bool {
        self.index.contains_key(canonical_smiles)
    }

    pub fn get_by_smiles(&self, canonical_smiles: &str) -> Option<&LigandRecord> {
        self.index.get(canonical_smiles).map(|&i| &self.records[i])
    }

    pub fn get(&self, index: usize) -> Option<&LigandRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LigandRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[LigandRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<LigandRecord> {
        self.records
    }
}

impl FromIterator<LigandRecord> for Population {
    fn from_iter<I: IntoIterator<Item = LigandRecord>>(iter: I) -> Self {
        let mut population = Population::new();
        for record in iter {
            population.try_push(record);
        }
        population
    }
}

impl<'a> IntoIterator for &'a Population {
    type Item = &'a LigandRecord;
    type IntoIter = std::slice::Iter<'a, LigandRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
