use crate::core::io::traits::RecordFile;
use crate::core::models::ligand::{LigandRecord, Origin};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmiError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: u64, kind: SmiParseErrorKind },
}

#[derive(Debug, Error)]
pub enum SmiParseErrorKind {
    #[error("Row has no SMILES column")]
    MissingSmiles,
    #[error("Invalid origin '{0}'")]
    InvalidOrigin(String),
    #[error("Invalid rank '{0}'")]
    InvalidRank(String),
}

/// One row of a source or reagent file: `SMILES NAME [EXTRA...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmiRow {
    pub smiles: String,
    pub name: String,
    pub extra: Vec<String>,
}

/// One row of a ranked generation artifact:
/// `SMILES NAME ORIGIN PARENTS DETAIL RANK`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedRow {
    pub smiles: String,
    pub name: String,
    pub origin: Origin,
    pub parents: Vec<String>,
    pub detail: Option<String>,
    pub rank: usize,
}

impl RankedRow {
    pub fn from_record(record: &LigandRecord, rank: usize) -> Self {
        Self {
            smiles: record.smiles().to_string(),
            name: record.name().to_string(),
            origin: record.origin(),
            parents: record.parents().to_vec(),
            detail: record.detail().map(str::to_string),
            rank,
        }
    }
}

const EMPTY_FIELD: &str = "-";
const PARENT_SEPARATOR: char = '+';

fn reader_for<R: io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn writer_for<W: io::Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer)
}

/// Splits a row into fields. Rows that arrive as a single column are re-split on
/// whitespace so space-separated files are accepted too.
fn fields_of(record: &csv::StringRecord) -> Vec<String> {
    if record.len() == 1 {
        return record
            .get(0)
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
    }
    record.iter().map(str::to_string).collect()
}

fn optional_field(value: Option<&String>) -> Option<String> {
    value
        .filter(|v| !v.is_empty() && v.as_str() != EMPTY_FIELD)
        .cloned()
}

/// Plain `SMILES<TAB>NAME` files: source compounds and reagent sets.
pub struct SmiFile;

impl RecordFile for SmiFile {
    type Record = SmiRow;
    type Error = SmiError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<SmiRow>, SmiError> {
        let mut rows = Vec::new();
        for result in reader_for(reader).records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());
            let mut fields = fields_of(&record).into_iter();
            let Some(smiles) = fields.next().filter(|s| !s.is_empty()) else {
                continue;
            };
            let name = fields
                .next()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("Ligand_{line}"));
            rows.push(SmiRow {
                smiles,
                name,
                extra: fields.collect(),
            });
        }
        Ok(rows)
    }

    fn write_to(records: &[SmiRow], writer: &mut impl Write) -> Result<(), SmiError> {
        let mut out = writer_for(writer);
        for row in records {
            let mut fields = vec![row.smiles.as_str(), row.name.as_str()];
            fields.extend(row.extra.iter().map(String::as_str));
            out.write_record(&fields)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Ranked generation artifacts.
///
/// Reading is lenient about trailing columns so that a plain source file can stand in
/// for a ranked one: missing provenance defaults to a seed with no parents, and a
/// missing rank to the row's position.
pub struct RankedFile;

impl RecordFile for RankedFile {
    type Record = RankedRow;
    type Error = SmiError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<RankedRow>, SmiError> {
        let mut rows = Vec::new();
        for result in reader_for(reader).records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());
            let fields = fields_of(&record);
            let Some(smiles) = fields.first().filter(|s| !s.is_empty()).cloned() else {
                continue;
            };
            let name = fields
                .get(1)
                .cloned()
                .unwrap_or_else(|| format!("Ligand_{line}"));
            let origin = match optional_field(fields.get(2)) {
                Some(value) => value.parse().map_err(|_| SmiError::Parse {
                    line,
                    kind: SmiParseErrorKind::InvalidOrigin(value.clone()),
                })?,
                None => Origin::Seed,
            };
            let parents = optional_field(fields.get(3))
                .map(|p| {
                    p.split(PARENT_SEPARATOR)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let detail = optional_field(fields.get(4));
            let rank = match optional_field(fields.get(5)) {
                Some(value) => value.parse().map_err(|_| SmiError::Parse {
                    line,
                    kind: SmiParseErrorKind::InvalidRank(value.clone()),
                })?,
                None => rows.len() + 1,
            };
            rows.push(RankedRow {
                smiles,
                name,
                origin,
                parents,
                detail,
                rank,
            });
        }
        Ok(rows)
    }

    fn write_to(records: &[RankedRow], writer: &mut impl Write) -> Result<(), SmiError> {
        let mut out = writer_for(writer);
        for row in records {
            let parents = if row.parents.is_empty() {
                EMPTY_FIELD.to_string()
            } else {
                row.parents.join(&PARENT_SEPARATOR.to_string())
            };
            let rank = row.rank.to_string();
            let origin = row.origin.to_string();
            out.write_record([
                row.smiles.as_str(),
                row.name.as_str(),
                origin.as_str(),
                parents.as_str(),
                row.detail.as_deref().unwrap_or(EMPTY_FIELD),
                rank.as_str(),
            ])?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn reads_source_rows_skipping_comments_and_blank_lines() {
        let text = "# header comment\nCCO\tethanol\textra1\n\nc1ccccc1\tbenzene\nCCN\n";
        let rows = SmiFile::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].smiles, "CCO");
        assert_eq!(rows[0].name, "ethanol");
        assert_eq!(rows[0].extra, vec!["extra1".to_string()]);
        assert_eq!(rows[1].name, "benzene");
        assert!(rows[2].name.starts_with("Ligand_"));
    }

    #[test]
    fn accepts_space_separated_rows() {
        let rows = SmiFile::read_from(&mut Cursor::new("CCO ethanol\n")).unwrap();
        assert_eq!(rows[0].smiles, "CCO");
        assert_eq!(rows[0].name, "ethanol");
    }

    #[test]
    fn ranked_rows_use_placeholders_for_empty_fields() {
        let rows = vec![
            RankedRow {
                smiles: "CCO".into(),
                name: "Gen_1_Mutant_0".into(),
                origin: Origin::Mutation,
                parents: vec!["a".into(), "b".into()],
                detail: Some("Amide_Coupling".into()),
                rank: 1,
            },
            RankedRow {
                smiles: "CCN".into(),
                name: "seed_1".into(),
                origin: Origin::Seed,
                parents: vec![],
                detail: None,
                rank: 2,
            },
        ];
        let mut buffer = Vec::new();
        RankedFile::write_to(&rows, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "CCO\tGen_1_Mutant_0\tmutation\ta+b\tAmide_Coupling\t1\nCCN\tseed_1\tseed\t-\t-\t2\n"
        );
        let back = RankedFile::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn plain_source_file_reads_as_ranked_seeds() {
        let rows = RankedFile::read_from(&mut Cursor::new("CCO\tethanol\nCCN\tethylamine\n"))
            .unwrap();
        assert_eq!(rows[1].origin, Origin::Seed);
        assert!(rows[1].parents.is_empty());
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn invalid_origin_reports_line() {
        let err = RankedFile::read_from(&mut Cursor::new("CCO\tx\tteleported\t-\t-\t1\n"))
            .unwrap_err();
        match err {
            SmiError::Parse {
                line,
                kind: SmiParseErrorKind::InvalidOrigin(value),
            } => {
                assert_eq!(line, 1);
                assert_eq!(value, "teleported");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn path_helpers_round_trip_through_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reagents.smi");
        let rows = vec![SmiRow {
            smiles: "NCC".into(),
            name: "propylamine".into(),
            extra: vec![],
        }];
        SmiFile::write_to_path(&rows, &path).unwrap();
        assert_eq!(SmiFile::read_from_path(&path).unwrap(), rows);
    }
}
