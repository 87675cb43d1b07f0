//src/hits.rs

use std::io::BufRead;
use std::path::Path;

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::io::{numbered_lines, open_reader};

/// Column layout of a tabular BLAST report. The defaults match
/// `-outfmt "6 qseqid sseqid evalue pident bitscore sacc staxids sscinames scomnames stitle"`.
#[derive(Debug, Clone, PartialEq)]
pub struct HitReportSchema {
    /// 0-based column holding the query identifier.
    pub query_column: usize,
    /// 0-based column holding the `;`-joined subject taxids.
    pub taxids_column: usize,
    /// 0-based column holding the bitscore.
    pub bitscore_column: usize,
    /// Keep only hits whose bitscore is within this distance of the query's
    /// best hit. `None` keeps every hit.
    pub max_bitscore_delta: Option<f64>,
}

impl Default for HitReportSchema {
    fn default() -> Self {
        Self {
            query_column: 0,
            taxids_column: 6,
            bitscore_column: 4,
            max_bitscore_delta: None,
        }
    }
}

impl HitReportSchema {
    fn required_fields(&self) -> usize {
        let mut last = self.query_column.max(self.taxids_column);
        if self.max_bitscore_delta.is_some() {
            last = last.max(self.bitscore_column);
        }
        last + 1
    }
}

/// One row of a hit report; scoring columns other than the bitscore are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub query_id: String,
    pub tax_ids: Vec<String>,
    /// Only parsed when a bitscore window is configured.
    pub bitscore: Option<f64>,
}

/// Distinct candidate taxids per query, iterated in the order queries were
/// first seen in the report.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    order: Vec<String>,
    candidates: AHashMap<String, Vec<String>>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `tax_ids` into the candidates of `query_id`, registering the
    /// query if it is new. Duplicates are ignored.
    pub fn insert<I, S>(&mut self, query_id: &str, tax_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.candidates.contains_key(query_id) {
            self.order.push(query_id.to_string());
        }
        let entry = self.candidates.entry(query_id.to_string()).or_default();
        for taxid in tax_ids {
            let taxid = taxid.as_ref();
            if !entry.iter().any(|t| t == taxid) {
                entry.push(taxid.to_string());
            }
        }
    }

    pub fn get(&self, query_id: &str) -> Option<&[String]> {
        self.candidates.get(query_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.order
            .iter()
            .map(move |q| (q.as_str(), self.candidates[q].as_slice()))
    }
}

/// Parse a tab-separated hit report. The first line is a header and is
/// discarded; blank lines are only tolerated at the end of the file. A row
/// missing any configured column is fatal.
pub fn parse_hit_report<R: BufRead>(reader: R, schema: &HitReportSchema) -> Result<Vec<HitRecord>> {
    let required = schema.required_fields();
    let mut records = Vec::new();
    let mut blank_line = None;

    for line in numbered_lines(reader).skip(1) {
        let (line_no, line) = line?;
        if line.trim().is_empty() {
            blank_line.get_or_insert(line_no);
            continue;
        }
        // Trailing blank lines are fine, a blank row between hits is not.
        if let Some(blank) = blank_line {
            return Err(Error::MalformedRow {
                line: blank,
                expected: required,
                found: 0,
            });
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < required {
            return Err(Error::MalformedRow {
                line: line_no,
                expected: required,
                found: fields.len(),
            });
        }

        let tax_ids = fields[schema.taxids_column]
            .split(';')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let bitscore = match schema.max_bitscore_delta {
            None => None,
            Some(_) => {
                let raw = fields[schema.bitscore_column].trim();
                match raw.parse::<f64>() {
                    Ok(score) if score.is_finite() => Some(score),
                    _ => {
                        return Err(Error::InvalidField {
                            line: line_no,
                            field: "bitscore",
                            value: raw.to_string(),
                        })
                    }
                }
            }
        };

        records.push(HitRecord {
            query_id: fields[schema.query_column].trim().to_string(),
            tax_ids,
            bitscore,
        });
    }

    Ok(records)
}

/// Group hit records by query into a [`CandidateSet`], applying the bitscore
/// window when one is given. Every query present in `records` is present in
/// the result, since its best hit always passes the window.
pub fn aggregate_hits(records: &[HitRecord], max_bitscore_delta: Option<f64>) -> CandidateSet {
    let mut best: AHashMap<&str, f64> = AHashMap::new();
    if max_bitscore_delta.is_some() {
        for rec in records {
            if let Some(score) = rec.bitscore {
                let slot = best.entry(rec.query_id.as_str()).or_insert(score);
                if score > *slot {
                    *slot = score;
                }
            }
        }
    }

    let mut set = CandidateSet::new();
    for rec in records {
        let keep = match (max_bitscore_delta, rec.bitscore, best.get(rec.query_id.as_str())) {
            (Some(delta), Some(score), Some(&top)) => top - score <= delta,
            _ => true,
        };
        if keep {
            set.insert(&rec.query_id, &rec.tax_ids);
        } else {
            log::debug!(
                "query {}: hit with bitscore {:?} outside window of best hit",
                rec.query_id,
                rec.bitscore
            );
            // The query keeps its place in the output order.
            set.insert(&rec.query_id, std::iter::empty::<&str>());
        }
    }
    set
}

/// Read a hit report from disk (optionally gzipped) and aggregate it.
pub fn read_hit_report<P: AsRef<Path>>(path: P, schema: &HitReportSchema) -> Result<CandidateSet> {
    let records = parse_hit_report(open_reader(path.as_ref())?, schema)?;
    let set = aggregate_hits(&records, schema.max_bitscore_delta);
    log::info!(
        "Read {} hits for {} queries from {}",
        records.len(),
        set.len(),
        path.as_ref().display()
    );
    Ok(set)
}
