//src/lineage.rs

use std::io::{self, BufRead, Write};

use crate::error::{Error, Result};
use crate::io::numbered_lines;
use crate::taxonomy::{LineageMode, LineageOrder, TaxonomyStore, CANONICAL_RANKS};
use crate::types::{LineageRow, UNASSIGNED_TAXID};

pub const COUNT_COLUMN: &str = "Count";
pub const TAXID_COLUMN: &str = "Taxid";

/// What to do with a taxid the taxonomy does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineagePolicy {
    /// Abort the run.
    #[default]
    Strict,
    /// Log a warning and report the row as unassigned.
    Lenient,
}

/// Lineage of a single count-table row, kingdom first.
pub fn expand_row<S: TaxonomyStore + ?Sized>(
    store: &S,
    count: &str,
    taxid: &str,
    policy: LineagePolicy,
) -> Result<LineageRow> {
    if taxid == UNASSIGNED_TAXID {
        return Ok(LineageRow::unassigned(count));
    }

    match store.lineage(taxid, Some(&CANONICAL_RANKS[..]), LineageMode::Names, LineageOrder::RootToLeaf) {
        Ok(lineage) => Ok(LineageRow {
            count: count.to_string(),
            lineage,
        }),
        Err(e) if e.is_lookup_miss() && policy == LineagePolicy::Lenient => {
            log::warn!("taxid {} missing from Taxonomy reference, row reported as unassigned", taxid);
            Ok(LineageRow::unassigned(count))
        }
        Err(e) => Err(e),
    }
}

fn column_index(header: &[&str], name: &'static str) -> Result<usize> {
    header
        .iter()
        .position(|h| h.trim() == name)
        .ok_or(Error::MissingColumn(name))
}

/// Expand every row of a tab-separated count table that has `Count` and
/// `Taxid` columns. Rows are kept in file order, one output row per input row,
/// and the count text is carried through as written.
pub fn expand_lineages<R: BufRead, S: TaxonomyStore + ?Sized>(
    reader: R,
    store: &S,
    policy: LineagePolicy,
) -> Result<Vec<LineageRow>> {
    let mut lines = numbered_lines(reader);

    let header = match lines.next() {
        Some(line) => line?.1,
        None => return Ok(Vec::new()),
    };
    let header: Vec<&str> = header.split('\t').collect();
    let count_idx = column_index(&header, COUNT_COLUMN)?;
    let taxid_idx = column_index(&header, TAXID_COLUMN)?;
    let required = count_idx.max(taxid_idx) + 1;

    let mut rows = Vec::new();
    let mut blank_line = None;
    for line in lines {
        let (line_no, line) = line?;
        if line.trim().is_empty() {
            blank_line.get_or_insert(line_no);
            continue;
        }
        // Trailing blank lines are fine, a blank row between records is not.
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

        rows.push(expand_row(
            store,
            fields[count_idx].trim(),
            fields[taxid_idx].trim(),
            policy,
        )?);
    }

    Ok(rows)
}

/// Write Krona text input: no header, `count\tkingdom\t...\tspecies` per row.
pub fn write_krona_table<W: Write>(out: &mut W, rows: &[LineageRow]) -> io::Result<()> {
    for row in rows {
        out.write_all(row.count.as_bytes())?;
        for name in &row.lineage {
            out.write_all(b"\t")?;
            out.write_all(name.as_bytes())?;
        }
        out.write_all(b"\n")?;
    }
    Ok(())
}
