//src/mask.rs

use std::io::{self, BufRead, Write};

use ahash::AHashSet;

use crate::error::{Error, Result};
use crate::io::numbered_lines;
use crate::taxonomy::TaxonomyStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskOptions {
    /// Keep the parent taxid itself when it appears among the candidates.
    pub include_parent: bool,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self { include_parent: true }
    }
}

/// Taxids kept in the mask, and candidates skipped as unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mask {
    pub entries: Vec<String>,
    pub skipped: Vec<String>,
}

/// Read a taxid list (header line first, then one taxid per line).
/// Duplicates are collapsed, keeping the first occurrence.
pub fn read_candidate_taxids<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut seen = AHashSet::new();
    let mut taxids = Vec::new();

    for line in numbered_lines(reader).skip(1) {
        let (line_no, line) = line?;
        let taxid = line.trim();
        if taxid.is_empty() {
            continue;
        }
        if taxid.contains(char::is_whitespace) {
            return Err(Error::InvalidField {
                line: line_no,
                field: "taxid",
                value: taxid.to_string(),
            });
        }
        if seen.insert(taxid.to_string()) {
            taxids.push(taxid.to_string());
        }
    }

    Ok(taxids)
}

/// Keep the candidates that descend from `parent`.
///
/// An unknown `parent` aborts; an unknown candidate is logged and skipped.
pub fn filter_descendants<S: TaxonomyStore + ?Sized>(
    store: &S,
    candidates: &[String],
    parent: &str,
    options: &MaskOptions,
) -> Result<Mask> {
    let parent = parent.trim();
    if !store.contains(parent) {
        return Err(Error::unknown(parent));
    }

    let mut mask = Mask::default();
    for candidate in candidates {
        if options.include_parent && candidate == parent {
            mask.entries.push(candidate.clone());
            continue;
        }
        match store.is_descendant_of(candidate, parent) {
            Ok(true) => mask.entries.push(candidate.clone()),
            Ok(false) => {}
            Err(e) if e.is_lookup_miss() => {
                log::warn!("taxid {} missing from Taxonomy reference, it will be ignored", candidate);
                mask.skipped.push(candidate.clone());
            }
            Err(e) => return Err(e),
        }
    }

    log::info!(
        "{} of {} taxids descend from {} ({} unknown)",
        mask.entries.len(),
        candidates.len(),
        parent,
        mask.skipped.len()
    );
    Ok(mask)
}

/// Newline-delimited taxids, no header.
pub fn write_mask<W: Write>(out: &mut W, entries: &[String]) -> io::Result<()> {
    for taxid in entries {
        writeln!(out, "{}", taxid)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxdb::tests::test_taxdump;
    use std::io::Cursor;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reads_and_deduplicates_candidates() {
        let list = "taxid\n9913\n 9940 \n\n9913\n10090\n";
        let taxids = read_candidate_taxids(Cursor::new(list)).unwrap();
        assert_eq!(taxids, vec!["9913", "9940", "10090"]);
    }

    #[test]
    fn multi_field_line_is_fatal() {
        let err = read_candidate_taxids(Cursor::new("taxid\n9913\n9940\textra\n")).unwrap_err();
        assert!(matches!(err, Error::InvalidField { line: 3, .. }));
    }

    #[test]
    fn keeps_descendants_in_input_order() {
        let txd = test_taxdump();
        let candidates = ids(&["10090", "9940", "9913", "9895", "40674"]);
        let mask = filter_descendants(&txd, &candidates, "9895", &MaskOptions::default()).unwrap();
        assert_eq!(mask.entries, vec!["9940", "9913", "9895"]);
        assert!(mask.skipped.is_empty());
    }

    #[test]
    fn parent_itself_can_be_excluded() {
        let txd = test_taxdump();
        let candidates = ids(&["9895", "9913"]);
        let options = MaskOptions { include_parent: false };
        let mask = filter_descendants(&txd, &candidates, "9895", &options).unwrap();
        assert_eq!(mask.entries, vec!["9913"]);
    }

    #[test]
    fn unknown_candidates_are_skipped() {
        let txd = test_taxdump();
        let candidates = ids(&["9913", "777", "9940"]);
        let mask = filter_descendants(&txd, &candidates, "9903", &MaskOptions::default()).unwrap();
        assert_eq!(mask.entries, vec!["9913"]);
        assert_eq!(mask.skipped, vec!["777"]);
    }

    #[test]
    fn root_parent_keeps_every_known_candidate() {
        let txd = test_taxdump();
        let candidates = ids(&["1", "9913", "404", "10090", "2759"]);
        let mask = filter_descendants(&txd, &candidates, "1", &MaskOptions::default()).unwrap();
        assert_eq!(mask.entries, vec!["1", "9913", "10090", "2759"]);
        assert_eq!(mask.skipped, vec!["404"]);
    }

    #[test]
    fn unknown_parent_is_fatal() {
        let txd = test_taxdump();
        let err = filter_descendants(&txd, &ids(&["9913"]), "8888", &MaskOptions::default()).unwrap_err();
        assert!(err.is_lookup_miss());
    }

    #[test]
    fn writes_one_taxid_per_line() {
        let mut buf = Vec::new();
        write_mask(&mut buf, &ids(&["9913", "9940"])).unwrap();
        assert_eq!(buf, b"9913\n9940\n");
    }
}
