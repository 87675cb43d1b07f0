//src/consensus.rs

use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::hits::CandidateSet;
use crate::io::write_tsv_row;
use crate::taxonomy::TaxonomyStore;
use crate::types::{ConsensusRow, DroppedTaxid, CONSENSUS_HEADER};

/// Consensus rows in first-seen query order, plus every candidate taxid that
/// had to be dropped because the taxonomy does not know it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsensusReport {
    pub rows: Vec<ConsensusRow>,
    pub dropped: Vec<DroppedTaxid>,
}

impl ConsensusReport {
    pub fn undetermined_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_undetermined()).count()
    }
}

fn consensus_row<S: TaxonomyStore + ?Sized>(store: &S, query_id: &str, lca: &str) -> Result<ConsensusRow> {
    Ok(ConsensusRow {
        query_id: query_id.to_string(),
        name: store.name(lca)?.to_string(),
        rank: store.rank(lca)?.to_string(),
        tax_id: lca.to_string(),
    })
}

/// Resolve the consensus taxon of one query.
///
/// If the LCA lookup fails because some candidates are unknown, those
/// candidates are logged, recorded in `dropped` and the LCA is recomputed on
/// the known remainder. With no known candidate left, or when the candidates
/// share no ancestor at all, the query is `Undetermined`.
pub fn resolve_query<S: TaxonomyStore + ?Sized>(
    store: &S,
    query_id: &str,
    candidates: &[String],
    dropped: &mut Vec<DroppedTaxid>,
) -> Result<ConsensusRow> {
    if candidates.is_empty() {
        log::warn!("query {} has no candidate taxid, it is Undetermined", query_id);
        return Ok(ConsensusRow::undetermined(query_id));
    }

    let taxids: Vec<&str> = candidates.iter().map(String::as_str).collect();
    let lca = match store.lowest_common_ancestor(&taxids) {
        Err(Error::UnknownTaxids(_)) => {
            let (known, missing): (Vec<&str>, Vec<&str>) =
                taxids.iter().partition(|t| store.contains(t));

            for taxid in missing {
                log::warn!(
                    "taxid {} missing from Taxonomy reference, it will be ignored (query {})",
                    taxid,
                    query_id
                );
                dropped.push(DroppedTaxid {
                    query_id: query_id.to_string(),
                    tax_id: taxid.to_string(),
                });
            }

            if known.is_empty() {
                return Ok(ConsensusRow::undetermined(query_id));
            }
            log::debug!("query {}: recomputing consensus from {} known taxids", query_id, known.len());
            store.lowest_common_ancestor(&known)
        }
        other => other,
    };

    match lca {
        Ok(lca) => consensus_row(store, query_id, &lca),
        Err(Error::NoCommonAncestor(ids)) => {
            log::warn!(
                "query {}: taxids {} share no common ancestor, it is Undetermined",
                query_id,
                ids.join(";")
            );
            Ok(ConsensusRow::undetermined(query_id))
        }
        Err(e) => Err(e),
    }
}

/// Resolve every query of `candidates`, in first-seen order.
pub fn resolve_consensus<S: TaxonomyStore + ?Sized>(
    store: &S,
    candidates: &CandidateSet,
) -> Result<ConsensusReport> {
    let mut report = ConsensusReport {
        rows: Vec::with_capacity(candidates.len()),
        dropped: Vec::new(),
    };

    for (query_id, taxids) in candidates.iter() {
        let row = resolve_query(store, query_id, taxids, &mut report.dropped)?;
        report.rows.push(row);
    }

    Ok(report)
}

/// Write the consensus table: header `queryID\tConsensus\tRank\tTaxid`,
/// then one row per query.
pub fn write_consensus<W: Write>(out: &mut W, rows: &[ConsensusRow]) -> io::Result<()> {
    write_tsv_row(out, &CONSENSUS_HEADER)?;
    for row in rows {
        write_tsv_row(out, &row.fields())?;
    }
    Ok(())
}
