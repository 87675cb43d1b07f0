// src/lib.rs
pub mod consensus;
pub mod error;
pub mod hits;
pub mod io;
pub mod lineage;
pub mod mask;
pub mod taxdb;
pub mod taxonomy;
pub mod types;

use std::io::Write;
use std::path::{Path, PathBuf};

pub use crate::consensus::ConsensusReport;
pub use crate::error::{Error, Result};
pub use crate::hits::{CandidateSet, HitReportSchema};
pub use crate::lineage::LineagePolicy;
pub use crate::mask::{Mask, MaskOptions};
pub use crate::taxdb::Taxdump;
pub use crate::taxonomy::TaxonomyStore;

use crate::consensus::{resolve_consensus, write_consensus};
use crate::hits::read_hit_report;
use crate::io::{create_writer, open_reader};
use crate::lineage::{expand_lineages, write_krona_table};
use crate::mask::{filter_descendants, read_candidate_taxids, write_mask};

/// Where the reference taxonomy is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonomySource {
    /// NCBI new_taxdump `nodes.dmp` + `rankedlineage.dmp`.
    Ncbi {
        nodes: PathBuf,
        rankedlineage: PathBuf,
    },
    /// Flat `taxid\tparent\tname\trank` file.
    TaxDb(PathBuf),
}

impl TaxonomySource {
    pub fn load(&self) -> Result<Taxdump> {
        match self {
            TaxonomySource::Ncbi { nodes, rankedlineage } => Taxdump::from_ncbi(nodes, rankedlineage),
            TaxonomySource::TaxDb(path) => Taxdump::from_taxdb(path),
        }
    }
}

/// Hit report -> consensus table.
pub fn consensus_from_hits<S: TaxonomyStore + ?Sized>(
    store: &S,
    hit_report: &Path,
    output: &Path,
    schema: &HitReportSchema,
) -> Result<ConsensusReport> {
    let candidates = read_hit_report(hit_report, schema)?;
    let report = resolve_consensus(store, &candidates)?;

    let mut out = create_writer(output)?;
    write_consensus(&mut out, &report.rows)?;
    out.flush()?;

    log::info!(
        "Wrote consensus for {} queries to {} ({} undetermined, {} taxids dropped)",
        report.rows.len(),
        output.display(),
        report.undetermined_count(),
        report.dropped.len()
    );
    Ok(report)
}

/// Count table -> Krona text input. Returns the number of rows written.
pub fn krona_table<S: TaxonomyStore + ?Sized>(
    store: &S,
    count_table: &Path,
    output: &Path,
    policy: LineagePolicy,
) -> Result<usize> {
    let rows = expand_lineages(open_reader(count_table)?, store, policy)?;

    let mut out = create_writer(output)?;
    write_krona_table(&mut out, &rows)?;
    out.flush()?;

    log::info!("Wrote {} lineage rows to {}", rows.len(), output.display());
    Ok(rows.len())
}

/// Database taxid list -> taxids descending from `parent`.
pub fn blast_mask<S: TaxonomyStore + ?Sized>(
    store: &S,
    taxid_list: &Path,
    parent: &str,
    output: &Path,
    options: &MaskOptions,
) -> Result<Mask> {
    let candidates = read_candidate_taxids(open_reader(taxid_list)?)?;
    let mask = filter_descendants(store, &candidates, parent, options)?;

    let mut out = create_writer(output)?;
    write_mask(&mut out, &mask.entries)?;
    out.flush()?;
    Ok(mask)
}
