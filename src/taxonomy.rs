//src/taxonomy.rs

use crate::error::Result;

/// Ranks projected into Krona tables, most specific first.
pub const CANONICAL_RANKS: [&str; 7] = [
    "species", "genus", "family", "order", "class", "phylum", "kingdom",
];

/// Name used in a rank-filtered lineage when no ancestor carries that rank.
pub const MISSING_RANK_PLACEHOLDER: &str = "Unknown";

/// Whether a lineage is reported as display names or as taxids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineageMode {
    Names,
    Taxids,
}

/// Direction of a lineage. Callers always pick one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineageOrder {
    /// Starting at the queried taxon, ending at the root
    /// (for a rank filter: in the filter's own order).
    LeafToRoot,
    /// Reverse of `LeafToRoot`.
    RootToLeaf,
}

/// Read-only queries the consensus, lineage and mask algorithms need from a
/// taxonomy. Taxids are opaque strings.
///
/// Every lookup on an identifier absent from the store fails with
/// [`Error::UnknownTaxids`](crate::error::Error::UnknownTaxids).
pub trait TaxonomyStore {
    fn contains(&self, taxid: &str) -> bool;

    fn rank(&self, taxid: &str) -> Result<&str>;

    fn name(&self, taxid: &str) -> Result<&str>;

    /// Ancestor chain of `taxid`.
    ///
    /// Without a rank filter this is every node from `taxid` (inclusive) to
    /// the root. With a filter there is exactly one entry per requested rank,
    /// [`MISSING_RANK_PLACEHOLDER`] standing in for absent ranks.
    fn lineage(
        &self,
        taxid: &str,
        ranks: Option<&[&str]>,
        mode: LineageMode,
        order: LineageOrder,
    ) -> Result<Vec<String>>;

    /// Deepest node that is an ancestor (or self) of every taxid in `taxids`.
    /// The result does not depend on the order of `taxids`.
    fn lowest_common_ancestor(&self, taxids: &[&str]) -> Result<String>;

    /// True when `parent` lies strictly above `candidate` on its ancestor chain.
    fn is_descendant_of(&self, candidate: &str, parent: &str) -> Result<bool>;
}
