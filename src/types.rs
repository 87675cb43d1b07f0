//src/types.rs

/// Consensus triple written when no candidate taxid is known to the taxonomy.
pub const UNDETERMINED: &str = "Undetermined";

/// Taxid placeholder in count tables for sequences without an assignment.
pub const UNASSIGNED_TAXID: &str = "-";

/// Lineage emitted for [`UNASSIGNED_TAXID`] rows.
pub const UNASSIGNED: &str = "Unassigned";

/// Header of the consensus table.
pub const CONSENSUS_HEADER: [&str; 4] = ["queryID", "Consensus", "Rank", "Taxid"];

/// A structured representation of one row of the consensus table:
///  queryID  Consensus  Rank  Taxid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusRow {
    pub query_id: String,
    pub name: String,
    pub rank: String,
    pub tax_id: String,
}

impl ConsensusRow {
    pub fn undetermined(query_id: &str) -> Self {
        Self {
            query_id: query_id.to_string(),
            name: UNDETERMINED.to_string(),
            rank: UNDETERMINED.to_string(),
            tax_id: UNDETERMINED.to_string(),
        }
    }

    pub fn is_undetermined(&self) -> bool {
        self.tax_id == UNDETERMINED
    }

    pub fn fields(&self) -> [&str; 4] {
        [
            self.query_id.as_str(),
            self.name.as_str(),
            self.rank.as_str(),
            self.tax_id.as_str(),
        ]
    }
}

/// A candidate taxid dropped from a query because the taxonomy does not know it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedTaxid {
    pub query_id: String,
    pub tax_id: String,
}

/// One row of a Krona input table: a count followed by the lineage names,
/// kingdom first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageRow {
    pub count: String,
    pub lineage: Vec<String>,
}

impl LineageRow {
    pub fn unassigned(count: &str) -> Self {
        Self {
            count: count.to_string(),
            lineage: vec![UNASSIGNED.to_string()],
        }
    }
}
