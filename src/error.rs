//src/error.rs

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A taxonomy dump line that could not be parsed.
    #[error("{}:{line}: {msg}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    /// A row of a tabular input (hit report, count table, mask list) that
    /// does not match its schema.
    #[error("malformed row at line {line}: expected at least {expected} fields, found {found}")]
    MalformedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid {field} value '{value}'")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("missing column '{0}' in header")]
    MissingColumn(&'static str),

    /// Lookup-miss: one or more taxids are absent from the taxonomy.
    #[error("taxid(s) missing from taxonomy reference: {}", .0.join(", "))]
    UnknownTaxids(Vec<String>),

    #[error("lowest common ancestor requested for an empty taxid set")]
    EmptyTaxidSet,

    /// The taxids sit in disconnected trees of a malformed taxonomy.
    #[error("no common ancestor for taxids: {}", .0.join(", "))]
    NoCommonAncestor(Vec<String>),
}

impl Error {
    pub fn unknown(taxid: &str) -> Self {
        Error::UnknownTaxids(vec![taxid.to_string()])
    }

    pub fn is_lookup_miss(&self) -> bool {
        matches!(self, Error::UnknownTaxids(_))
    }
}
