use thiserror::Error;

// ---------------------------------------------------------------------------
// Extraction errors
// ---------------------------------------------------------------------------

/// Why a single data row could not be turned into numbers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowFault {
    #[error("column '{column}': '{value}' is not a number")]
    NotNumeric { column: String, value: String },

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
}

/// Failures of header discovery and table parsing.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("header row starting with '{marker}' not found")]
    HeaderNotFound { marker: String },

    #[error("input is not valid Shift-JIS text")]
    Decode,

    /// `row` is the 0-based data row index, `line` the 1-based file line.
    #[error("data row {row} (line {line}): {fault}")]
    MalformedRow {
        row: usize,
        line: usize,
        fault: RowFault,
    },

    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("column '{name}' has {found} values, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
