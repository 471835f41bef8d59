//! Error taxonomy for the marshalling engine.
//!
//! Two failure classes exist:
//!
//! - [`ConfigError`]: a table definition string is malformed. Raised while a
//!   schema is being built, so a bad definition stops initialization before
//!   any request is served.
//! - [`DataError`]: a single payload (row, date, attribute entry) cannot be
//!   decoded. Aborts the decode of the attribute or table it belongs to.
//!
//! A filter that has no native representation is not an error: the
//! translator returns `None` and the caller falls back to in-memory
//! evaluation.

/// Malformed table definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("table definition '{definition}' must contain exactly one '=' (found {segments} segments)")]
    SegmentCount { definition: String, segments: usize },
    #[error("column '{column}' has invalid length '{length}'")]
    InvalidLength { column: String, length: String },
    #[error("column '{column}' has unknown role '{role}' (expected KEY or IGNORE)")]
    UnknownRole { column: String, role: String },
    #[error("table definition '{definition}' does not name a table")]
    MissingTableName { definition: String },
    #[error("column definition '{definition}' must be NAME:LENGTH[:ROLE]")]
    MalformedColumn { definition: String },
    #[error("table '{table}' defines no columns")]
    NoColumns { table: String },
    #[error("table '{table}' defines no KEY column")]
    NoKeyColumn { table: String },
    #[error("unknown table option '{option}' in '{definition}'")]
    UnknownOption { option: String, definition: String },
    #[error("unknown sub-table format '{format}' (expected TSV or XML)")]
    UnknownFormat { format: String },
    #[error("sub-table '{table}' does not name its root table")]
    MissingRootTable { table: String },
    #[error("sub-table '{table}' refers to unknown root table '{root}'")]
    UnknownRootTable { table: String, root: String },
    #[error("table '{table}' is defined more than once")]
    DuplicateTable { table: String },
}

/// Malformed per-row or per-attribute payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    #[error("expected exactly one <item> root element, found {count} in '{payload}'")]
    RootElementCount { count: usize, payload: String },
    #[error("malformed row payload '{payload}': {reason}")]
    MalformedXml { payload: String, reason: String },
    #[error("invalid date '{value}' (expected yyyy-MM-dd)")]
    InvalidDate { value: String },
    #[error("invalid decimal '{value}'")]
    InvalidDecimal { value: String },
    #[error("invalid binary value '{value}' (expected hex)")]
    InvalidBinary { value: String },
    #[error("attribute '{attribute}' contains a null value")]
    NullValue { attribute: String },
    #[error("compact value '{value}' has an empty name")]
    EmptyName { value: String },
}
