//! `idbridge` Core: marshalling and filter translation between a generic
//! attribute model and a fixed-record business system.
//!
//! - [`filter`]: predicate trees to the native selection algebra
//! - [`row`] / [`table`]: `item` rows and multi-valued attributes
//! - [`schema`]: fixed-width table definitions and record decoding
//! - [`compact`]: `name|from|to` triples
//!
//! Everything here is synchronous and pure; no I/O happens in this crate.

pub mod compact;
pub mod error;
pub mod filter;
pub mod predicate;
pub mod row;
pub mod schema;
pub mod table;
pub mod types;

pub use compact::CompactEntry;
pub use error::{ConfigError, DataError};
pub use filter::{EntityKind, FilterModel, FilterTranslator, NativeAllowList, SelectionRow};
pub use predicate::{CompareOp, Condition, Predicate};
pub use row::{Row, RowMode};
pub use schema::{ColumnRole, ColumnSpec, SubTableFormat, SubTableSchema, TableSchema};
pub use table::Table;
pub use types::{Attribute, Entity, Value, ValueKind};
