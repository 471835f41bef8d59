use async_trait::async_trait;
use idbridge_core::{SelectionRow, ValueKind};

use crate::update::ChangeRequest;

/// One raw row of a table parameter: `(field, value)` pairs in source order.
pub type RawRow = Vec<(String, String)>;

/// Which accounts a list call should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSelection<'a> {
    All,
    /// Identifiers matching a wildcard pattern.
    IdPattern(&'a str),
    /// Native selection rows.
    Rows(&'a [SelectionRow]),
}

/// Everything the remote system returns for a single account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountDetail {
    /// Scalar export fields keyed `PARAM.FIELD`, raw wire strings.
    pub scalars: Vec<(String, String)>,
    /// Table parameters by name.
    pub tables: Vec<(String, Vec<RawRow>)>,
}

impl AccountDetail {
    /// Rows of the named table parameter; empty if it was not returned.
    #[must_use]
    pub fn table(&self, parameter: &str) -> &[RawRow] {
        self.tables
            .iter()
            .find(|(name, _)| name == parameter)
            .map_or(&[][..], |(_, rows)| rows.as_slice())
    }
}

/// Remote function calls of the external system.
/// Implementations own sessions, connections and transactions.
#[async_trait]
pub trait RemoteFunctions: Send + Sync {
    /// List account identifiers.
    async fn list_accounts(&self, selection: AccountSelection<'_>) -> anyhow::Result<Vec<String>>;

    /// Fetch one account. `None` if it does not exist.
    async fn get_account(&self, id: &str) -> anyhow::Result<Option<AccountDetail>>;

    /// Read fixed-width records of a flat table.
    ///
    /// `options` are `FIELD = 'VALUE'` clauses joined with `AND`; `fields`
    /// selects and orders the returned columns.
    async fn read_table(
        &self,
        table: &str,
        options: &[String],
        fields: &[&str],
    ) -> anyhow::Result<Vec<String>>;

    /// Submit a change request for one account.
    async fn submit(&self, request: &ChangeRequest) -> anyhow::Result<()>;
}

/// Field metadata of one structure or table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    /// One-letter wire type code.
    pub wire_type: String,
    pub length: usize,
}

impl FieldDescriptor {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        ValueKind::from_wire_type(&self.wire_type)
    }
}

/// Schema introspection: field lists of remote structures and tables.
pub trait FieldCatalog: Send + Sync {
    /// Fields of `structure`, empty if unknown.
    fn fields(&self, structure: &str) -> Vec<FieldDescriptor>;
}
