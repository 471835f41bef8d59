//! Parsed table schemas, built once at startup.

use std::collections::HashSet;

use idbridge_core::{ConfigError, SubTableSchema, TableSchema};
use tracing::info;

use crate::config::ConnectorConfig;
use crate::traits::FieldCatalog;

/// Every configured primary table and sub-table.
///
/// Building the catalog parses all definitions; the first malformed one
/// aborts construction.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: Vec<TableSchema>,
    sub_tables: Vec<SubTableSchema>,
}

impl SchemaCatalog {
    /// Parses the table definitions of `config`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, ConfigError> {
        Self::from_definitions(&config.tables, &config.sub_tables)
    }

    /// Parses primary and sub-table definitions.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a malformed definition, a table name or
    /// alias defined twice, or a sub-table whose root table is not defined.
    pub fn from_definitions(
        tables: &[String],
        sub_tables: &[String],
    ) -> Result<Self, ConfigError> {
        let tables = tables
            .iter()
            .map(|d| TableSchema::parse(d))
            .collect::<Result<Vec<_>, _>>()?;
        let sub_tables = sub_tables
            .iter()
            .map(|d| SubTableSchema::parse(d))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        for schema in tables.iter().chain(sub_tables.iter().map(|s| &s.table)) {
            let mut names = vec![schema.name.as_str()];
            if schema.alias != schema.name {
                names.push(schema.alias.as_str());
            }
            for name in names {
                if !seen.insert(name.to_string()) {
                    return Err(ConfigError::DuplicateTable {
                        table: name.to_string(),
                    });
                }
            }
        }

        for sub in &sub_tables {
            if !tables.iter().any(|t| t.name == sub.root_table) {
                return Err(ConfigError::UnknownRootTable {
                    table: sub.table.name.clone(),
                    root: sub.root_table.clone(),
                });
            }
        }

        info!(
            tables = tables.len(),
            sub_tables = sub_tables.len(),
            "schema catalog built"
        );
        Ok(Self { tables, sub_tables })
    }

    /// Assigns value kinds to every column from the remote field catalog.
    #[must_use]
    pub fn with_field_kinds(self, catalog: &dyn FieldCatalog) -> Self {
        let typed = |schema: TableSchema| {
            let fields = catalog.fields(&schema.name);
            schema.with_kinds(|column| {
                fields
                    .iter()
                    .find(|f| f.name == column)
                    .map(crate::traits::FieldDescriptor::kind)
            })
        };
        Self {
            tables: self.tables.into_iter().map(&typed).collect(),
            sub_tables: self
                .sub_tables
                .into_iter()
                .map(|sub| SubTableSchema {
                    table: typed(sub.table),
                    ..sub
                })
                .collect(),
        }
    }

    /// Primary table by name or alias.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.name == name || t.alias == name)
    }

    #[must_use]
    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    /// Sub-tables attached to the primary table named `root`.
    pub fn sub_tables_of<'a>(
        &'a self,
        root: &'a str,
    ) -> impl Iterator<Item = &'a SubTableSchema> + 'a {
        self.sub_tables.iter().filter(move |s| s.root_table == root)
    }
}
