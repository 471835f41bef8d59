//! Fixed-width table schemas.
//!
//! Flat tables of the external system are read as fixed-width string
//! records. A one-line definition assigns each byte range to a named column:
//!
//! ```text
//! AGR_DEFINE as roles = MANDT:3:IGNORE,AGR_NAME:30:KEY,PARENT_AGR:30
//! ```
//!
//! Columns are laid out back to back, so `offset[i]` is the sum of the
//! lengths of all preceding columns. `KEY` columns form the record's
//! composite identifier, `IGNORE` columns are dropped, every other column is
//! emitted as an attribute.
//!
//! Sub-tables use an extended header and may pin a column to a constant:
//!
//! ```text
//! AGR_TEXTS for AGR_DEFINE format TSV = MANDT:3:IGNORE,AGR_NAME:30:KEY,SPRAS:1("E"),TEXT:80
//! ```
//!
//! All parse failures are [`ConfigError`]s and surface while the schema is
//! built, never while records are decoded.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, DataError};
use crate::row::Row;
use crate::types::{Entity, Value, ValueKind};

/// Separator between the parts of a composite identifier.
pub const KEY_SEPARATOR: &str = ":";

/// `LENGTH` or `LENGTH("constant")`.
static LENGTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\d+)(?:\("([^"]*)"\))?$"#).expect("length pattern is valid")
});

/// Role of a column within a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    Output,
    Ignore,
    Key,
}

/// One fixed-width column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub offset: usize,
    pub length: usize,
    pub role: ColumnRole,
    /// Fixed value the column must hold; pushed down as a read filter.
    pub constant: Option<String>,
    pub kind: ValueKind,
}

/// Parsed definition of a primary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub alias: String,
    pub columns: Vec<ColumnSpec>,
    pub key_names: Vec<String>,
    pub ignore_names: Vec<String>,
}

/// Output format of the rows of a sub-table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubTableFormat {
    /// Output values joined by tabs.
    Tsv,
    /// Canonical `item` row.
    Xml,
}

/// Parsed definition of a sub-table attached to a root table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTableSchema {
    pub table: TableSchema,
    pub root_table: String,
    pub format: SubTableFormat,
}

/// One decoded sub-table record: the identifier of the root record it
/// belongs to and its formatted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTableRow {
    pub parent_id: String,
    pub value: String,
}

struct Header {
    name: String,
    alias: Option<String>,
    root_table: Option<String>,
    format: Option<SubTableFormat>,
}

impl TableSchema {
    /// Parses a primary table definition.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a wrong `=` count, a malformed column,
    /// a non-integer length, an unknown role, no columns, or no `KEY` column.
    ///
    /// # Examples
    ///
    /// ```
    /// use idbridge_core::schema::TableSchema;
    ///
    /// let definition = "AGR_DEFINE = MANDT:3:IGNORE,AGR_NAME:30:KEY,PARENT_AGR:30";
    /// let schema = TableSchema::parse(definition).unwrap();
    /// assert_eq!(schema.total_width(), 63);
    /// assert_eq!(schema.key_names, vec!["AGR_NAME"]);
    /// ```
    pub fn parse(definition: &str) -> Result<Self, ConfigError> {
        let (header, body) = split_definition(definition)?;
        let header = parse_header(header, definition, false)?;
        Self::finish(header.name, header.alias, body)
    }

    /// Parses a bare column list for a table whose name is known separately.
    ///
    /// # Errors
    ///
    /// Same as [`TableSchema::parse`], minus the header checks.
    pub fn from_columns(name: &str, columns: &str) -> Result<Self, ConfigError> {
        Self::finish(name.to_string(), None, columns.trim())
    }

    fn finish(name: String, alias: Option<String>, body: &str) -> Result<Self, ConfigError> {
        let columns = parse_columns(&name, body, false)?;
        let schema = Self::build(name, alias, columns)?;
        if schema.key_names.is_empty() {
            return Err(ConfigError::NoKeyColumn { table: schema.name });
        }
        debug!(
            table = %schema.name,
            columns = schema.columns.len(),
            width = schema.total_width(),
            "parsed table schema"
        );
        Ok(schema)
    }

    fn build(
        name: String,
        alias: Option<String>,
        columns: Vec<(String, usize, ColumnRole, Option<String>)>,
    ) -> Result<Self, ConfigError> {
        if columns.is_empty() {
            return Err(ConfigError::NoColumns { table: name });
        }

        let mut offset: usize = 0;
        let mut specs = Vec::with_capacity(columns.len());
        for (col_name, length, role, constant) in columns {
            let next = offset
                .checked_add(length)
                .ok_or_else(|| ConfigError::InvalidLength {
                    column: col_name.clone(),
                    length: length.to_string(),
                })?;
            specs.push(ColumnSpec {
                name: col_name,
                offset,
                length,
                role,
                constant,
                kind: ValueKind::Text,
            });
            offset = next;
        }

        let names_with = |role: ColumnRole| {
            specs
                .iter()
                .filter(|c| c.role == role)
                .map(|c| c.name.clone())
                .collect::<Vec<_>>()
        };
        let key_names = names_with(ColumnRole::Key);
        let ignore_names = names_with(ColumnRole::Ignore);

        Ok(Self {
            alias: alias.unwrap_or_else(|| name.clone()),
            name,
            columns: specs,
            key_names,
            ignore_names,
        })
    }

    /// Assigns value kinds to output columns, typically from the field
    /// catalog of the table. Columns the lookup does not know stay text.
    #[must_use]
    pub fn with_kinds(mut self, lookup: impl Fn(&str) -> Option<ValueKind>) -> Self {
        for column in &mut self.columns {
            if let Some(kind) = lookup(&column.name) {
                column.kind = kind;
            }
        }
        self
    }

    /// Sum of all column lengths.
    #[must_use]
    pub fn total_width(&self) -> usize {
        self.columns.iter().map(|c| c.length).sum()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Names of all columns in record order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// `(column, constant)` pairs every record must satisfy.
    #[must_use]
    pub fn filter_constants(&self) -> Vec<(&str, &str)> {
        self.columns
            .iter()
            .filter_map(|c| c.constant.as_deref().map(|k| (c.name.as_str(), k)))
            .collect()
    }

    /// Decodes one fixed-width record.
    ///
    /// Returns `Ok(None)` when the record has no usable identifier (all key
    /// slices blank) or violates a constant column; such records are skipped,
    /// not errors.
    ///
    /// # Errors
    ///
    /// Returns a [`DataError`] if an output column does not decode as its
    /// assigned value kind.
    pub fn decode(&self, record: &str) -> Result<Option<Entity>, DataError> {
        let Some(slices) = self.slice(record) else {
            return Ok(None);
        };

        let mut key_parts = Vec::new();
        let mut attributes = Vec::new();
        for (column, slice) in self.columns.iter().zip(slices) {
            if column.constant.is_some() {
                continue;
            }
            match column.role {
                ColumnRole::Ignore => {}
                ColumnRole::Key => {
                    if !slice.is_empty() {
                        key_parts.push(slice);
                    }
                }
                ColumnRole::Output => {
                    let values = match column.kind.decode(&slice)? {
                        Value::Null => Vec::new(),
                        Value::Text(t) if t.is_empty() => Vec::new(),
                        value => vec![value],
                    };
                    attributes.push((column.name.clone(), values));
                }
            }
        }

        let id = key_parts.join(KEY_SEPARATOR);
        if id.is_empty() {
            debug!(table = %self.name, "skipping record without identifier");
            return Ok(None);
        }
        Ok(Some(Entity::new(id, attributes)))
    }

    /// Cuts a record into trimmed column slices. Missing trailing characters
    /// read as blank. Returns `None` if a constant column does not match.
    fn slice(&self, record: &str) -> Option<Vec<String>> {
        let chars: Vec<char> = record.chars().collect();
        let mut slices = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let start = column.offset.min(chars.len());
            let end = (column.offset + column.length).min(chars.len());
            let slice: String = chars[start..end].iter().collect();
            let slice = slice.trim().to_string();
            if let Some(constant) = &column.constant {
                if &slice != constant {
                    debug!(table = %self.name, column = %column.name, "constant mismatch");
                    return None;
                }
            }
            slices.push(slice);
        }
        Some(slices)
    }
}

impl SubTableSchema {
    /// Parses an extended sub-table definition.
    ///
    /// The header accepts ` for <root>`, ` format <TSV|XML>` and
    /// ` as <alias>` in any order; column lengths may carry a constant as
    /// `LENGTH("value")`. A root table is required; the format defaults to
    /// TSV. At least one key column is required: it links each record to its
    /// root record.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for any malformed header or column, and
    /// [`ConfigError::NoKeyColumn`] when no column is a key.
    pub fn parse(definition: &str) -> Result<Self, ConfigError> {
        let (header, body) = split_definition(definition)?;
        let header = parse_header(header, definition, true)?;
        let root_table = header
            .root_table
            .ok_or_else(|| ConfigError::MissingRootTable {
                table: header.name.clone(),
            })?;
        let columns = parse_columns(&header.name, body, true)?;
        let table = TableSchema::build(header.name, header.alias, columns)?;
        if table.key_names.is_empty() {
            return Err(ConfigError::NoKeyColumn { table: table.name });
        }
        Ok(Self {
            table,
            root_table,
            format: header.format.unwrap_or(SubTableFormat::Tsv),
        })
    }

    /// Decodes one record into the identifier of its root record and the
    /// formatted output values.
    ///
    /// # Errors
    ///
    /// Returns a [`DataError`] if an output column does not decode.
    pub fn decode(&self, record: &str) -> Result<Option<SubTableRow>, DataError> {
        let Some(entity) = self.table.decode(record)? else {
            return Ok(None);
        };

        let outputs = entity.attributes.into_iter().map(|(name, values)| {
            let text = values
                .first()
                .and_then(Value::as_scalar)
                .unwrap_or_default();
            (name, text)
        });
        let value = match self.format {
            SubTableFormat::Tsv => outputs.map(|(_, v)| v).collect::<Vec<_>>().join("\t"),
            SubTableFormat::Xml => Row::encode(outputs).serialized().to_string(),
        };
        Ok(Some(SubTableRow {
            parent_id: entity.id,
            value,
        }))
    }
}

fn split_definition(definition: &str) -> Result<(&str, &str), ConfigError> {
    let segments: Vec<&str> = definition.split('=').collect();
    match segments.as_slice() {
        [header, body] => Ok((header.trim(), body.trim())),
        _ => Err(ConfigError::SegmentCount {
            definition: definition.to_string(),
            segments: segments.len(),
        }),
    }
}

fn parse_header(header: &str, definition: &str, extended: bool) -> Result<Header, ConfigError> {
    let mut tokens = header.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| ConfigError::MissingTableName {
            definition: definition.to_string(),
        })?
        .to_string();

    let mut parsed = Header {
        name,
        alias: None,
        root_table: None,
        format: None,
    };
    while let Some(keyword) = tokens.next() {
        let unknown = || ConfigError::UnknownOption {
            option: keyword.to_string(),
            definition: definition.to_string(),
        };
        let value = tokens.next().ok_or_else(unknown)?;
        match keyword {
            "as" => parsed.alias = Some(value.to_string()),
            "for" if extended => parsed.root_table = Some(value.to_string()),
            "format" if extended => {
                parsed.format = Some(match value.to_ascii_uppercase().as_str() {
                    "TSV" => SubTableFormat::Tsv,
                    "XML" => SubTableFormat::Xml,
                    _ => {
                        return Err(ConfigError::UnknownFormat {
                            format: value.to_string(),
                        })
                    }
                });
            }
            _ => return Err(unknown()),
        }
    }
    Ok(parsed)
}

fn parse_columns(
    table: &str,
    body: &str,
    allow_constants: bool,
) -> Result<Vec<(String, usize, ColumnRole, Option<String>)>, ConfigError> {
    let mut columns = Vec::new();
    for definition in body.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let parts: Vec<&str> = definition.split(':').map(str::trim).collect();
        let (name, length, role) = match parts.as_slice() {
            [name, length] => (*name, *length, None),
            [name, length, role] => (*name, *length, Some(*role)),
            _ => {
                return Err(ConfigError::MalformedColumn {
                    definition: definition.to_string(),
                })
            }
        };
        if name.is_empty() {
            return Err(ConfigError::MalformedColumn {
                definition: definition.to_string(),
            });
        }

        let invalid_length = || ConfigError::InvalidLength {
            column: name.to_string(),
            length: length.to_string(),
        };
        let caps = LENGTH_RE.captures(length).ok_or_else(invalid_length)?;
        let constant = caps.get(2).map(|m| m.as_str().to_string());
        if constant.is_some() && !allow_constants {
            return Err(invalid_length());
        }
        let width: usize = caps[1].parse().map_err(|_| invalid_length())?;
        if width == 0 {
            return Err(invalid_length());
        }

        let role = match role {
            None => ColumnRole::Output,
            Some("KEY") => ColumnRole::Key,
            Some("IGNORE") => ColumnRole::Ignore,
            Some(other) => {
                return Err(ConfigError::UnknownRole {
                    column: name.to_string(),
                    role: other.to_string(),
                })
            }
        };
        columns.push((name.to_string(), width, role, constant));
    }

    if columns.is_empty() {
        return Err(ConfigError::NoColumns {
            table: table.to_string(),
        });
    }
    Ok(columns)
}
