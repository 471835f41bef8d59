//! Multi-valued attribute codec.
//!
//! A [`Table`] is the list of rows behind one multi-valued attribute (for
//! example the role assignments of an account) together with a `changed`
//! flag:
//!
//! - read from the wire, a table is a snapshot and is never `changed`;
//! - built from a change request, `changed` is true exactly when the attribute
//!   was present in the request, however many values it carried.
//!
//! An absent attribute therefore means "leave untouched", while a present
//! attribute with no values means "clear".

use tracing::debug;

use crate::compact::CompactEntry;
use crate::error::DataError;
use crate::row::{Row, RowMode};
use crate::types::{parse_optional_date, Attribute};

/// Ordered rows plus the change flag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    rows: Vec<Row>,
    changed: bool,
}

impl Table {
    /// Builds a read-only snapshot from raw wire rows.
    ///
    /// Each inner iterator yields the `(field, value)` pairs of one row in
    /// source order.
    pub fn from_wire<I, R, K, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            rows: rows.into_iter().map(Row::encode).collect(),
            changed: false,
        }
    }

    /// Builds a table from a change-request attribute set.
    ///
    /// The attribute named `base` (or the first one named `base.<sub>`) is
    /// decoded value by value: values starting with an XML prolog are full
    /// records, anything else is the bare value of `key_field`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::NullValue`] on a null entry and propagates row
    /// decode failures. The first bad value aborts the whole table.
    pub fn from_attributes(
        attributes: &[Attribute],
        base: &str,
        key_field: &str,
    ) -> Result<Self, DataError> {
        let Some(attribute) = find_attribute(attributes, base) else {
            return Ok(Self::default());
        };

        let rows = attribute
            .values
            .iter()
            .map(|value| {
                let value = value.as_deref().ok_or_else(|| DataError::NullValue {
                    attribute: base.to_string(),
                })?;
                Row::decode(value, RowMode::detect(value), key_field)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(attribute = base, rows = rows.len(), "decoded change-request table");
        Ok(Self {
            rows,
            changed: true,
        })
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Canonical serialized form of every row.
    #[must_use]
    pub fn serialized_rows(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.serialized().to_string()).collect()
    }

    /// Projection of one field across all rows. Rows without the field are
    /// skipped.
    #[must_use]
    pub fn column_values(&self, column: &str) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|r| r.field(column))
            .map(str::to_string)
            .collect()
    }

    /// Renders every row as a compact `name|from|to` triple.
    ///
    /// Rows without a `name_field` value are skipped; blank and all-zero date
    /// fields serialize as empty segments.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidDate`] if a date field does not parse.
    pub fn compact_values(
        &self,
        name_field: &str,
        from_field: &str,
        to_field: &str,
    ) -> Result<Vec<String>, DataError> {
        let optional_date = |row: &Row, field: &str| {
            row.field(field).map_or(Ok(None), parse_optional_date)
        };

        let mut out = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let Some(name) = row.field(name_field).filter(|n| !n.is_empty()) else {
                continue;
            };
            let entry = CompactEntry::new(
                name,
                optional_date(row, from_field)?,
                optional_date(row, to_field)?,
            );
            out.push(entry.to_compact());
        }
        Ok(out)
    }
}

fn find_attribute<'a>(attributes: &'a [Attribute], base: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.name == base).or_else(|| {
        attributes.iter().find(|a| {
            a.name
                .strip_prefix(base)
                .is_some_and(|rest| rest.starts_with('.'))
        })
    })
}
