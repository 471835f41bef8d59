//! Change requests: from a caller's attribute set to the remote update call.
//!
//! Scalars are addressed as `PARAM.FIELD` and travel with a change flag
//! (`PARAMX.FIELD = "X"`) so the remote side only touches what was sent.
//! Multi-valued attributes go through the table codec and are submitted only
//! when the attribute was present in the request.

use chrono::NaiveDate;
use idbridge_core::compact;
use idbridge_core::types::DATE_FORMAT;
use idbridge_core::{Attribute, DataError, Row, Table};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{ConnectorConfig, TableAttributeConfig};
use crate::error::ConnectorError;
use crate::traits::{RawRow, RemoteFunctions};

/// Value of every change flag.
pub const CHANGE_FLAG: &str = "X";

/// One scalar field to overwrite. An empty value clears the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalarChange {
    pub parameter: String,
    pub field: Option<String>,
    pub value: String,
}

/// Replacement rows of one table parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableChange {
    pub parameter: String,
    pub rows: Vec<RawRow>,
    pub changed: bool,
}

/// Everything submitted for one account in a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRequest {
    pub account: String,
    pub scalars: Vec<ScalarChange>,
    pub tables: Vec<TableChange>,
}

impl ChangeRequest {
    /// Flags marking every changed scalar field: the parameter name gets an
    /// `X` suffix and the value is [`CHANGE_FLAG`].
    #[must_use]
    pub fn change_flags(&self) -> Vec<ScalarChange> {
        self.scalars
            .iter()
            .map(|s| ScalarChange {
                parameter: format!("{}X", s.parameter),
                field: s.field.clone(),
                value: CHANGE_FLAG.to_string(),
            })
            .collect()
    }

    /// True if nothing would be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.tables.is_empty()
    }
}

/// Builds [`ChangeRequest`]s according to the connector configuration.
#[derive(Debug, Clone)]
pub struct ChangeRequestBuilder {
    identity_attribute: String,
    tables: Vec<TableAttributeConfig>,
}

impl ChangeRequestBuilder {
    #[must_use]
    pub fn new(config: &ConnectorConfig) -> Self {
        Self {
            identity_attribute: config.identity_attribute.clone(),
            tables: config.account_tables.clone(),
        }
    }

    /// Turns an attribute set into a change request for `account`.
    ///
    /// The identity attribute is never written. Attributes belonging to a
    /// configured table parameter (`PARAM`, `PARAM.<sub>`) become table
    /// changes; every other attribute is a scalar.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::MultiValuedScalar`] when a scalar carries
    /// more than one value, and [`ConnectorError::Data`] when a table value
    /// does not decode.
    pub fn build(
        &self,
        account: &str,
        attributes: &[Attribute],
    ) -> Result<ChangeRequest, ConnectorError> {
        let mut scalars = Vec::new();
        for attribute in attributes {
            if attribute.name == self.identity_attribute
                || self.table_for(&attribute.name).is_some()
            {
                continue;
            }
            scalars.push(scalar_change(attribute)?);
        }

        let mut tables = Vec::new();
        for config in &self.tables {
            let table = table_from_attributes(config, attributes)?;
            if !table.is_changed() {
                continue;
            }
            tables.push(TableChange {
                parameter: config.parameter.clone(),
                rows: table.rows().iter().map(|r| r.fields().to_vec()).collect(),
                changed: true,
            });
        }

        debug!(
            account,
            scalars = scalars.len(),
            tables = tables.len(),
            "built change request"
        );
        Ok(ChangeRequest {
            account: account.to_string(),
            scalars,
            tables,
        })
    }

    fn table_for(&self, attribute: &str) -> Option<&TableAttributeConfig> {
        self.tables.iter().find(|t| {
            attribute == t.parameter
                || attribute
                    .strip_prefix(t.parameter.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// Submits `request` unless it is empty. Returns whether a call was made.
///
/// # Errors
///
/// Returns [`ConnectorError::Remote`] if the remote call fails.
pub async fn submit(
    remote: &dyn RemoteFunctions,
    request: &ChangeRequest,
) -> Result<bool, ConnectorError> {
    if request.is_empty() {
        debug!(account = %request.account, "nothing to submit");
        return Ok(false);
    }
    remote.submit(request).await?;
    info!(
        account = %request.account,
        scalars = request.scalars.len(),
        tables = request.tables.len(),
        "submitted change request"
    );
    Ok(true)
}

fn scalar_change(attribute: &Attribute) -> Result<ScalarChange, ConnectorError> {
    if attribute.values.len() > 1 {
        return Err(ConnectorError::MultiValuedScalar {
            attribute: attribute.name.clone(),
            count: attribute.values.len(),
        });
    }
    let (parameter, field) = match attribute.name.split_once('.') {
        Some((parameter, field)) => (parameter.to_string(), Some(field.to_string())),
        None => (attribute.name.clone(), None),
    };
    Ok(ScalarChange {
        parameter,
        field,
        value: attribute.single().unwrap_or_default().to_string(),
    })
}

/// Decodes the table attribute of `config`. Compact triples take precedence
/// over row or key values when both are present.
fn table_from_attributes(
    config: &TableAttributeConfig,
    attributes: &[Attribute],
) -> Result<Table, DataError> {
    let compact_name = config.compact_attribute();
    let compact = compact_name
        .as_deref()
        .and_then(|name| attributes.iter().find(|a| a.name == name));

    if let Some(compact) = compact {
        let rows = compact
            .values
            .iter()
            .map(|value| {
                let value = value.as_deref().ok_or_else(|| DataError::NullValue {
                    attribute: compact.name.clone(),
                })?;
                Ok(compact_row(config, &compact::parse(value)?))
            })
            .collect::<Result<Vec<_>, DataError>>()?;
        let rows = Attribute::new(config.parameter.clone(), rows);
        return Table::from_attributes(&[rows], &config.parameter, &config.key_field);
    }

    let plain: Vec<Attribute> = attributes
        .iter()
        .filter(|a| Some(a.name.as_str()) != compact_name.as_deref())
        .cloned()
        .collect();
    Table::from_attributes(&plain, &config.parameter, &config.key_field)
}

fn compact_row(config: &TableAttributeConfig, entry: &compact::CompactEntry) -> String {
    let date = |d: Option<NaiveDate>| {
        d.map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default()
    };
    let mut fields = vec![(config.key_field.clone(), entry.name.clone())];
    if let Some(from) = &config.valid_from_field {
        fields.push((from.clone(), date(entry.valid_from)));
    }
    if let Some(to) = &config.valid_to_field {
        fields.push((to.clone(), date(entry.valid_to)));
    }
    Row::encode(fields).serialized().to_string()
}
