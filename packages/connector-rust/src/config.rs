//! Connector configuration.

use std::sync::Arc;

use idbridge_core::{FilterTranslator, NativeAllowList};
use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;
use crate::registry::{DestinationProperties, DestinationRegistry};

/// Top-level connector configuration.
///
/// Every table definition is parsed when the [`SchemaCatalog`](crate::catalog::SchemaCatalog)
/// is built from this value, so a malformed definition fails startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Name of the destination used for remote calls.
    pub destination: String,
    /// Remote destinations known to this connector.
    pub destinations: Vec<DestinationProperties>,
    /// Attribute that uniquely names an account.
    pub identity_attribute: String,
    /// Attributes the remote list call can filter on (`PARAM.FIELD`).
    pub native_attributes: Vec<String>,
    /// Structured export parameters whose fields are exposed as scalars.
    pub structures: Vec<String>,
    /// Multi-valued account attributes backed by table parameters.
    pub account_tables: Vec<TableAttributeConfig>,
    /// Primary fixed-width table definitions.
    pub tables: Vec<String>,
    /// Sub-table definitions attached to primary tables.
    pub sub_tables: Vec<String>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            destination: String::new(),
            destinations: Vec::new(),
            identity_attribute: "USERNAME".to_string(),
            native_attributes: [
                "ADDRESS.FIRSTNAME",
                "ADDRESS.LASTNAME",
                "ADDRESS.E_MAIL",
                "COMPANY.COMPANY",
                "LOGONDATA.USTYP",
                "LOGONDATA.CLASS",
                "LOGONDATA.GLTGV",
                "LOGONDATA.GLTGB",
                "ACTIVITYGROUPS.AGR_NAME",
                "PROFILES.BAPIPROF",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            structures: ["ADDRESS", "LOGONDATA", "DEFAULTS", "COMPANY"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            account_tables: vec![
                TableAttributeConfig {
                    parameter: "ACTIVITYGROUPS".to_string(),
                    key_field: "AGR_NAME".to_string(),
                    valid_from_field: Some("FROM_DAT".to_string()),
                    valid_to_field: Some("TO_DAT".to_string()),
                },
                TableAttributeConfig {
                    parameter: "PROFILES".to_string(),
                    key_field: "BAPIPROF".to_string(),
                    valid_from_field: None,
                    valid_to_field: None,
                },
            ],
            tables: Vec::new(),
            sub_tables: Vec::new(),
        }
    }
}

/// A multi-valued account attribute stored as a table parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAttributeConfig {
    /// Table parameter name; also the attribute carrying the full rows.
    pub parameter: String,
    /// Field holding the row's identifier.
    pub key_field: String,
    /// Validity start field, if rows are time-bounded.
    #[serde(default)]
    pub valid_from_field: Option<String>,
    /// Validity end field, if rows are time-bounded.
    #[serde(default)]
    pub valid_to_field: Option<String>,
}

impl TableAttributeConfig {
    /// Attribute exposing the key column of every row.
    #[must_use]
    pub fn key_attribute(&self) -> String {
        format!("{}.{}", self.parameter, self.key_field)
    }

    /// Attribute exposing compact `name|from|to` triples, when rows carry
    /// validity dates.
    #[must_use]
    pub fn compact_attribute(&self) -> Option<String> {
        (self.valid_from_field.is_some() || self.valid_to_field.is_some())
            .then(|| format!("{}.COMPACT", self.parameter))
    }
}

impl ConnectorConfig {
    /// Parses a JSON configuration document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::InvalidDocument`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, ConnectorError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn allow_list(&self) -> NativeAllowList {
        self.native_attributes.iter().cloned().collect()
    }

    #[must_use]
    pub fn translator(&self) -> FilterTranslator {
        FilterTranslator::new(self.identity_attribute.clone())
    }

    /// Registry holding every configured destination.
    #[must_use]
    pub fn registry(&self) -> DestinationRegistry {
        DestinationRegistry::with_destinations(self.destinations.iter().cloned())
    }

    /// Properties of the destination used for remote calls, or `None` when
    /// no destination is named.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::UnknownDestination`] if the named destination
    /// is not in `registry`.
    pub fn active_destination(
        &self,
        registry: &DestinationRegistry,
    ) -> Result<Option<Arc<DestinationProperties>>, ConnectorError> {
        if self.destination.is_empty() {
            return Ok(None);
        }
        registry.require(&self.destination).map(Some)
    }

    /// Table attribute configured for `parameter`.
    #[must_use]
    pub fn account_table(&self, parameter: &str) -> Option<&TableAttributeConfig> {
        self.account_tables.iter().find(|t| t.parameter == parameter)
    }
}
