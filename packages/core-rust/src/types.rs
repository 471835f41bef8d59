//! Value kinds, attribute sets and decoded entities.
//!
//! The external system describes every field with a one-letter wire type
//! code. That code is resolved to a [`ValueKind`] once, when a field catalog
//! is built, and the kind then drives decoding of raw strings into typed
//! [`Value`]s.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Date format shared by every textual date rendering.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Compact wire date format (`yyyyMMdd`) used by flat records.
const WIRE_DATE_FORMAT: &str = "%Y%m%d";

/// Closed set of value kinds the engine can decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    #[default]
    Text,
    Date,
    Decimal,
    Binary,
}

impl ValueKind {
    /// Resolves a wire type code to a value kind.
    ///
    /// Unknown codes fall back to [`ValueKind::Text`], which preserves the raw
    /// string unchanged.
    #[must_use]
    pub fn from_wire_type(code: &str) -> Self {
        match code.trim() {
            "D" => Self::Date,
            "P" | "F" | "I" | "b" | "s" | "8" | "a" | "e" => Self::Decimal,
            "X" | "y" => Self::Binary,
            _ => Self::Text,
        }
    }

    /// Decodes a raw wire string into a typed value of this kind.
    ///
    /// Blank input decodes to [`Value::Null`] for every kind except text,
    /// and so does the all-zero initial date.
    ///
    /// # Errors
    ///
    /// Returns a [`DataError`] when the input is not a valid date, decimal or
    /// hex string for the respective kind.
    pub fn decode(self, raw: &str) -> Result<Value, DataError> {
        let trimmed = raw.trim();
        match self {
            Self::Text => Ok(Value::Text(trimmed.to_string())),
            Self::Date => Ok(parse_optional_date(trimmed)?.map_or(Value::Null, Value::Date)),
            Self::Decimal => {
                if trimmed.is_empty() {
                    return Ok(Value::Null);
                }
                trimmed
                    .parse::<f64>()
                    .map(Value::Decimal)
                    .map_err(|_| DataError::InvalidDecimal {
                        value: raw.to_string(),
                    })
            }
            Self::Binary => {
                if trimmed.is_empty() {
                    return Ok(Value::Null);
                }
                hex::decode(trimmed)
                    .map(Value::Binary)
                    .map_err(|_| DataError::InvalidBinary {
                        value: raw.to_string(),
                    })
            }
        }
    }
}

/// Like [`parse_date`], but blank input and the all-zero initial date
/// (`00000000`, `0000-00-00`) mean "no date".
///
/// # Errors
///
/// Returns [`DataError::InvalidDate`] for any other unparseable input.
pub fn parse_optional_date(raw: &str) -> Result<Option<NaiveDate>, DataError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.bytes().all(|b| matches!(b, b'0' | b'-')) {
        return Ok(None);
    }
    parse_date(trimmed).map(Some)
}

/// Parses a date in either `yyyy-MM-dd` or the compact `yyyyMMdd` form.
///
/// # Errors
///
/// Returns [`DataError::InvalidDate`] if neither format matches.
pub fn parse_date(raw: &str) -> Result<NaiveDate, DataError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, WIRE_DATE_FORMAT))
        .map_err(|_| DataError::InvalidDate {
            value: raw.to_string(),
        })
}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Text(String),
    Date(NaiveDate),
    Decimal(f64),
    Binary(Vec<u8>),
}

impl Value {
    /// Convenience constructor for text values.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Kind of this value, or `None` for [`Value::Null`].
    #[must_use]
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Null => None,
            Self::Text(_) => Some(ValueKind::Text),
            Self::Date(_) => Some(ValueKind::Date),
            Self::Decimal(_) => Some(ValueKind::Decimal),
            Self::Binary(_) => Some(ValueKind::Binary),
        }
    }

    /// Renders a scalar value as the string the external system expects.
    ///
    /// Returns `None` for null and binary values, which have no scalar
    /// textual form in a native filter.
    #[must_use]
    pub fn as_scalar(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            Self::Decimal(n) => Some(n.to_string()),
            Self::Null | Self::Binary(_) => None,
        }
    }
}

/// One entry of a change-request attribute set.
///
/// `None` entries model explicit nulls supplied by the caller; the table
/// codec rejects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<Option<String>>,
}

impl Attribute {
    /// Creates an attribute whose values are all present.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(|v| Some(v.into())).collect(),
        }
    }

    /// Creates an attribute with no values. Present in a change request, it
    /// means "clear this attribute".
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// First value, if present and non-null.
    #[must_use]
    pub fn single(&self) -> Option<&str> {
        self.values.first().and_then(|v| v.as_deref())
    }
}

/// A decoded record: composite identifier plus ordered, named values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub attributes: Vec<(String, Vec<Value>)>,
}

impl Entity {
    #[must_use]
    pub fn new(id: impl Into<String>, attributes: Vec<(String, Vec<Value>)>) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Values of the named attribute, if the entity carries it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }
}
