//! Single structured row codec.
//!
//! A row is an ordered list of `(field, value)` string pairs. Its canonical
//! serialized form is a small XML document with the literal root tag
//! `item` and one child element per field, in source order:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?><item><AGR_NAME>X</AGR_NAME><TO_DAT>9999-12-31</TO_DAT></item>
//! ```
//!
//! The XML prolog is always written so that a serialized row handed back in a
//! change request is recognized as a full record (see [`RowMode::detect`]).
//! A row may also arrive as a bare key value ([`RowMode::KeyedOnly`]), in
//! which case the whole string is the value of the table's key field.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Root element name of a serialized row.
pub const ROOT_TAG: &str = "item";

/// Prolog written ahead of every serialized row.
pub const XML_PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Marker used to auto-detect a full record.
const PROLOG_MARKER: &str = "<?xml";

/// How a row was represented on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowMode {
    /// Full `item` document with one child element per field.
    FullRecord,
    /// Bare key value, no structure.
    KeyedOnly,
}

impl RowMode {
    /// Detects the representation of a serialized row by its XML prolog.
    #[must_use]
    pub fn detect(serialized: &str) -> Self {
        if serialized.trim_start().starts_with(PROLOG_MARKER) {
            Self::FullRecord
        } else {
            Self::KeyedOnly
        }
    }
}

/// One immutable row: ordered fields plus their serialized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    fields: Vec<(String, String)>,
    serialized: String,
    mode: RowMode,
}

impl Row {
    /// Builds a full-record row from fields in source order.
    pub fn encode<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields: Vec<(String, String)> = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut serialized = String::from(XML_PROLOG);
        serialized.push('<');
        serialized.push_str(ROOT_TAG);
        serialized.push('>');
        for (name, value) in &fields {
            serialized.push('<');
            serialized.push_str(name);
            serialized.push('>');
            serialized.push_str(&quick_xml::escape::escape(value.as_str()));
            serialized.push_str("</");
            serialized.push_str(name);
            serialized.push('>');
        }
        serialized.push_str("</");
        serialized.push_str(ROOT_TAG);
        serialized.push('>');

        Self {
            fields,
            serialized,
            mode: RowMode::FullRecord,
        }
    }

    /// Decodes a serialized row.
    ///
    /// In [`RowMode::FullRecord`] the payload must contain exactly one root
    /// `item` element; each of its child elements becomes one field. In
    /// [`RowMode::KeyedOnly`] the whole payload is the value of `key_field`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::RootElementCount`] if a full record does not have
    /// exactly one `item` root, or [`DataError::MalformedXml`] if it is not
    /// well-formed.
    pub fn decode(serialized: &str, mode: RowMode, key_field: &str) -> Result<Self, DataError> {
        let fields = match mode {
            RowMode::FullRecord => parse_item(serialized)?,
            RowMode::KeyedOnly => vec![(key_field.to_string(), serialized.to_string())],
        };
        Ok(Self {
            fields,
            serialized: serialized.to_string(),
            mode,
        })
    }

    /// Value of the named field, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All fields in source order.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Canonical serialized form.
    #[must_use]
    pub fn serialized(&self) -> &str {
        &self.serialized
    }

    #[must_use]
    pub fn mode(&self) -> RowMode {
        self.mode
    }

    /// Consumes the row, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Vec<(String, String)> {
        self.fields
    }
}

fn malformed(payload: &str, reason: impl ToString) -> DataError {
    DataError::MalformedXml {
        payload: payload.to_string(),
        reason: reason.to_string(),
    }
}

/// Extracts the child elements of the single `item` root.
fn parse_item(payload: &str) -> Result<Vec<(String, String)>, DataError> {
    let mut reader = Reader::from_str(payload);

    let mut fields = Vec::new();
    let mut roots = 0usize;
    let mut depth = 0usize;
    let mut in_item = false;
    let mut current: Option<(String, String)> = None;

    loop {
        match reader.read_event().map_err(|e| malformed(payload, e))? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if depth == 0 {
                    if name == ROOT_TAG {
                        roots += 1;
                        in_item = roots == 1;
                    }
                } else if depth == 1 && in_item {
                    current = Some((name, String::new()));
                }
                depth += 1;
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if depth == 0 {
                    if name == ROOT_TAG {
                        roots += 1;
                    }
                } else if depth == 1 && in_item {
                    fields.push((name, String::new()));
                }
            }
            Event::Text(t) => {
                if depth == 0 && t.iter().any(|b| !b.is_ascii_whitespace()) {
                    return Err(malformed(payload, "text outside the root element"));
                }
                if let Some((_, text)) = current.as_mut() {
                    let unescaped = t.unescape().map_err(|e| malformed(payload, e))?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(c) => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 && in_item {
                    if let Some(field) = current.take() {
                        fields.push(field);
                    }
                } else if depth == 0 {
                    in_item = false;
                }
            }
            Event::Eof if depth != 0 => {
                return Err(malformed(payload, "unclosed element at end of input"));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if roots != 1 {
        return Err(DataError::RootElementCount {
            count: roots,
            payload: payload.to_string(),
        });
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn grant_fields() -> Vec<(&'static str, &'static str)> {
        vec![
            ("AGR_NAME", "X"),
            ("FROM_DAT", "2016-06-07"),
            ("TO_DAT", "9999-12-31"),
        ]
    }

    // ---- Encode ----

    #[test]
    fn encode_produces_canonical_item_document() {
        let row = Row::encode(grant_fields());
        assert_eq!(
            row.serialized(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><item><AGR_NAME>X</AGR_NAME>\
             <FROM_DAT>2016-06-07</FROM_DAT><TO_DAT>9999-12-31</TO_DAT></item>"
        );
        assert_eq!(row.mode(), RowMode::FullRecord);
    }

    #[test]
    fn encode_escapes_markup_in_values() {
        let row = Row::encode([("TEXT", "a<b & c")]);
        assert!(row.serialized().contains("<TEXT>a&lt;b &amp; c</TEXT>"));
        let decoded = Row::decode(row.serialized(), RowMode::FullRecord, "TEXT").unwrap();
        assert_eq!(decoded.field("TEXT"), Some("a<b & c"));
    }

    // ---- Decode ----

    #[test]
    fn decode_full_record_preserves_order() {
        let xml = "<item><B>2</B><A>1</A><C/></item>";
        let row = Row::decode(xml, RowMode::FullRecord, "A").unwrap();
        assert_eq!(
            row.fields(),
            &[
                ("B".to_string(), "2".to_string()),
                ("A".to_string(), "1".to_string()),
                ("C".to_string(), String::new()),
            ]
        );
        assert_eq!(row.serialized(), xml);
    }

    #[test]
    fn decode_without_item_root_fails() {
        let err = Row::decode("<row><A>1</A></row>", RowMode::FullRecord, "A").unwrap_err();
        assert!(matches!(err, DataError::RootElementCount { count: 0, .. }));
    }

    #[test]
    fn decode_with_two_item_roots_fails() {
        let err = Row::decode(
            "<item><A>1</A></item><item><A>2</A></item>",
            RowMode::FullRecord,
            "A",
        )
        .unwrap_err();
        match err {
            DataError::RootElementCount { count, payload } => {
                assert_eq!(count, 2);
                assert!(payload.contains("<A>2</A>"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_mismatched_tags_fails() {
        let err = Row::decode("<item><A>1</B></item>", RowMode::FullRecord, "A").unwrap_err();
        assert!(matches!(err, DataError::MalformedXml { .. }));
    }

    #[test]
    fn decode_truncated_document_fails() {
        let err = Row::decode(
            r#"<?xml version="1.0"?><item><A>1</A>"#,
            RowMode::FullRecord,
            "A",
        )
        .unwrap_err();
        assert!(matches!(err, DataError::MalformedXml { .. }));
    }

    #[test]
    fn decode_text_outside_root_fails() {
        let err = Row::decode("<item><A>1</A></item>trailing", RowMode::FullRecord, "A")
            .unwrap_err();
        assert!(matches!(err, DataError::MalformedXml { .. }));
    }

    #[test]
    fn decode_keyed_only_uses_whole_input() {
        let row = Row::decode("ZBC_ADMIN", RowMode::KeyedOnly, "AGR_NAME").unwrap();
        assert_eq!(row.field("AGR_NAME"), Some("ZBC_ADMIN"));
        assert_eq!(row.fields().len(), 1);
        assert_eq!(row.mode(), RowMode::KeyedOnly);
    }

    #[test]
    fn keyed_only_does_not_parse_markup() {
        let row = Row::decode("<item/>", RowMode::KeyedOnly, "AGR_NAME").unwrap();
        assert_eq!(row.field("AGR_NAME"), Some("<item/>"));
    }

    #[test]
    fn missing_field_is_absent() {
        let row = Row::encode(grant_fields());
        assert_eq!(row.field("NOPE"), None);
    }

    // ---- Mode detection ----

    #[test]
    fn detect_mode_by_prolog() {
        assert_eq!(RowMode::detect(Row::encode(grant_fields()).serialized()), RowMode::FullRecord);
        assert_eq!(RowMode::detect("ZBC_ADMIN"), RowMode::KeyedOnly);
        assert_eq!(RowMode::detect("<item><A>1</A></item>"), RowMode::KeyedOnly);
    }

    proptest! {
        #[test]
        fn decode_of_encode_preserves_fields(
            fields in proptest::collection::vec(("[A-Z][A-Z0-9_]{0,11}", "[ -~]{0,20}"), 0..8)
        ) {
            let row = Row::encode(fields.clone());
            let decoded = Row::decode(row.serialized(), RowMode::FullRecord, "KEY").unwrap();
            prop_assert_eq!(decoded.fields(), fields.as_slice());
        }
    }
}
