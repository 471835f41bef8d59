//! Compact `name|from|to` codec for time-bounded named assignments.
//!
//! A role grant with validity dates is exposed as a single delimited string
//! alongside the full row form, e.g. `ZBC_ADMIN|2016-06-07|9999-12-31`.
//! Absent dates serialize as empty segments.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::types::{parse_optional_date, DATE_FORMAT};

/// Segment delimiter.
pub const DELIMITER: char = '|';

/// A named assignment with optional validity bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactEntry {
    pub name: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl CompactEntry {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        valid_from: Option<NaiveDate>,
        valid_to: Option<NaiveDate>,
    ) -> Self {
        Self {
            name: name.into(),
            valid_from,
            valid_to,
        }
    }

    /// Renders this entry in compact form.
    #[must_use]
    pub fn to_compact(&self) -> String {
        serialize(&self.name, self.valid_from, self.valid_to)
    }
}

/// Serializes a name and optional dates to `name|from|to`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use idbridge_core::compact::serialize;
///
/// let from = NaiveDate::from_ymd_opt(2016, 6, 7);
/// assert_eq!(serialize("ZBC_ADMIN", from, None), "ZBC_ADMIN|2016-06-07|");
/// ```
#[must_use]
pub fn serialize(name: &str, valid_from: Option<NaiveDate>, valid_to: Option<NaiveDate>) -> String {
    let fmt = |d: Option<NaiveDate>| {
        d.map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default()
    };
    format!(
        "{name}{DELIMITER}{}{DELIMITER}{}",
        fmt(valid_from),
        fmt(valid_to)
    )
}

/// Parses a compact value.
///
/// Missing trailing segments leave the corresponding dates absent. Only the
/// first three segments are read.
///
/// # Errors
///
/// Returns [`DataError::EmptyName`] when the name segment is empty and
/// [`DataError::InvalidDate`] when a non-empty date segment does not parse.
pub fn parse(value: &str) -> Result<CompactEntry, DataError> {
    let mut segments = value.splitn(3, DELIMITER);
    let name = segments.next().unwrap_or_default();
    if name.is_empty() {
        return Err(DataError::EmptyName {
            value: value.to_string(),
        });
    }
    let valid_from = parse_segment_date(segments.next())?;
    let valid_to = parse_segment_date(segments.next())?;
    Ok(CompactEntry::new(name, valid_from, valid_to))
}

fn parse_segment_date(segment: Option<&str>) -> Result<Option<NaiveDate>, DataError> {
    segment.map_or(Ok(None), parse_optional_date)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn serialize_all_forms() {
        assert_eq!(serialize("R", None, None), "R||");
        assert_eq!(serialize("R", date(2016, 6, 7), None), "R|2016-06-07|");
        assert_eq!(
            serialize("R", date(2016, 6, 7), date(9999, 12, 31)),
            "R|2016-06-07|9999-12-31"
        );
    }

    #[test]
    fn round_trip_representative_triples() {
        for (from, to) in [
            (None, None),
            (date(2016, 6, 7), None),
            (date(2016, 6, 7), date(9999, 12, 31)),
        ] {
            let parsed = parse(&serialize("ZBC_ADMIN", from, to)).unwrap();
            assert_eq!(parsed, CompactEntry::new("ZBC_ADMIN", from, to));
        }
    }

    #[test]
    fn missing_segments_are_absent() {
        assert_eq!(parse("ROLE").unwrap(), CompactEntry::new("ROLE", None, None));
        assert_eq!(
            parse("ROLE|2020-01-31").unwrap(),
            CompactEntry::new("ROLE", date(2020, 1, 31), None)
        );
    }

    #[test]
    fn initial_date_segment_is_absent() {
        assert_eq!(
            parse("ROLE|00000000|0000-00-00").unwrap(),
            CompactEntry::new("ROLE", None, None)
        );
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(matches!(parse("|2020-01-01|"), Err(DataError::EmptyName { .. })));
        assert!(matches!(parse(""), Err(DataError::EmptyName { .. })));
    }

    #[test]
    fn bad_date_is_rejected() {
        assert!(matches!(
            parse("ROLE|31.01.2020|"),
            Err(DataError::InvalidDate { .. })
        ));
    }

    proptest! {
        #[test]
        fn round_trip_law(
            name in "[A-Za-z0-9_]{1,30}",
            from in proptest::option::of(0i64..2_900_000),
            to in proptest::option::of(0i64..2_900_000),
        ) {
            let base = NaiveDate::from_ymd_opt(1, 1, 1).unwrap();
            let from = from.map(|d| base + chrono::Duration::days(d));
            let to = to.map(|d| base + chrono::Duration::days(d));
            let parsed = parse(&serialize(&name, from, to)).unwrap();
            prop_assert_eq!(parsed, CompactEntry::new(name, from, to));
        }
    }
}
