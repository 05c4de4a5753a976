//! Entry normalization: required-field check, UTC dates, plain-text fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

use super::document::RawEntry;
use crate::util::clean_text;

/// Fields an entry must carry to be stored, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 4] = ["link", "published", "summary", "title"];

/// Date formats with an explicit offset, tried after RFC 2822 and RFC 3339.
const OFFSET_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S %z",
];

/// Date-time formats without an offset; these are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d %b %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %b %Y", "%B %d, %Y"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// A required field is absent from the raw entry
    #[error("{0} not found in feed entry item")]
    MissingField(&'static str),
}

/// An entry ready to be merged into the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEntry {
    pub link: String,
    pub title: String,
    pub summary: String,
    pub published: DateTime<Utc>,
}

/// Normalizes a raw entry.
///
/// All of [`REQUIRED_FIELDS`] are checked before anything is transformed;
/// the first missing one is reported. A blank link counts as missing.
///
/// The publication date arrives already in UTC (see [`parse_published`]).
/// Title and summary lose their HTML markup and non-breaking spaces. Fields
/// other than the four required ones (the author) are dropped.
pub fn normalize(raw: &RawEntry) -> Result<NormalizedEntry, NormalizeError> {
    let link = raw
        .link
        .as_deref()
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .ok_or(NormalizeError::MissingField("link"))?;
    let published = raw
        .published
        .ok_or(NormalizeError::MissingField("published"))?;
    let summary = raw
        .summary
        .as_deref()
        .ok_or(NormalizeError::MissingField("summary"))?;
    let title = raw
        .title
        .as_deref()
        .ok_or(NormalizeError::MissingField("title"))?;

    Ok(NormalizedEntry {
        link: link.to_string(),
        title: clean_text(title),
        summary: clean_text(summary),
        published,
    })
}

/// Parses a feed date string into UTC.
///
/// Every date in a fetched document goes through here; one that does not
/// parse is replaced by the fetch time.
///
/// Accepts RFC 2822 (including obsolete zone names like `GMT` or `EST`, and a
/// weekday that does not match the date), RFC 3339, common ISO-8601 variants
/// with or without an offset, and bare dates. Values without an offset are
/// taken to be UTC.
///
/// ```
/// use feedmill::feed::parse_published;
///
/// let dt = parse_published("Tue, 10 Jun 2003 04:00:00 +0800").unwrap();
/// assert_eq!(dt.to_rfc3339(), "2003-06-09T20:00:00+00:00");
/// assert!(parse_published("next tuesday").is_none());
/// ```
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // Weekday names are frequently wrong or localized; the date is what counts.
    let without_weekday = s.split_once(',').map_or(s, |(_, rest)| rest.trim());
    if without_weekday != s {
        if let Ok(dt) = DateTime::parse_from_rfc2822(without_weekday) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for candidate in [without_weekday, s] {
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
        }
        for fmt in NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(dt.and_utc());
            }
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn complete_entry() -> RawEntry {
        RawEntry {
            link: Some("https://www.rssfeedstoday.com/story-00001.html".to_string()),
            published: Some(Utc.with_ymd_and_hms(2003, 6, 10, 4, 0, 0).unwrap()),
            summary: Some("<p>this&nbsp;&nbsp;string</p>".to_string()),
            title: Some("<b>Breaking</b> news".to_string()),
            author: Some("Jane".to_string()),
        }
    }

    #[test]
    fn test_normalize_complete_entry() {
        let entry = normalize(&complete_entry()).unwrap();
        assert_eq!(entry.link, "https://www.rssfeedstoday.com/story-00001.html");
        assert_eq!(entry.summary, "this  string");
        assert_eq!(entry.title, "Breaking news");
        assert_eq!(
            entry.published,
            Utc.with_ymd_and_hms(2003, 6, 10, 4, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_each_required_field_reported() {
        for field in REQUIRED_FIELDS {
            let mut raw = complete_entry();
            match field {
                "link" => raw.link = None,
                "published" => raw.published = None,
                "summary" => raw.summary = None,
                _ => raw.title = None,
            }
            assert_eq!(normalize(&raw), Err(NormalizeError::MissingField(field)));
        }
    }

    #[test]
    fn test_first_missing_field_wins() {
        let raw = RawEntry {
            title: Some("only a title".to_string()),
            ..RawEntry::default()
        };
        assert_eq!(normalize(&raw), Err(NormalizeError::MissingField("link")));
    }

    #[test]
    fn test_blank_link_is_missing() {
        let mut raw = complete_entry();
        raw.link = Some("   ".to_string());
        assert_eq!(normalize(&raw), Err(NormalizeError::MissingField("link")));
    }

    #[test]
    fn test_empty_summary_and_title_are_present() {
        let mut raw = complete_entry();
        raw.summary = Some(String::new());
        raw.title = Some(String::new());
        let entry = normalize(&raw).unwrap();
        assert_eq!(entry.summary, "");
        assert_eq!(entry.title, "");
    }

    #[test]
    fn test_parse_rfc2822_offsets() {
        let dt = parse_published("Tue, 10 Jun 2003 04:00:00 +0800").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2003, 6, 9, 20, 0, 0).unwrap());

        let dt = parse_published("Tue, 10 Jun 2003 04:00:00 EST").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2003, 6, 10, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_wrong_weekday() {
        // 10 June 2003 was a Tuesday
        let dt = parse_published("Fri, 10 Jun 2003 04:00:00 GMT").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2003, 6, 10, 4, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_iso8601_variants() {
        let expected = Utc.with_ymd_and_hms(2003, 12, 13, 18, 30, 2).unwrap();
        assert_eq!(parse_published("2003-12-13T18:30:02Z"), Some(expected));
        assert_eq!(parse_published("2003-12-13T19:30:02+01:00"), Some(expected));
        assert_eq!(parse_published("2003-12-13T19:30:02+0100"), Some(expected));
        assert_eq!(parse_published("2003-12-13 18:30:02"), Some(expected));
        assert_eq!(parse_published("2003-12-13T18:30:02.000"), Some(expected));
    }

    #[test]
    fn test_parse_bare_dates() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(parse_published("2024-01-15"), Some(expected));
        assert_eq!(parse_published("15 Jan 2024"), Some(expected));
        assert_eq!(parse_published("January 15, 2024"), Some(expected));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_published(""), None);
        assert_eq!(parse_published("   "), None);
        assert_eq!(parse_published("yesterday-ish"), None);
    }

    proptest! {
        #[test]
        fn prop_parse_published_never_panics(s in ".*") {
            let _ = parse_published(&s);
        }

        #[test]
        fn prop_rfc2822_with_any_offset_is_utc(secs in 0i64..4_000_000_000, offset_min in -720i32..=840) {
            let utc = Utc.timestamp_opt(secs, 0).unwrap();
            let offset = chrono::FixedOffset::east_opt(offset_min * 60).unwrap();
            let local = utc.with_timezone(&offset);
            prop_assert_eq!(parse_published(&local.to_rfc2822()), Some(utc));
        }
    }
}
