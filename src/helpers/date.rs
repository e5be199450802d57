//! Date helper functions

use chrono::{DateTime, Locale, Utc};
use chrono_tz::Tz;

/// Format a UTC timestamp in the site timezone with localized names
///
/// # Examples
/// ```ignore
/// format_date(&date, "%d %b %Y", Locale::pt_BR, chrono_tz::America::Sao_Paulo) // -> "15 mar 2021"
/// ```
pub fn format_date(date: &DateTime<Utc>, format: &str, locale: Locale, tz: Tz) -> String {
    date.with_timezone(&tz)
        .format_localized(format, locale)
        .to_string()
}

/// Format a date in ISO 8601 / XML format
pub fn date_xml(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Whether a post was edited after its first publication
///
/// Prismic sets both dates on first publish, so equal dates mean "never edited".
pub fn was_edited(first: Option<&DateTime<Utc>>, last: Option<&DateTime<Utc>>) -> bool {
    match (first, last) {
        (Some(first), Some(last)) => last > first,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_date_localized() {
        let date = Utc.with_ymd_and_hms(2021, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(
            format_date(&date, "%d %b %Y", Locale::pt_BR, chrono_tz::America::Sao_Paulo),
            "15 mar 2021"
        );
        assert_eq!(
            format_date(&date, "%d %b %Y", Locale::en_US, chrono_tz::UTC),
            "15 Mar 2021"
        );
    }

    #[test]
    fn test_format_date_uses_timezone() {
        // 01:00 UTC is still the previous day in São Paulo (UTC-3)
        let date = Utc.with_ymd_and_hms(2021, 3, 16, 1, 0, 0).unwrap();
        assert_eq!(
            format_date(&date, "%d/%m/%Y %H:%M", Locale::POSIX, chrono_tz::America::Sao_Paulo),
            "15/03/2021 22:00"
        );
    }

    #[test]
    fn test_date_xml() {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(date_xml(&date), "2024-01-15T10:30:00.000Z");
    }

    #[test]
    fn test_was_edited() {
        let first = Utc.with_ymd_and_hms(2021, 3, 15, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2021, 3, 19, 15, 49, 0).unwrap();
        assert!(was_edited(Some(&first), Some(&later)));
        assert!(!was_edited(Some(&first), Some(&first)));
        assert!(!was_edited(None, Some(&later)));
    }
}
