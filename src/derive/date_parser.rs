use chrono::{NaiveDate, NaiveDateTime};

use crate::table::utils::clean_str;

/// Date layouts tried, in order, when a spec names none.
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%B %d, %Y", // September 25, 2021
    "%b %d, %Y", // Sep 25, 2021
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d %B %Y",
];

const DEFAULT_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Tolerant parse of a date cell: trims whitespace and wrapping quotes, then
/// tries each layout in turn. `formats` empty means the built-in list.
pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let s = clean_str(raw);
    if s.is_empty() {
        return None;
    }
    if formats.is_empty() {
        DEFAULT_DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
            .or_else(|| {
                DEFAULT_DATETIME_FORMATS
                    .iter()
                    .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                    .map(|dt| dt.date())
            })
    } else {
        formats.iter().find_map(|f| {
            NaiveDate::parse_from_str(s, f)
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(s, f).ok().map(|dt| dt.date()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_catalogue_style_dates_with_padding() {
        assert_eq!(parse_date(" September 25, 2021", &[]), Some(ymd(2021, 9, 25)));
        assert_eq!(parse_date("\"Sep 5, 2019\"", &[]), Some(ymd(2019, 9, 5)));
        assert_eq!(parse_date("2020-01-31", &[]), Some(ymd(2020, 1, 31)));
        assert_eq!(parse_date("2024/12/22 00:05:00", &[]), Some(ymd(2024, 12, 22)));
    }

    #[test]
    fn malformed_dates_are_none() {
        assert_eq!(parse_date("not a date", &[]), None);
        assert_eq!(parse_date("February 30, 2021", &[]), None);
        assert_eq!(parse_date("", &[]), None);
    }

    #[test]
    fn explicit_formats_replace_the_defaults() {
        let fmts = vec!["%d.%m.%Y".to_string()];
        assert_eq!(parse_date("25.09.2021", &fmts), Some(ymd(2021, 9, 25)));
        assert_eq!(parse_date("2021-09-25", &fmts), None);
    }
}
