use std::fmt;

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::storage::{file_name, Storage, ARCHIVE_DIR};

static MONTHLY_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d{2})_(\d{4})\.csv$").unwrap());

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Which files under a location a pipeline picks up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelector {
    /// Basename glob, ordered lexicographically.
    Pattern(String),
    /// `MM_YYYY.csv` files, ordered chronologically.
    Monthly,
}

impl fmt::Display for FileSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSelector::Pattern(pattern) => f.write_str(pattern),
            FileSelector::Monthly => f.write_str("MM_YYYY.csv"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub key: String,
    pub period: Option<MonthPeriod>,
}

impl SourceFile {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            period: None,
        }
    }
}

pub fn parse_month_period(name: &str) -> Option<MonthPeriod> {
    let captures = MONTHLY_FILE.captures(name)?;
    let month: u32 = captures[1].parse().ok()?;
    let year: i32 = captures[2].parse().ok()?;
    (1..=12).contains(&month).then_some(MonthPeriod { year, month })
}

/// True when the key sits below an `archive/` directory of the location.
pub fn is_archived(prefix: &str, key: &str) -> bool {
    let relative = key
        .strip_prefix(prefix.trim_matches('/'))
        .unwrap_or(key)
        .trim_start_matches('/');
    let mut segments: Vec<&str> = relative.split('/').collect();
    segments.pop();
    segments
        .iter()
        .any(|segment| segment.eq_ignore_ascii_case(ARCHIVE_DIR))
}

/// Keeps monthly files and orders them by `(year, month)`, then by key.
pub fn order_monthly<I, S>(keys: I) -> Vec<SourceFile>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut parsed: Vec<(MonthPeriod, String)> = keys
        .into_iter()
        .map(Into::into)
        .filter_map(|key| parse_month_period(file_name(&key)).map(|period| (period, key)))
        .collect();
    parsed.sort();
    parsed
        .into_iter()
        .map(|(period, key)| SourceFile {
            key,
            period: Some(period),
        })
        .collect()
}

/// Applies the selector to a listing of a location.
pub fn select_files(prefix: &str, keys: Vec<String>, selector: &FileSelector) -> Result<Vec<SourceFile>> {
    let active = keys.into_iter().filter(|key| !is_archived(prefix, key));

    match selector {
        FileSelector::Monthly => Ok(order_monthly(active)),
        FileSelector::Pattern(pattern) => {
            let pattern = Pattern::new(pattern)
                .with_context(|| format!("invalid file pattern '{pattern}'"))?;
            let mut matched: Vec<String> = active
                .filter(|key| pattern.matches_with(file_name(key), MATCH_OPTIONS))
                .collect();
            matched.sort();
            Ok(matched.into_iter().map(SourceFile::new).collect())
        }
    }
}

/// Lists the pending files of a location. An absent or empty location yields
/// an empty list.
pub async fn enumerate(
    storage: &dyn Storage,
    prefix: &str,
    selector: &FileSelector,
) -> Result<Vec<SourceFile>> {
    let keys = storage
        .list(prefix)
        .await
        .with_context(|| format!("failed to list {} under '{prefix}'", storage.describe()))?;
    let listed = keys.len();
    let files = select_files(prefix, keys, selector)?;
    debug!(prefix, selector = %selector, listed, selected = files.len(), "Enumerated source files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|file| file.key.as_str()).collect()
    }

    #[test]
    fn monthly_files_sort_chronologically() {
        let files = order_monthly(["02_2024.csv", "01_2024.csv", "12_2023.csv"]);
        assert_eq!(keys(&files), ["12_2023.csv", "01_2024.csv", "02_2024.csv"]);
        assert_eq!(files[0].period, Some(MonthPeriod { year: 2023, month: 12 }));
    }

    #[test]
    fn monthly_order_ignores_listing_order() {
        let listing = [
            "airbnb/06_2020.csv",
            "airbnb/10_2020.csv",
            "airbnb/01_2021.csv",
            "airbnb/05_2020.csv",
            "airbnb/12_2020.csv",
        ];
        let mut reversed = listing;
        reversed.reverse();

        let expected = [
            "airbnb/05_2020.csv",
            "airbnb/06_2020.csv",
            "airbnb/10_2020.csv",
            "airbnb/12_2020.csv",
            "airbnb/01_2021.csv",
        ];
        assert_eq!(keys(&order_monthly(listing)), expected);
        assert_eq!(keys(&order_monthly(reversed)), expected);
    }

    #[test]
    fn non_monthly_names_are_skipped() {
        let files = order_monthly([
            "listings.csv",
            "1_2024.csv",
            "13_2024.csv",
            "01_2024.txt",
            "03_2024.CSV",
        ]);
        assert_eq!(keys(&files), ["03_2024.CSV"]);
    }

    #[test]
    fn archived_keys_are_excluded() {
        assert!(is_archived("airbnb", "airbnb/archive/05_2020.csv"));
        assert!(is_archived("airbnb/", "airbnb/Archive/05_2020.csv"));
        assert!(!is_archived("airbnb", "airbnb/05_2020.csv"));
        assert!(!is_archived("airbnb", "airbnb/archive"));

        let files = select_files(
            "airbnb",
            vec![
                "airbnb/archive/01_2021.csv".into(),
                "airbnb/02_2021.csv".into(),
            ],
            &FileSelector::Monthly,
        )
        .unwrap();
        assert_eq!(keys(&files), ["airbnb/02_2021.csv"]);
    }

    #[test]
    fn pattern_selection_is_case_insensitive_and_sorted() {
        let files = select_files(
            "census",
            vec![
                "census/NSW_LGA_CODE.csv".into(),
                "census/2016census_g01_nsw_lga.CSV".into(),
                "census/2016Census_G02_NSW_LGA.csv".into(),
            ],
            &FileSelector::Pattern("2016Census_G01_NSW_LGA.csv".into()),
        )
        .unwrap();
        assert_eq!(keys(&files), ["census/2016census_g01_nsw_lga.CSV"]);

        let files = select_files(
            "airbnb",
            vec!["airbnb/b.csv".into(), "airbnb/a.csv".into(), "airbnb/notes.txt".into()],
            &FileSelector::Pattern("*.csv".into()),
        )
        .unwrap();
        assert_eq!(keys(&files), ["airbnb/a.csv", "airbnb/b.csv"]);
    }

    #[test]
    fn empty_listing_is_not_an_error() {
        let files = select_files("airbnb", Vec::new(), &FileSelector::Monthly).unwrap();
        assert!(files.is_empty());
    }
}
