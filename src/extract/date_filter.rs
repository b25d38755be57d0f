//! Publication date range filtering

use crate::config::{parse_config_date, ExtractConfig};
use crate::ConfigResult;
use chrono::{NaiveDate, NaiveDateTime};

/// Outcome counters for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilterStats {
    pub passed: u64,
    pub filtered_out: u64,
    pub no_date_kept: u64,
}

/// Keeps pages published inside an inclusive date range
///
/// Pages without a recognizable date are kept.
#[derive(Debug, Clone, Default)]
pub struct DateFilter {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    stats: DateFilterStats,
}

impl DateFilter {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            from,
            to,
            stats: DateFilterStats::default(),
        }
    }

    /// Builds the filter from `date-from` / `date-to`
    pub fn from_config(config: &ExtractConfig) -> ConfigResult<Self> {
        let from = config.date_from.as_deref().map(parse_config_date).transpose()?;
        let to = config.date_to.as_deref().map(parse_config_date).transpose()?;
        Ok(Self::new(from, to))
    }

    pub fn is_active(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// Checks an extracted date against the range and counts the outcome
    pub fn passes(&mut self, extracted: Option<&str>) -> bool {
        if !self.is_active() {
            return true;
        }

        let Some(date) = extracted.and_then(parse_extracted_date) else {
            self.stats.no_date_kept += 1;
            return true;
        };

        let too_early = self.from.is_some_and(|from| date < from);
        let too_late = self.to.is_some_and(|to| date > to);
        if too_early || too_late {
            self.stats.filtered_out += 1;
            false
        } else {
            self.stats.passed += 1;
            true
        }
    }

    pub fn stats(&self) -> DateFilterStats {
        self.stats
    }
}

/// Parses the leading date of a page's date string
///
/// Tries, in order, `%Y-%m-%dT%H:%M:%S`, `%Y-%m-%d`, `%Y-%m` (first of the
/// month), and `%Y` (January 1st) against the matching prefix length.
pub fn parse_extracted_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Some(prefix) = raw.get(..19) {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(prefix, "%Y-%m-%dT%H:%M:%S") {
            return Some(datetime.date());
        }
    }
    if let Some(prefix) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    if let Some(prefix) = raw.get(..7) {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", prefix), "%Y-%m-%d") {
            return Some(date);
        }
    }
    let year = raw.get(..4)?;
    if !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, 1, 1)
}
