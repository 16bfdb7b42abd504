// src/heuristics/mod.rs

mod dates;
mod utility;

use serde::{Serialize, Serializer};
use time::Date;

/// What a consumption value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UtilityType {
    /// Cubic meters.
    Water,
    /// Kilowatt-hours.
    Electricity,
    /// Part of the stored data model; no recognizer produces it today, and a
    /// row built from it fills neither value column.
    #[allow(dead_code)]
    Unknown,
}

impl UtilityType {
    pub fn unit(self) -> &'static str {
        match self {
            UtilityType::Water => "M3",
            UtilityType::Electricity => "kWh",
            UtilityType::Unknown => "",
        }
    }
}

/// What one recognizer recovers from a page of invoice text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingFragment {
    pub utility_type: UtilityType,
    /// The number exactly as it appears in the text, comma decimal included.
    pub raw_value: String,
    pub numeric_value: f64,
    #[serde(serialize_with = "serialize_date")]
    pub invoice_date: Option<Date>,
    /// The month name was not in the table and January was assumed.
    pub month_defaulted: bool,
}

pub fn serialize_date<S: Serializer>(date: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
    match date {
        Some(d) => s.serialize_str(&d.to_string()),
        None => s.serialize_none(),
    }
}

/// A single rule of the cascade.
pub type Recognizer = fn(&str) -> Option<ReadingFragment>;

/// Evaluated in order; the first hit wins. Water is checked before
/// electricity, and the coded electricity rule before the bare `kWh` one.
pub const CASCADE: &[(&str, Recognizer)] = &[
    ("water", utility::water),
    ("electricity_coded", utility::electricity_coded),
    ("electricity_loose", utility::electricity_loose),
];

/// Run the cascade on one page of text.
pub fn parse_page(text: &str) -> Option<ReadingFragment> {
    CASCADE.iter().find_map(|(name, rule)| {
        let found = rule(text)?;
        tracing::debug!(rule = *name, value = %found.raw_value, "Cascade match");
        Some(found)
    })
}

/// Run the cascade page by page and stop at the first page that matches.
///
/// Returns `None` when no page of the document yields a reading.
pub fn parse_pages<S: AsRef<str>>(pages: &[S]) -> Option<ReadingFragment> {
    pages
        .iter()
        .map(|page| page.as_ref())
        .filter(|text| !text.trim().is_empty())
        .find_map(parse_page)
}

/// Parse a consumption token such as `12,34` into `12.34`.
fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok()
}
