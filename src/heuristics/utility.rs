use super::dates::{billing_period_start, issued_from};
use super::{ReadingFragment, UtilityType, parse_decimal};
use regex::Regex;

// ---------------------------------------------------------------------------
// Consumption recognizers
// ---------------------------------------------------------------------------

/// Water invoices: `12,34 M3`. Only comma-decimal values count.
pub fn water(text: &str) -> Option<ReadingFragment> {
    let re = Regex::new(r"(?i)([0-9]+,[0-9]+)\s*M3").ok()?;
    let raw = re.captures(text)?[1].to_string();
    let numeric_value = parse_decimal(&raw)?;

    Some(ReadingFragment {
        utility_type: UtilityType::Water,
        raw_value: raw,
        numeric_value,
        invoice_date: billing_period_start(text),
        month_defaulted: false,
    })
}

/// Electricity invoices that carry the `IEC` billing code right before the value.
pub fn electricity_coded(text: &str) -> Option<ReadingFragment> {
    let re = Regex::new(r"(?i)IEC\s+([0-9]+(?:,[0-9]+)?)\s*kWh").ok()?;
    let raw = re.captures(text)?[1].to_string();
    electricity(raw).map(|fragment| with_issue_date(fragment, text))
}

/// Any `<n> kWh` on the page, for invoices without the billing code.
pub fn electricity_loose(text: &str) -> Option<ReadingFragment> {
    let re = Regex::new(r"(?i)([0-9]+(?:,[0-9]+)?)\s*kWh").ok()?;
    let raw = re.captures(text)?[1].to_string();
    electricity(raw).map(|fragment| with_issue_date(fragment, text))
}

fn electricity(raw: String) -> Option<ReadingFragment> {
    let numeric_value = parse_decimal(&raw)?;
    Some(ReadingFragment {
        utility_type: UtilityType::Electricity,
        raw_value: raw,
        numeric_value,
        invoice_date: None,
        month_defaulted: false,
    })
}

fn with_issue_date(mut fragment: ReadingFragment, text: &str) -> ReadingFragment {
    if let Some(found) = issued_from(text) {
        fragment.invoice_date = found.date;
        fragment.month_defaulted = found.month_defaulted;
    }
    fragment
}
