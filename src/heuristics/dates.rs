use regex::Regex;
use time::{Date, Month};
use tracing::warn;

/// An electricity invoice date recovered from a `De: D de <mês> YYYY` phrase.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueDate {
    /// `None` when the parts do not form a real calendar date.
    pub date: Option<Date>,
    pub month_defaulted: bool,
}

/// Water invoices print the billing period as `TRH Saneamento Dom <start> <end>`;
/// the start date is the one we keep.
pub fn billing_period_start(text: &str) -> Option<Date> {
    let re = Regex::new(
        r"(?i)TRH Saneamento Dom\s*([0-9]{4})-([0-9]{2})-([0-9]{2})\s*[0-9]{4}-[0-9]{2}-[0-9]{2}",
    )
    .ok()?;
    let cap = re.captures(text)?;
    let year: i32 = cap[1].parse().ok()?;
    let month: u8 = cap[2].parse().ok()?;
    let day: u8 = cap[3].parse().ok()?;

    let date = Month::try_from(month)
        .ok()
        .and_then(|m| Date::from_calendar_date(year, m, day).ok());
    if date.is_none() {
        warn!(matched = &cap[0], "Billing period start is not a calendar date");
    }
    date
}

/// Find the first `De: D(D) de <mês> YYYY` phrase.
///
/// A month name missing from the table falls back to January and the
/// result is flagged with `month_defaulted`.
pub fn issued_from(text: &str) -> Option<IssueDate> {
    let re = Regex::new(r"(?i)De:\s*([0-9]{1,2})\s+de\s+(\w+)\s+([0-9]{4})").ok()?;
    let cap = re.captures(text)?;
    let day: u8 = cap[1].parse().ok()?;
    let month_name = &cap[2];
    let year: i32 = cap[3].parse().ok()?;

    let (month, month_defaulted) = match month_number(month_name) {
        Some(m) => (m, false),
        None => {
            warn!(month = %month_name, "Unrecognised month name, assuming January");
            (Month::January, true)
        }
    };

    let date = Date::from_calendar_date(year, month, day).ok();
    if date.is_none() {
        warn!(matched = &cap[0], "Invoice date is not a calendar date");
    }

    Some(IssueDate {
        date,
        month_defaulted,
    })
}

/// Portuguese month names, any case. `marco` is accepted for text that lost its cedilla.
pub fn month_number(name: &str) -> Option<Month> {
    let month = match name.to_lowercase().as_str() {
        "janeiro" => Month::January,
        "fevereiro" => Month::February,
        "março" | "marco" => Month::March,
        "abril" => Month::April,
        "maio" => Month::May,
        "junho" => Month::June,
        "julho" => Month::July,
        "agosto" => Month::August,
        "setembro" => Month::September,
        "outubro" => Month::October,
        "novembro" => Month::November,
        "dezembro" => Month::December,
        _ => return None,
    };
    Some(month)
}
