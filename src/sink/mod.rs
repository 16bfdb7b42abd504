// src/sink/mod.rs

mod postgrest;
mod sqlite;

pub use postgrest::PostgrestSink;
pub use sqlite::SqliteSink;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info};

use crate::error::Result;
use crate::heuristics::UtilityType;
use crate::pipeline::Reading;

/// One row of the consumption table.
///
/// Field names follow the deployed table: the facility column is
/// `hospital_id` and the insert time is `scraped_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionRow {
    #[serde(rename = "hospital_id")]
    pub facility_id: i64,
    /// `YYYY-MM-DD`, or null when the invoice date was not found.
    pub billing_period: Option<String>,
    pub electricity: Option<f64>,
    pub water: Option<f64>,
    /// Never populated; no gas invoices are parsed.
    pub gas: Option<f64>,
    #[serde(rename = "scraped_at")]
    pub recorded_at: String,
}

impl ConsumptionRow {
    pub fn from_reading(facility_id: i64, reading: &Reading, recorded_at: &str) -> Self {
        let value = reading.fragment.numeric_value;
        let (electricity, water) = match reading.fragment.utility_type {
            UtilityType::Electricity => (Some(value), None),
            UtilityType::Water => (None, Some(value)),
            UtilityType::Unknown => (None, None),
        };
        Self {
            facility_id,
            billing_period: reading.fragment.invoice_date.map(|d| d.to_string()),
            electricity,
            water,
            gas: None,
            recorded_at: recorded_at.to_string(),
        }
    }
}

/// Where readings end up.
#[async_trait]
pub trait ConsumptionSink: Send {
    /// Append one row. No dedupe: the same reading inserted twice is two rows.
    async fn insert(&mut self, row: &ConsumptionRow) -> Result<()>;
}

/// Insert one row per reading and return how many were written.
///
/// A failed insert is logged and the next row is still attempted.
pub async fn insert_batch(
    sink: &mut dyn ConsumptionSink,
    facility_id: i64,
    readings: &[Reading],
) -> usize {
    let now = OffsetDateTime::now_utc();
    let recorded_at = now.format(&Rfc3339).unwrap_or_else(|_| now.to_string());

    let mut written = 0;
    for reading in readings {
        let row = ConsumptionRow::from_reading(facility_id, reading, &recorded_at);
        match sink.insert(&row).await {
            Ok(()) => {
                written += 1;
                info!(
                    utility = ?reading.fragment.utility_type,
                    value = %reading.fragment.raw_value,
                    billing_period = ?row.billing_period,
                    "Saved to database"
                );
            }
            Err(e) => {
                error!(error = %e, file = %reading.source_filename, "Error saving reading");
            }
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::heuristics::ReadingFragment;
    use time::{Date, Month};

    pub(crate) fn reading(utility_type: UtilityType, value: f64, date: Option<Date>) -> Reading {
        Reading {
            fragment: ReadingFragment {
                utility_type,
                raw_value: value.to_string().replace('.', ","),
                numeric_value: value,
                invoice_date: date,
                month_defaulted: false,
            },
            source_filename: "fatura.pdf".to_string(),
            email_subject: "Fatura".to_string(),
            email_sender: "faturas@example.pt".to_string(),
            email_date: "Mon, 4 Mar 2024 10:00:00 +0000".to_string(),
        }
    }

    /// Keeps rows in memory, failing every insert whose index is in `fail_on`.
    struct MemorySink {
        rows: Vec<ConsumptionRow>,
        attempts: usize,
        fail_on: Vec<usize>,
    }

    #[async_trait]
    impl ConsumptionSink for MemorySink {
        async fn insert(&mut self, row: &ConsumptionRow) -> Result<()> {
            let attempt = self.attempts;
            self.attempts += 1;
            if self.fail_on.contains(&attempt) {
                return Err(Error::Store("insert rejected".to_string()));
            }
            self.rows.push(row.clone());
            Ok(())
        }
    }

    #[test]
    fn test_row_columns_by_utility() {
        let date = Date::from_calendar_date(2024, Month::March, 5).unwrap();
        let water = ConsumptionRow::from_reading(
            1,
            &reading(UtilityType::Water, 12.5, Some(date)),
            "2024-03-06T00:00:00Z",
        );
        assert_eq!(water.water, Some(12.5));
        assert_eq!(water.electricity, None);
        assert_eq!(water.gas, None);
        assert_eq!(water.billing_period.as_deref(), Some("2024-03-05"));

        let power = ConsumptionRow::from_reading(1, &reading(UtilityType::Electricity, 340.0, None), "t");
        assert_eq!(power.electricity, Some(340.0));
        assert_eq!(power.water, None);
        assert_eq!(power.billing_period, None);

        let unknown = ConsumptionRow::from_reading(1, &reading(UtilityType::Unknown, 1.0, None), "t");
        assert_eq!((unknown.water, unknown.electricity), (None, None));
    }

    #[test]
    fn test_row_serializes_with_table_column_names() {
        let row = ConsumptionRow::from_reading(3, &reading(UtilityType::Water, 7.25, None), "t");
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["hospital_id"], 3);
        assert_eq!(json["water"], 7.25);
        assert!(json["electricity"].is_null());
        assert!(json["gas"].is_null());
        assert!(json["billing_period"].is_null());
        assert_eq!(json["scraped_at"], "t");
    }

    #[tokio::test]
    async fn test_batch_one_row_per_reading() {
        let readings = vec![
            reading(UtilityType::Water, 10.0, None),
            reading(UtilityType::Electricity, 340.0, None),
            reading(UtilityType::Water, 10.0, None),
        ];
        let mut sink = MemorySink {
            rows: Vec::new(),
            attempts: 0,
            fail_on: vec![],
        };
        let written = insert_batch(&mut sink, 1, &readings).await;
        assert_eq!(written, 3);
        assert_eq!(sink.rows.len(), 3);
        for row in &sink.rows {
            assert!(row.water.is_some() != row.electricity.is_some());
            assert!(row.gas.is_none());
        }
    }

    #[tokio::test]
    async fn test_batch_continues_after_failed_insert() {
        let readings = vec![
            reading(UtilityType::Water, 1.0, None),
            reading(UtilityType::Water, 2.0, None),
            reading(UtilityType::Electricity, 3.0, None),
        ];
        let mut sink = MemorySink {
            rows: Vec::new(),
            attempts: 0,
            fail_on: vec![0],
        };
        let written = insert_batch(&mut sink, 1, &readings).await;
        assert_eq!(written, 2);
        assert_eq!(sink.attempts, 3);
        assert_eq!(sink.rows[0].water, Some(2.0));
    }
}
