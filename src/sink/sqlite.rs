use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::fs;
use std::path::Path;
use tracing::info;

use super::{ConsumptionRow, ConsumptionSink};
use crate::error::{Error, Result};

/// Consumption table in a local SQLite file.
pub struct SqliteSink {
    conn: Connection,
    table: String,
}

impl SqliteSink {
    /// Open (or create) the database and make sure the table exists.
    pub fn open<P: AsRef<Path>>(db_path: P, table: &str) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        info!(path = %db_path.display(), "Database opened");
        Self::with_connection(conn, table)
    }

    #[cfg(test)]
    pub fn in_memory(table: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::Config(format!("invalid table name: {table:?}")));
        }

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    hospital_id INTEGER NOT NULL,
                    billing_period TEXT,
                    electricity REAL,
                    water REAL,
                    gas REAL,
                    scraped_at TEXT NOT NULL
                )"
            ),
            [],
        )?;

        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_period ON {table}(hospital_id, billing_period)"
            ),
            [],
        )?;

        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }
}

#[async_trait]
impl ConsumptionSink for SqliteSink {
    async fn insert(&mut self, row: &ConsumptionRow) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {}
                    (hospital_id, billing_period, electricity, water, gas, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                self.table
            ),
            params![
                row.facility_id,
                row.billing_period,
                row.electricity,
                row.water,
                row.gas,
                row.recorded_at,
            ],
        )?;
        Ok(())
    }
}
