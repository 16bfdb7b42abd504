use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{ConsumptionRow, ConsumptionSink};
use crate::config::RestEndpoint;
use crate::error::{Error, Result};

/// Inserts rows through a PostgREST table endpoint (Supabase).
pub struct PostgrestSink {
    client: Client,
    insert_url: String,
    key: String,
}

impl PostgrestSink {
    pub fn new(endpoint: &RestEndpoint, table: &str) -> Self {
        Self {
            client: Client::new(),
            insert_url: insert_url(&endpoint.url, table),
            key: endpoint.key.clone(),
        }
    }
}

fn insert_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{table}", base_url.trim_end_matches('/'))
}

#[async_trait]
impl ConsumptionSink for PostgrestSink {
    async fn insert(&mut self, row: &ConsumptionRow) -> Result<()> {
        debug!(url = %self.insert_url, "POST row");
        let response = self
            .client
            .post(&self.insert_url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Store(format!("insert rejected {status}: {body}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_url() {
        assert_eq!(
            insert_url("https://abc.supabase.co/", "scraped_emails"),
            "https://abc.supabase.co/rest/v1/scraped_emails"
        );
        assert_eq!(
            insert_url("https://abc.supabase.co", "scraped_emails"),
            "https://abc.supabase.co/rest/v1/scraped_emails"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let endpoint = RestEndpoint {
            url: "http://127.0.0.1:9".to_string(),
            key: "anon".to_string(),
        };
        let mut sink = PostgrestSink::new(&endpoint, "scraped_emails");
        let row = ConsumptionRow {
            facility_id: 1,
            billing_period: None,
            electricity: Some(1.0),
            water: None,
            gas: None,
            recorded_at: "t".to_string(),
        };
        assert!(matches!(sink.insert(&row).await, Err(Error::Http(_))));
    }
}
