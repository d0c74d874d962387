//! Supabase REST API client using service_role key

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::Config;

/// Supabase client for server-side database operations
/// Uses service_role key which bypasses RLS - handle with care!
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn rest_url_with(&self, table: &str, query: &str) -> String {
        if query.is_empty() {
            self.rest_url(table)
        } else {
            format!("{}?{}", self.rest_url(table), query)
        }
    }

    /// Attach the service role credentials
    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
    }

    /// Send and turn non-2xx statuses into `SupabaseError::Api`
    async fn send(builder: RequestBuilder) -> Result<Response, SupabaseError> {
        let response = builder.send().await.map_err(SupabaseError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SupabaseError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, SupabaseError> {
        let url = self.rest_url_with(table, query);
        let response = Self::send(self.authed(self.client.get(&url))).await?;
        response.json().await.map_err(SupabaseError::Parse)
    }

    /// Make an authenticated GET request expecting at most one row
    pub async fn get_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, SupabaseError> {
        let query = if query.contains("limit=") {
            query.to_string()
        } else {
            format!("{}&limit=1", query)
        };
        let rows: Vec<T> = self.get(table, &query).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert without reading the row back
    pub async fn insert_minimal<T: Serialize>(
        &self,
        table: &str,
        data: &T,
    ) -> Result<(), SupabaseError> {
        let url = self.rest_url(table);

        Self::send(
            self.authed(self.client.post(&url))
                .header("Prefer", "return=minimal")
                .json(data),
        )
        .await?;

        Ok(())
    }

    /// PATCH and return the rows that matched the filter
    ///
    /// An empty vector means nothing matched, which callers use as the
    /// signal that a guarded update lost a race.
    pub async fn update_returning<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
        data: &T,
    ) -> Result<Vec<R>, SupabaseError> {
        let url = self.rest_url_with(table, query);

        let response = Self::send(
            self.authed(self.client.patch(&url))
                .header("Prefer", "return=representation")
                .json(data),
        )
        .await?;

        response.json().await.map_err(SupabaseError::Parse)
    }

    /// Upsert (insert or update on conflict) and return the stored rows
    pub async fn upsert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        data: &T,
        on_conflict: &str,
    ) -> Result<Vec<R>, SupabaseError> {
        let url = format!("{}?on_conflict={}", self.rest_url(table), on_conflict);

        let response = Self::send(
            self.authed(self.client.post(&url))
                .header("Prefer", "resolution=merge-duplicates,return=representation")
                .json(data),
        )
        .await?;

        response.json().await.map_err(SupabaseError::Parse)
    }
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),
}
