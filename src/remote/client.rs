// VAYMN - Library Mirror Core
// Copyright (C) 2025 VAYMN contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! HTTP client for the remote REST store
//!
//! Speaks the PostgREST dialect served by Supabase under `/rest/v1/{table}`.
//!
//! # Requests
//! | Operation | Request |
//! |---|---|
//! | select | `GET ?select=*&order={column}.asc` |
//! | count | `GET ?select=id` with `Prefer: count=exact` and `Range: 0-0`, total read from `Content-Range` |
//! | insert | `POST` JSON array, `Prefer: return=minimal` |
//! | upsert | `POST` JSON array, `Prefer: resolution=merge-duplicates,return=minimal` |
//! | delete | `DELETE ?id=eq.{id}` |
//! | probe | `GET ?select=id&limit=1` |
//!
//! Every request carries `apikey` and `Authorization: Bearer` with the anon key.
//!
//! # Failure handling
//! Nothing here retries. A failed request becomes an error and the mirror
//! treats it as best-effort: logged, then dropped.

use super::{RemoteStore, Table};
use crate::config::RemoteConfig;
use crate::error::{Result, VaymnError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_RANGE, USER_AGENT};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Path prefix of the REST API on the remote host
const REST_PATH: &str = "rest/v1/";

const DEFAULT_USER_AGENT: &str = "vaymn-core/0.1";

/// Longest response body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// Client for one remote project
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    /// Underlying HTTP client
    client: Client,
    /// `{project}/rest/v1/`
    rest_url: Url,
}

impl PostgrestClient {
    /// Build a client for `config`
    ///
    /// # Arguments
    /// * `config` - Remote URL and anon key
    /// * `timeout` - Per-request timeout; `None` waits indefinitely
    ///
    /// # Errors
    /// Returns error if the key is not a valid header value or the HTTP
    /// client cannot be built
    pub fn new(config: &RemoteConfig, timeout: Option<Duration>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.anon_key)
            .map_err(|e| VaymnError::InvalidConfiguration(format!("Invalid API key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.anon_key))
            .map_err(|e| VaymnError::InvalidConfiguration(format!("Invalid API key: {}", e)))?;

        headers.insert(HeaderName::from_static("apikey"), key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        let mut builder = Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            rest_url: rest_base(&config.url)?,
        })
    }

    /// `{project}/rest/v1/{table}`
    pub fn table_url(&self, table: Table) -> Result<Url> {
        Ok(self.rest_url.join(table.as_str())?)
    }

    /// Send a prepared request, turning transport failures and non-2xx
    /// statuses into errors
    async fn send(&self, table: Table, request: reqwest::RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| VaymnError::RemoteUnreachable(format!("{}: {}", table, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = clip(&response.text().await.unwrap_or_default());
        Err(VaymnError::remote_failed(
            format!("{} responded {}: {}", table, status, body),
            Some(status.as_u16()),
            Some(table.to_string()),
        ))
    }
}

/// Normalize the project URL so relative joins land under `rest/v1/`
fn rest_base(project: &Url) -> Result<Url> {
    let mut base = project.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(REST_PATH)?)
}

/// First [`MAX_ERROR_BODY`] characters of a response body
fn clip(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl RemoteStore for PostgrestClient {
    async fn select_ordered(&self, table: Table) -> Result<Vec<Value>> {
        let order = format!("{}.asc", table.order_column());
        let request = self
            .client
            .get(self.table_url(table)?)
            .query(&[("select", "*"), ("order", order.as_str())]);

        let response = self.send(table, request).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| VaymnError::InvalidRemoteResponse {
            message: format!("{} rows are not a JSON array: {}", table, e),
            response_body: Some(clip(&body)),
        })
    }

    async fn count(&self, table: Table) -> Result<u64> {
        let request = self
            .client
            .get(self.table_url(table)?)
            .query(&[("select", "id")])
            .header("Prefer", "count=exact")
            .header("Range-Unit", "items")
            .header("Range", "0-0");

        let response = self.send(table, request).await?;
        let header = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| VaymnError::InvalidRemoteResponse {
                message: format!("{} count response has no Content-Range", table),
                response_body: None,
            })?;

        parse_content_range_total(header).ok_or_else(|| VaymnError::InvalidRemoteResponse {
            message: format!("{} count response has unreadable Content-Range '{}'", table, header),
            response_body: None,
        })
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<()> {
        let request = self
            .client
            .post(self.table_url(table)?)
            .header("Prefer", "return=minimal")
            .json(&rows);

        self.send(table, request).await?;
        Ok(())
    }

    async fn upsert(&self, table: Table, rows: Vec<Value>) -> Result<()> {
        let request = self
            .client
            .post(self.table_url(table)?)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows);

        self.send(table, request).await?;
        Ok(())
    }

    async fn delete(&self, table: Table, id: &str) -> Result<()> {
        let filter = format!("eq.{}", id);
        let request = self
            .client
            .delete(self.table_url(table)?)
            .query(&[("id", filter.as_str())]);

        self.send(table, request).await?;
        Ok(())
    }

    async fn probe(&self, table: Table) -> Result<()> {
        let request = self
            .client
            .get(self.table_url(table)?)
            .query(&[("select", "id"), ("limit", "1")]);

        self.send(table, request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> RemoteConfig {
        RemoteConfig::parse(url, "eyJhbGciOiJIUzI1NiJ9.anon-test-key").unwrap()
    }

    #[test]
    fn test_table_url() {
        let client = PostgrestClient::new(&config("https://abc.supabase.co"), None).unwrap();
        assert_eq!(
            client.table_url(Table::Books).unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/books"
        );
    }

    #[test]
    fn test_table_url_keeps_path_prefix() {
        let client =
            PostgrestClient::new(&config("http://localhost:54321/project"), Some(Duration::from_secs(3)))
                .unwrap();
        assert_eq!(
            client.table_url(Table::Admins).unwrap().as_str(),
            "http://localhost:54321/project/rest/v1/admins"
        );
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-0/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_clip_keeps_whole_characters() {
        let body = format!("{}é", "a".repeat(MAX_ERROR_BODY - 1));
        assert_eq!(body.len(), MAX_ERROR_BODY + 1);

        let clipped = clip(&body);
        assert_eq!(clipped.chars().count(), MAX_ERROR_BODY);
        assert!(clipped.ends_with('é'));

        let long = "ü".repeat(MAX_ERROR_BODY * 2);
        assert_eq!(clip(&long).chars().count(), MAX_ERROR_BODY);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_remote_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = PostgrestClient::new(
            &config("http://127.0.0.1:9"),
            Some(Duration::from_secs(2)),
        )
        .unwrap();

        let err = client.probe(Table::Books).await.unwrap_err();
        assert!(err.is_remote_error());
    }
}
