use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

mod filter;

pub use filter::Filter;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("row not found")]
    NotFound,
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl RestError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound | Self::Status { status: 404, .. })
    }
}

/// Client with the default request timeout.
pub fn default_http_client() -> reqwest::Result<Client> {
    http_client(Duration::from_secs(
        tracklog_config::DEFAULT_HTTP_TIMEOUT_SECS,
    ))
}

pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}

/// JSON client for a PostgREST-style API: one path segment per collection,
/// filters as query parameters, writes answered with the affected rows.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base: Url,
    api_key: Option<String>,
    limiter: Option<Arc<Limiter>>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base", &self.base.as_str())
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

impl RestClient {
    pub fn new(client: Client, base_url: &str) -> Result<Self, RestError> {
        let mut base =
            Url::parse(base_url).map_err(|e| RestError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(RestError::InvalidUrl(base_url.to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client,
            base,
            api_key: None,
            limiter: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Caps outbound requests across every clone of this client. Zero disables the cap.
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.limiter = NonZeroU32::new(requests_per_second)
            .map(|nz| Arc::new(RateLimiter::direct(Quota::per_second(nz))));
        self
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    fn url(&self, collection: &str) -> Result<Url, RestError> {
        self.base
            .join(collection)
            .map_err(|e| RestError::InvalidUrl(format!("{collection}: {e}")))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RestError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        let request = match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        };
        let response = request.header(ACCEPT, "application/json").send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>, RestError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RestError::Decode(e.to_string()))
    }

    pub async fn select<T: DeserializeOwned>(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<T>, RestError> {
        let mut query = vec![("select".to_string(), "*".to_string())];
        query.extend(filters.iter().map(Filter::to_query_pair));
        let request = self.client.get(self.url(collection)?).query(&query);
        let rows = Self::rows(self.send(request).await?).await?;
        debug!(collection, rows = rows.len(), "select");
        Ok(rows)
    }

    /// Creates one row and returns it as stored by the server.
    pub async fn insert<P, T>(&self, collection: &str, body: &P) -> Result<T, RestError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .client
            .post(self.url(collection)?)
            .header("Prefer", "return=representation")
            .json(body);
        let mut rows: Vec<T> = Self::rows(self.send(request).await?).await?;
        if rows.is_empty() {
            return Err(RestError::Decode("insert returned no row".into()));
        }
        Ok(rows.swap_remove(0))
    }

    /// Updates the row with `id`. A missing row is `NotFound`.
    pub async fn update<P, T>(&self, collection: &str, id: i64, body: &P) -> Result<T, RestError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .client
            .patch(self.url(collection)?)
            .query(&[Filter::eq("id", id).to_query_pair()])
            .header("Prefer", "return=representation")
            .json(body);
        let mut rows: Vec<T> = Self::rows(self.send(request).await?).await?;
        if rows.is_empty() {
            return Err(RestError::NotFound);
        }
        Ok(rows.swap_remove(0))
    }

    /// Returns whether a row was deleted.
    pub async fn delete(&self, collection: &str, id: i64) -> Result<bool, RestError> {
        let request = self
            .client
            .delete(self.url(collection)?)
            .query(&[Filter::eq("id", id).to_query_pair()])
            .header("Prefer", "return=representation");
        let rows: Vec<serde_json::Value> = Self::rows(self.send(request).await?).await?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = RestClient::new(Client::new(), "http://localhost:3000/rest/v1").unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/rest/v1/");
        assert_eq!(
            client.url("trips").unwrap().as_str(),
            "http://localhost:3000/rest/v1/trips"
        );
    }

    #[test]
    fn garbage_base_url_is_rejected() {
        assert!(matches!(
            RestClient::new(Client::new(), "not a url"),
            Err(RestError::InvalidUrl(_))
        ));
    }
}
