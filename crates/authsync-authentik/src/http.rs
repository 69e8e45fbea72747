//! HTTP plumbing shared by every endpoint

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use authsync_core::{AuthSyncError, Result};

use crate::config::AuthentikConfig;

/// Authenticated HTTP client bound to one authentik instance
#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Client,
    api_base: String,
    token: String,
    page_size: u32,
}

/// authentik list envelope
#[derive(Debug, Deserialize)]
struct Paginated<T> {
    #[serde(default)]
    pagination: Pagination,
    results: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    /// Number of the next page, `0` on the last one
    #[serde(default)]
    next: u64,
}

impl HttpClient {
    pub fn new(config: &AuthentikConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AuthSyncError::internal_error(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_base: config.api_base(),
            token: config.token.clone(),
            page_size: config.page_size,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
    }

    /// Send a request and classify the response. No retries happen here.
    async fn execute(&self, request_builder: RequestBuilder) -> Result<Response> {
        let response = request_builder
            .send()
            .await
            .map_err(|e| AuthSyncError::remote_unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AuthSyncError::remote_unavailable(format!(
                "HTTP {} - {}",
                status, body
            )));
        }
        Err(AuthSyncError::remote_rejected(status.as_u16(), body))
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        response.json().await.map_err(|e| {
            AuthSyncError::internal_error(format!("Failed to parse authentik response: {}", e))
        })
    }

    /// Walk every page of a list endpoint
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let mut page: u64 = 1;
        let page_size = self.page_size.to_string();

        loop {
            let page_param = page.to_string();
            let response = self
                .execute(
                    self.request(reqwest::Method::GET, path)
                        .query(query)
                        .query(&[("page", page_param.as_str()), ("page_size", page_size.as_str())]),
                )
                .await?;

            let body: Paginated<T> = Self::parse(response).await?;
            all_items.extend(body.results);

            if body.pagination.next == 0 || body.pagination.next <= page {
                break;
            }
            page = body.pagination.next;
        }

        debug!(path, count = all_items.len(), "Listed authentik objects");
        Ok(all_items)
    }

    /// GET a single object; a 404 is reported as `None`
    pub async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.execute(self.request(reqwest::Method::GET, path)).await {
            Ok(response) => Self::parse(response).await.map(Some),
            Err(AuthSyncError::RemoteRejected { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .execute(self.request(reqwest::Method::POST, path).json(body))
            .await?;
        Self::parse(response).await
    }

    /// POST whose response body is ignored (membership endpoints answer 204)
    pub async fn post_no_content<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.execute(self.request(reqwest::Method::POST, path).json(body))
            .await
            .map(|_| ())
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .execute(self.request(reqwest::Method::PUT, path).json(body))
            .await?;
        Self::parse(response).await
    }

    /// DELETE; an object that is already gone counts as deleted
    pub async fn delete(&self, path: &str) -> Result<()> {
        match self.execute(self.request(reqwest::Method::DELETE, path)).await {
            Ok(_) => Ok(()),
            Err(AuthSyncError::RemoteRejected { status: 404, .. }) => {
                debug!(path, "Object already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// authentik expects integer primary keys as JSON numbers
pub(crate) fn pk_value(pk: &str) -> serde_json::Value {
    pk.parse::<i64>()
        .map(serde_json::Value::from)
        .unwrap_or_else(|_| serde_json::Value::from(pk))
}
