//! HTTP seam between the engine and the network.
//!
//! The session manager, upstream client and delivery channels only see
//! [`HttpTransport`]; production wires in [`ReqwestTransport`].

use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::time::Duration;

use crate::error::TrackerResult;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully-read response. Header names are lowercase.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// All values of a header, in the order received
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET without following redirects
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> TrackerResult<HttpResponse>;

    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> TrackerResult<HttpResponse>;

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> TrackerResult<HttpResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> TrackerResult<Self> {
        // Login signals success with a 302 whose Set-Cookie we must read
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> TrackerResult<HttpResponse> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> TrackerResult<HttpResponse> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        Self::read(request.send().await?).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> TrackerResult<HttpResponse> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        Self::read(request.send().await?).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> TrackerResult<HttpResponse> {
        let response = self.client.post(url).form(form).send().await?;
        Self::read(response).await
    }
}
