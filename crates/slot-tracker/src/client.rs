//! Authenticated calls to the booking service.

use serde::de::DeserializeOwned;
use serde_json::Value;
use shared_types::Envelope;
use std::sync::Arc;

use crate::error::{TrackerError, TrackerResult};
use crate::http::HttpTransport;
use crate::reporter::ErrorReporter;
use crate::session::SessionManager;

pub const HTTP_ERROR_CONTEXT: &str = "HTTP request error";
pub const API_ERROR_CONTEXT: &str = "API response error";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36 Edg/134.0.0.0";

const STATUS_OK: u16 = 200;
const STATUS_UNAUTHORIZED: u16 = 401;

pub struct UpstreamClient {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionManager>,
    reporter: Arc<ErrorReporter>,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        session: Arc<SessionManager>,
        reporter: Arc<ErrorReporter>,
        base_url: &str,
    ) -> Self {
        Self {
            transport,
            session,
            reporter,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POST `body` to `endpoint` and unwrap the response envelope.
    ///
    /// `Ok(None)` means "nothing usable this cycle": the session was
    /// rejected (credential dropped, not reported), or the request failed
    /// at the HTTP or application level (already reported). Errors from
    /// login and from the transport itself are returned to the caller.
    pub async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> TrackerResult<Option<T>> {
        let credential = self.session.get_credential().await?;
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .transport
            .post_json(
                &url,
                &[("Cookie", credential.as_str()), ("User-Agent", USER_AGENT)],
                body,
            )
            .await?;

        match response.status {
            STATUS_UNAUTHORIZED => {
                tracing::warn!("{} rejected the session credential, will log in again", endpoint);
                self.session.invalidate();
                Ok(None)
            }
            STATUS_OK => {
                let envelope: Envelope<T> = serde_json::from_str(&response.body)?;
                match envelope.into_result() {
                    Ok(payload) => Ok(Some(payload)),
                    Err(message) => {
                        self.reporter
                            .report(API_ERROR_CONTEXT, &TrackerError::Application(message))
                            .await;
                        Ok(None)
                    }
                }
            }
            status => {
                self.reporter
                    .report(HTTP_ERROR_CONTEXT, &TrackerError::Transport(status))
                    .await;
                Ok(None)
            }
        }
    }
}
