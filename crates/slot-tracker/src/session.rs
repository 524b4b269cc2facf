//! Session credential lifecycle.
//!
//! The booking service accepts a long-lived source credential only at its
//! login endpoint, which answers with a redirect carrying the short-lived
//! session cookie. [`SessionManager`] caches that cookie and drops it when
//! the upstream rejects it or when the source credential changes.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::SOURCE_CREDENTIAL_VAR;
use crate::error::{TrackerError, TrackerResult};
use crate::http::HttpTransport;

/// Cookie carrying the session credential
pub const SESSION_COOKIE: &str = "FuWuChuang";

const LOGIN_PATH: &str = "Account/Login?ReturnUrl=%2Fapp%2Funattended%2Findex.html";
const LOGIN_REDIRECT_STATUS: u16 = 302;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieLookup {
    Found(String),
    NotFound,
}

/// Find the first non-empty `name=value` pair across `Set-Cookie` headers.
///
/// Headers are scanned in order and each header from left to right; the
/// value runs up to the next `;` or the end of the header.
pub fn find_cookie(set_cookie_headers: &[&str], name: &str) -> CookieLookup {
    let needle = format!("{}=", name);

    for header in set_cookie_headers {
        for (start, _) in header.match_indices(&needle) {
            let rest = &header[start + needle.len()..];
            let value = rest.split(';').next().unwrap_or_default();
            if !value.is_empty() {
                return CookieLookup::Found(value.to_string());
            }
        }
    }

    CookieLookup::NotFound
}

#[derive(Debug, Default)]
struct SessionState {
    source: Option<String>,
    credential: Option<String>,
    /// Bumped on every invalidation so in-flight logins can tell they are stale
    generation: u64,
}

pub struct SessionManager {
    transport: Arc<dyn HttpTransport>,
    login_url: String,
    state: RwLock<SessionState>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: &str, source: Option<String>) -> Self {
        Self {
            transport,
            login_url: format!("{}/{}", base_url.trim_end_matches('/'), LOGIN_PATH),
            state: RwLock::new(SessionState {
                source,
                ..Default::default()
            }),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached credential, or a fresh one from the login endpoint.
    pub async fn get_credential(&self) -> TrackerResult<String> {
        let (source, generation) = {
            let state = self.read_state();
            if let Some(credential) = &state.credential {
                return Ok(credential.clone());
            }
            (state.source.clone(), state.generation)
        };

        let source =
            source.ok_or_else(|| TrackerError::AuthConfig(SOURCE_CREDENTIAL_VAR.to_string()))?;

        tracing::info!("Requesting a new session credential");
        let credential = self.login(&source).await?;

        let mut state = self.write_state();
        if state.generation == generation {
            state.credential = Some(credential.clone());
            tracing::info!("Session credential renewed");
        } else {
            tracing::debug!("Session invalidated during login, not caching the result");
        }

        Ok(credential)
    }

    async fn login(&self, source: &str) -> TrackerResult<String> {
        let cookie = format!("{}={}", SOURCE_CREDENTIAL_VAR, source);
        let response = self
            .transport
            .get(&self.login_url, &[("Cookie", cookie.as_str())])
            .await?;

        if response.status != LOGIN_REDIRECT_STATUS {
            return Err(TrackerError::login_failed(format!(
                "unexpected status {}",
                response.status
            )));
        }

        let set_cookies = response.header_values("set-cookie");
        if set_cookies.is_empty() {
            return Err(TrackerError::login_failed(
                "redirect carried no Set-Cookie header",
            ));
        }

        match find_cookie(&set_cookies, SESSION_COOKIE) {
            CookieLookup::Found(value) => Ok(format!("{}={}", SESSION_COOKIE, value)),
            CookieLookup::NotFound => Err(TrackerError::login_failed(format!(
                "no {} cookie in response",
                SESSION_COOKIE
            ))),
        }
    }

    /// Drop the cached credential; the next call logs in again.
    pub fn invalidate(&self) {
        let mut state = self.write_state();
        state.credential = None;
        state.generation += 1;
    }

    /// Swap in a new source credential and drop the cached session.
    pub fn replace_source(&self, source: String) {
        let mut state = self.write_state();
        state.source = Some(source);
        state.credential = None;
        state.generation += 1;
    }

    pub fn has_source(&self) -> bool {
        self.read_state().source.is_some()
    }

    pub fn cached_credential(&self) -> Option<String> {
        self.read_state().credential.clone()
    }
}
