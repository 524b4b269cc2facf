//! Scripted collaborators shared by the unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::error::{TrackerError, TrackerResult};
use crate::http::{HttpResponse, HttpTransport};
use crate::notifier::DeliveryChannel;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub form: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

struct Route {
    method: &'static str,
    url_fragment: String,
    body_field: Option<(String, String)>,
    /// The last response repeats once the others are used up
    responses: VecDeque<HttpResponse>,
}

impl Route {
    fn matches(&self, method: &str, url: &str, body: Option<&Value>) -> bool {
        if self.method != method || !url.contains(&self.url_fragment) {
            return false;
        }
        match &self.body_field {
            None => true,
            Some((key, value)) => body
                .and_then(|b| b.get(key))
                .and_then(Value::as_str)
                .is_some_and(|v| v == value),
        }
    }

    fn next_response(&mut self) -> HttpResponse {
        if self.responses.len() > 1 {
            self.responses.pop_front().unwrap_or_default()
        } else {
            self.responses.front().cloned().unwrap_or_default()
        }
    }
}

/// Pauses the first request to a URL until released.
pub struct Gate {
    url_fragment: String,
    entered: Notify,
    released: Notify,
}

impl Gate {
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

/// In-memory [`HttpTransport`] answering from scripted routes.
///
/// Routes that match on a body field win over plain URL routes.
/// Unmatched requests get a 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<RecordedRequest>>,
    gates: Mutex<Vec<Arc<Gate>>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn set_route(
        &self,
        method: &'static str,
        url_fragment: &str,
        body_field: Option<(String, String)>,
        responses: Vec<HttpResponse>,
    ) {
        let mut routes = self.routes.lock().unwrap();
        routes.retain(|r| {
            !(r.method == method && r.url_fragment == url_fragment && r.body_field == body_field)
        });
        routes.push(Route {
            method,
            url_fragment: url_fragment.to_string(),
            body_field,
            responses: responses.into(),
        });
    }

    pub fn on(&self, method: &'static str, url_fragment: &str, response: HttpResponse) {
        self.set_route(method, url_fragment, None, vec![response]);
    }

    pub fn on_sequence(
        &self,
        method: &'static str,
        url_fragment: &str,
        responses: Vec<HttpResponse>,
    ) {
        self.set_route(method, url_fragment, None, responses);
    }

    pub fn on_body(
        &self,
        method: &'static str,
        url_fragment: &str,
        key: &str,
        value: &str,
        response: HttpResponse,
    ) {
        let field = Some((key.to_string(), value.to_string()));
        self.set_route(method, url_fragment, field, vec![response]);
    }

    pub fn hold(&self, url_fragment: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate {
            url_fragment: url_fragment.to_string(),
            entered: Notify::new(),
            released: Notify::new(),
        });
        self.gates.lock().unwrap().push(gate.clone());
        gate
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, url_fragment: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.contains(url_fragment))
            .count()
    }

    async fn respond(&self, request: RecordedRequest) -> TrackerResult<HttpResponse> {
        let gate = {
            let mut gates = self.gates.lock().unwrap();
            let index = gates
                .iter()
                .position(|g| request.url.contains(&g.url_fragment));
            index.map(|i| gates.remove(i))
        };

        let response = {
            let mut routes = self.routes.lock().unwrap();
            let body = request.body.as_ref();
            let index = routes
                .iter()
                .position(|r| r.body_field.is_some() && r.matches(request.method, &request.url, body))
                .or_else(|| {
                    routes
                        .iter()
                        .position(|r| r.matches(request.method, &request.url, body))
                });
            index.map(|i| routes[i].next_response())
        };

        self.requests.lock().unwrap().push(request);

        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.released.notified().await;
        }

        Ok(response.unwrap_or_else(|| HttpResponse::new(404, "")))
    }
}

fn owned_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> TrackerResult<HttpResponse> {
        self.respond(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            headers: owned_pairs(headers),
            body: None,
            form: Vec::new(),
        })
        .await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> TrackerResult<HttpResponse> {
        self.respond(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            headers: owned_pairs(headers),
            body: Some(body.clone()),
            form: Vec::new(),
        })
        .await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> TrackerResult<HttpResponse> {
        self.respond(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
            form: owned_pairs(form),
        })
        .await
    }
}

/// Delivery channel that records every message it is handed.
pub struct RecordingChannel {
    name: String,
    fail: bool,
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: false,
            messages: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: true,
            messages: Mutex::new(Vec::new()),
        })
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.messages().into_iter().map(|(title, _)| title).collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, title: &str, body: &str) -> TrackerResult<()> {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        if self.fail {
            return Err(TrackerError::Transport(500));
        }
        Ok(())
    }
}
