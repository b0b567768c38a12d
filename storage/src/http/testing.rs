use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use http::Extensions;
use reqwest::header::HeaderMap;
use reqwest::{Request, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use url::Url;

/// A request observed by [`MockTransport`].
#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl RecordedRequest {
    pub fn query(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn header(&self, key: &str) -> Option<String> {
        self.headers.get(key).and_then(|v| v.to_str().ok()).map(|v| v.to_string())
    }

    pub fn json(&self) -> serde_json::Value {
        self.body
            .as_ref()
            .and_then(|b| serde_json::from_slice(b).ok())
            .unwrap_or(serde_json::Value::Null)
    }
}

struct ScriptedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

#[derive(Default)]
struct State {
    responses: VecDeque<ScriptedResponse>,
    requests: Vec<RecordedRequest>,
}

/// In-process transport: answers requests from a script, in order, and records them.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.respond_with_headers(status, &[], body)
    }

    pub fn respond_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.respond_with_headers(status, &[("content-type", "application/json")], body.to_string())
    }

    pub fn respond_with_headers(&self, status: u16, headers: &[(&str, &str)], body: impl Into<Vec<u8>>) -> &Self {
        self.state.lock().unwrap().responses.push_back(ScriptedResponse {
            status,
            headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            body: body.into(),
        });
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn client(&self) -> ClientWithMiddleware {
        ClientBuilder::new(reqwest::Client::new()).with(self.clone()).build()
    }
}

#[async_trait::async_trait]
impl Middleware for MockTransport {
    async fn handle(
        &self,
        req: Request,
        _extensions: &mut Extensions,
        _next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let recorded = RecordedRequest {
            method: req.method().to_string(),
            url: req.url().clone(),
            headers: req.headers().clone(),
            body: req.body().and_then(|b| b.as_bytes()).map(|b| b.to_vec()),
        };
        tracing::trace!("mock transport: {} {}", recorded.method, recorded.url);

        let scripted = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(recorded.clone());
            state.responses.pop_front()
        };
        let scripted = scripted.ok_or_else(|| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!(
                "unexpected request {} {}",
                recorded.method,
                recorded.url
            ))
        })?;

        let mut builder = http::Response::builder().status(scripted.status);
        for (k, v) in &scripted.headers {
            builder = builder.header(k, v);
        }
        let response = builder
            .body(scripted.body)
            .map_err(|e| reqwest_middleware::Error::Middleware(e.into()))?;
        Ok(Response::from(response))
    }
}
