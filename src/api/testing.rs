//! Scripted transport for tests.
//!
//! Routes are matched in registration order. Each route replays its
//! responses in sequence and keeps repeating the last one.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::transport::{ApiRequest, ApiResponse, RequestBody, Transport};
use crate::error::{ActionError, Result};

#[derive(Debug, Clone)]
pub struct Scripted {
    reply: std::result::Result<ApiResponse, String>,
    delay: Option<Duration>,
}

impl Scripted {
    pub fn status(status: u16, body: &str) -> Self {
        Self {
            reply: Ok(ApiResponse::new(status, body)),
            delay: None,
        }
    }

    pub fn network(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            delay: None,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// What the transport saw for one request.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub token: String,
    pub json: Option<Value>,
    pub multipart_fields: HashMap<String, String>,
    pub file_name: Option<String>,
}

type Matcher = Box<dyn Fn(&ApiRequest) -> bool + Send + Sync>;

struct Route {
    matcher: Matcher,
    responses: VecDeque<Scripted>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route for every request whose path equals `path`.
    pub fn on_path(self, path: &str, responses: Vec<Scripted>) -> Self {
        let path = path.to_string();
        self.on(move |req| req.path == path, responses)
    }

    /// Adds a route for JSON requests whose body has `node_id == node`.
    pub fn on_node(self, node: &str, responses: Vec<Scripted>) -> Self {
        let node = node.to_string();
        self.on(
            move |req| match &req.body {
                RequestBody::Json(body) => body["node_id"] == Value::from(node.as_str()),
                _ => false,
            },
            responses,
        )
    }

    pub fn on<F>(self, matcher: F, responses: Vec<Scripted>) -> Self
    where
        F: Fn(&ApiRequest) -> bool + Send + Sync + 'static,
    {
        self.routes.lock().unwrap().push(Route {
            matcher: Box::new(matcher),
            responses: responses.into(),
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.path == path)
            .collect()
    }

    fn record(&self, request: &ApiRequest, token: &SecretString) {
        let (json, multipart_fields, file_name) = match &request.body {
            RequestBody::Empty => (None, HashMap::new(), None),
            RequestBody::Json(value) => (Some(value.clone()), HashMap::new(), None),
            RequestBody::Multipart(body) => (
                None,
                body.fields.iter().cloned().collect(),
                Some(body.file.file_name.clone()),
            ),
        };

        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method.to_string(),
            path: request.path.clone(),
            query: request.query.clone(),
            token: token.expose_secret().to_string(),
            json,
            multipart_fields,
            file_name,
        });
    }

    fn next_reply(&self, request: &ApiRequest) -> Option<Scripted> {
        let mut routes = self.routes.lock().unwrap();
        let route = routes.iter_mut().find(|r| (r.matcher)(request))?;
        if route.responses.len() > 1 {
            route.responses.pop_front()
        } else {
            route.responses.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest, token: &SecretString) -> Result<ApiResponse> {
        self.record(request, token);

        let scripted = self
            .next_reply(request)
            .ok_or_else(|| ActionError::Network(format!("no scripted reply for {}", request.label())))?;

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }

        scripted.reply.map_err(ActionError::Network)
    }
}
