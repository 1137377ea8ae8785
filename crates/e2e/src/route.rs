//! Request routing with Playwright's interception semantics
//!
//! Routes are consulted newest first. A handler may fall back to the routes
//! registered before it, and a route registered with `times` stops handling
//! requests once it has been invoked that many times.
//!
//! This table serves in-process dispatch; browser runs register the
//! equivalent `page.route` handlers in the generated script instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::E2eResult;

/// Intercepted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub method: String,
    pub url: String,
}

impl RouteRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
        }
    }
}

/// Body of a fulfilled request
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

/// Response handed back to the browser instead of hitting the network
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub body: ResponseBody,
    pub content_type: Option<String>,
}

impl MockResponse {
    pub fn json(value: Value) -> Self {
        Self {
            status: 200,
            body: ResponseBody::Json(value),
            content_type: Some("application/json".to_string()),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: ResponseBody::Text(body.into()),
            content_type: None,
        }
    }
}

/// What happens to an intercepted request
#[derive(Debug, Clone, PartialEq)]
pub enum RouteAction {
    Fulfill(MockResponse),
    Abort(String),
    /// Hand the request to the previously registered route
    Fallback,
    /// Let the request reach the network
    Continue,
}

#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, request: &RouteRequest) -> E2eResult<RouteAction>;
}

/// Handler that aborts everything it receives
pub struct AbortHandler {
    pub reason: String,
}

#[async_trait]
impl RouteHandler for AbortHandler {
    async fn handle(&self, _request: &RouteRequest) -> E2eResult<RouteAction> {
        Ok(RouteAction::Abort(self.reason.clone()))
    }
}

/// Glob over absolute URLs: `*` stays within a path segment, `**` crosses them
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    pattern: Pattern,
}

impl UrlPattern {
    pub fn new(source: &str) -> E2eResult<Self> {
        Ok(Self {
            source: source.to_string(),
            pattern: Pattern::new(source)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, url: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.pattern.matches_with(url, options)
    }
}

/// Tag distinguishing routes registered by tests from built-in ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Guard,
    Recording,
    Mock,
}

struct Route {
    pattern: UrlPattern,
    handler: Arc<dyn RouteHandler>,
    kind: RouteKind,
    times: Option<usize>,
    hits: AtomicUsize,
}

impl Route {
    /// Reserve one invocation; false once `times` is used up
    fn try_claim(&self) -> bool {
        match self.times {
            None => {
                self.hits.fetch_add(1, Ordering::SeqCst);
                true
            }
            Some(limit) => self
                .hits
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |hits| {
                    (hits < limit).then_some(hits + 1)
                })
                .is_ok(),
        }
    }
}

#[derive(Default)]
pub struct RouteTable {
    routes: RwLock<Vec<Arc<Route>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        pattern: UrlPattern,
        handler: Arc<dyn RouteHandler>,
        kind: RouteKind,
        times: Option<usize>,
    ) {
        debug!("Registering {:?} route {}", kind, pattern.as_str());
        self.routes.write().push(Arc::new(Route {
            pattern,
            handler,
            kind,
            times,
            hits: AtomicUsize::new(0),
        }));
    }

    /// Remove every route of the given kind
    pub fn remove_kind(&self, kind: RouteKind) {
        self.routes.write().retain(|r| r.kind != kind);
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route a request through the table, newest route first
    pub async fn dispatch(&self, request: &RouteRequest) -> E2eResult<RouteAction> {
        let routes: Vec<Arc<Route>> = self.routes.read().iter().rev().cloned().collect();

        for route in routes {
            if !route.pattern.matches(&request.url) || !route.try_claim() {
                continue;
            }
            match route.handler.handle(request).await? {
                RouteAction::Fallback => continue,
                action => return Ok(action),
            }
        }

        Ok(RouteAction::Continue)
    }
}
