//! API mocking for a single test
//!
//! `MockServerHelper` owns the route table of one test. Routes are layered,
//! lowest priority first:
//!
//! 1. strict guard: aborts every API call nothing else handled
//! 2. recording replay: answers from the test's HAR recording
//! 3. mocks registered with [`MockServerHelper::use_mocks`]
//!
//! Fixture files ending in `.json` are parsed and have their `${name}`
//! placeholders filled from the mock's variables before being served.
//!
//! The route table itself is dispatched in-process only, through
//! [`MockServerHelper::route`], by library users and tests. A browser run
//! never goes through it: the runner renders the registered mocks into the
//! Playwright script (see `playwright::mock_route_js`), with fixtures
//! resolved up front. [`MockSource::Handler`] mocks are rejected there.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockwright_common::{replace_variables, Har, HarLocation, HarStore, RunMode, TestInfo, Variables};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{AppConfig, MockOptions};
use crate::error::{E2eError, E2eResult};
use crate::monitor::NetworkMonitor;
use crate::route::{
    AbortHandler, MockResponse, ResponseBody, RouteAction, RouteHandler, RouteKind, RouteRequest,
    RouteTable, UrlPattern,
};

/// Abort reason used by the strict guard
pub const STRICT_ABORT_REASON: &str = "accessdenied";

/// Prefix of mock paths served from the test's recording
const HAR_PATH_PREFIX: &str = "har/";

/// Custom response logic for a mocked route
#[async_trait]
pub trait MockHandler: Send + Sync {
    async fn handle(&self, request: &RouteRequest, utils: &ResponseUtils) -> E2eResult<RouteAction>;
}

/// Where a mocked route gets its response from
#[derive(Clone)]
pub enum MockSource {
    /// Fixture file, or `har/<name>` for a file of the recording
    File(String),
    /// Inline JSON body
    Json(Value),
    Handler(Arc<dyn MockHandler>),
}

impl std::fmt::Debug for MockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl From<&str> for MockSource {
    fn from(path: &str) -> Self {
        Self::File(path.to_string())
    }
}

impl From<Value> for MockSource {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Per-mock options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseMeta {
    /// Number of requests the mock answers before it is skipped
    pub times: Option<usize>,

    /// Bindings for `${name}` placeholders in JSON fixtures
    pub vars: Option<Variables>,

    pub delay_ms: Option<u64>,
}

/// A mocked API route
#[derive(Debug, Clone)]
pub struct UseApi {
    pub method: String,
    /// App-relative URL or pattern
    pub path: String,
    pub response: MockSource,
    pub meta: ResponseMeta,
}

impl UseApi {
    /// Build from a `METHOD:/path` key
    pub fn new(key: &str, response: impl Into<MockSource>) -> E2eResult<Self> {
        let (method, path) = key
            .split_once(':')
            .ok_or_else(|| E2eError::SpecParse(format!("mock key '{}' must look like METHOD:/path", key)))?;
        Ok(Self {
            method: method.to_string(),
            path: path.to_string(),
            response: response.into(),
            meta: ResponseMeta::default(),
        })
    }

    pub fn with_meta(mut self, meta: ResponseMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// Registered mock as it will be rendered into a browser script
#[derive(Debug, Clone)]
pub struct MockRegistration {
    pub method: String,
    /// Absolute URL pattern
    pub pattern: String,
    pub response: MockSource,
    pub meta: ResponseMeta,
}

/// Loads fixture files for mocked responses
pub struct ResponseUtils {
    test_dir: PathBuf,
    fixtures_root: PathBuf,
    har: Arc<HarStore>,
}

impl ResponseUtils {
    pub fn new(test_dir: impl Into<PathBuf>, fixtures_root: impl Into<PathBuf>, har: Arc<HarStore>) -> Self {
        Self {
            test_dir: test_dir.into(),
            fixtures_root: fixtures_root.into(),
            har,
        }
    }

    /// Path a fixture reference points to; `./` paths are relative to the test file
    pub fn fixture_path(&self, path: &str) -> PathBuf {
        if path.starts_with('.') {
            self.test_dir.join(path)
        } else {
            self.fixtures_root.join(path)
        }
    }

    /// Read a fixture and turn it into a 200 response
    pub fn load(&self, path: &str, vars: Option<&Variables>) -> E2eResult<MockResponse> {
        let body = match path.strip_prefix(HAR_PATH_PREFIX) {
            Some(name) => self
                .har
                .file(name)
                .map(|content| content.as_str().to_string())
                .ok_or_else(|| E2eError::MockResolution {
                    path: path.to_string(),
                    reason: format!("not found in {}", self.har.har_path().display()),
                })?,
            None => {
                let file = self.fixture_path(path);
                std::fs::read_to_string(&file).map_err(|e| E2eError::MockResolution {
                    path: file.display().to_string(),
                    reason: e.to_string(),
                })?
            }
        };

        let is_json = Path::new(path)
            .extension()
            .map(|ext| ext == "json")
            .unwrap_or(false);
        if !is_json {
            return Ok(MockResponse::text(body));
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| E2eError::MockResolution {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let json = match vars {
            Some(vars) => replace_variables(&json, vars),
            None => json,
        };
        Ok(MockResponse::json(json))
    }

    /// Wait out the mock's delay, then fulfil from a fixture
    pub async fn resolve_mock_file(&self, path: &str, meta: &ResponseMeta) -> E2eResult<RouteAction> {
        if let Some(ms) = meta.delay_ms.filter(|ms| *ms > 0) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        self.load(path, meta.vars.as_ref()).map(RouteAction::Fulfill)
    }
}

struct MockRoute {
    method: String,
    pattern: String,
    response: MockSource,
    meta: ResponseMeta,
    utils: Arc<ResponseUtils>,
}

#[async_trait]
impl RouteHandler for MockRoute {
    async fn handle(&self, request: &RouteRequest) -> E2eResult<RouteAction> {
        if !request.method.eq_ignore_ascii_case(&self.method) {
            return Ok(RouteAction::Fallback);
        }
        info!("request {} {}", self.method, self.pattern);

        match &self.response {
            MockSource::File(path) => self.utils.resolve_mock_file(path, &self.meta).await,
            MockSource::Json(value) => {
                if let Some(ms) = self.meta.delay_ms.filter(|ms| *ms > 0) {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
                Ok(RouteAction::Fulfill(MockResponse::json(value.clone())))
            }
            MockSource::Handler(handler) => handler.handle(request, &self.utils).await,
        }
    }
}

/// Answers API calls from the test's HAR recording
struct RecordingReplay {
    store: Arc<HarStore>,
    mode: RunMode,
    har: OnceCell<Option<Har>>,
}

#[async_trait]
impl RouteHandler for RecordingReplay {
    async fn handle(&self, request: &RouteRequest) -> E2eResult<RouteAction> {
        if self.mode.is_record() {
            return Ok(RouteAction::Continue);
        }

        let har = self.har.get_or_try_init(|| self.store.har())?;
        let Some(entry) = har.as_ref().and_then(|h| h.find(&request.method, &request.url)) else {
            debug!("No recorded response for {} {}", request.method, request.url);
            return Ok(RouteAction::Fallback);
        };

        let content = &entry.response.content;
        let body = content
            .body()
            .or_else(|| {
                content
                    .file
                    .as_deref()
                    .and_then(|name| self.store.file(name))
                    .map(|text| text.as_bytes().to_vec())
            })
            .unwrap_or_default();

        Ok(RouteAction::Fulfill(MockResponse {
            status: entry.response.status,
            body: ResponseBody::Bytes(body),
            content_type: content.mime_type.clone(),
        }))
    }
}

/// Route mocking, recording replay and network monitoring for one test
pub struct MockServerHelper {
    test: TestInfo,
    app: AppConfig,
    options: MockOptions,
    mode: RunMode,
    har: Arc<HarStore>,
    utils: Arc<ResponseUtils>,
    routes: RouteTable,
    monitor: Arc<NetworkMonitor>,
    mocks: Mutex<Vec<MockRegistration>>,
}

impl MockServerHelper {
    pub fn new(test: TestInfo, app: AppConfig, options: MockOptions) -> E2eResult<Self> {
        options.fixed_time.validate()?;

        let mode = test.run_mode();
        let location = HarLocation::new(options.har_name.clone(), options.zip_har);
        let har = Arc::new(HarStore::new(&test, location));
        let fixtures_root = options
            .fixtures_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let utils = Arc::new(ResponseUtils::new(test.directory(), fixtures_root, har.clone()));
        let monitor = Arc::new(NetworkMonitor::new(
            app.clone(),
            options.monitor_network_error,
            options.console_types.clone(),
        ));

        let helper = Self {
            test,
            app,
            options,
            mode,
            har,
            utils,
            routes: RouteTable::new(),
            monitor,
            mocks: Mutex::new(Vec::new()),
        };

        let api = UrlPattern::new(&helper.app.api_pattern())?;
        if helper.strict_guard_enabled() {
            helper.routes.add(
                api.clone(),
                Arc::new(AbortHandler {
                    reason: STRICT_ABORT_REASON.to_string(),
                }),
                RouteKind::Guard,
                None,
            );
        } else if helper.options.strict_api_call {
            info!("Skip strict API guard for network recorder");
        }

        helper.routes.add(
            api,
            Arc::new(RecordingReplay {
                store: helper.har.clone(),
                mode,
                har: OnceCell::new(),
            }),
            RouteKind::Recording,
            None,
        );

        if helper.options.use_auth {
            helper.use_auth(None)?;
        }

        Ok(helper)
    }

    /// Register mocked routes; later registrations take precedence
    pub fn use_mocks<I>(&self, apis: I) -> E2eResult<()>
    where
        I: IntoIterator<Item = UseApi>,
    {
        for api in apis {
            let pattern = self.app.app_url(&api.path);
            let url = UrlPattern::new(&pattern)?;
            let handler = MockRoute {
                method: api.method.clone(),
                pattern: pattern.clone(),
                response: api.response.clone(),
                meta: api.meta.clone(),
                utils: self.utils.clone(),
            };
            self.routes
                .add(url, Arc::new(handler), RouteKind::Mock, api.meta.times);
            self.mocks.lock().push(MockRegistration {
                method: api.method,
                pattern,
                response: api.response,
                meta: api.meta,
            });
        }
        Ok(())
    }

    /// Mock the app's authentication check and settings
    pub fn use_auth(&self, check: Option<MockSource>) -> E2eResult<()> {
        info!("using auth");
        let auth = &self.options.auth;
        let check = check.unwrap_or_else(|| MockSource::File(auth.check_fixture.clone()));
        self.use_mocks([
            UseApi::new(&auth.check_route, check)?,
            UseApi::new(&auth.settings_route, auth.settings_fixture.as_str())?,
        ])
    }

    /// Drop every mock registered by the test
    pub fn clean_use(&self) {
        self.routes.remove_kind(RouteKind::Mock);
        self.mocks.lock().clear();
    }

    /// Decide what happens to a request the page sends
    pub async fn route(&self, request: &RouteRequest) -> E2eResult<RouteAction> {
        self.routes.dispatch(request).await
    }

    pub fn strict_guard_enabled(&self) -> bool {
        self.options.strict_api_call && !self.mode.is_record()
    }

    pub fn registrations(&self) -> Vec<MockRegistration> {
        self.mocks.lock().clone()
    }

    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }

    pub fn utils(&self) -> &ResponseUtils {
        &self.utils
    }

    pub fn har_path(&self) -> &Path {
        self.har.har_path()
    }

    pub fn test(&self) -> &TestInfo {
        &self.test
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn options(&self) -> &MockOptions {
        &self.options
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Timestamp the page clock is pinned to
    pub fn fixed_time(&self) -> Option<&str> {
        self.options.fixed_time.timestamp()
    }

    pub fn api_calls(&self) -> BTreeMap<String, String> {
        self.monitor.api_calls()
    }

    pub fn clear_api_calls(&self) {
        self.monitor.clear_api_calls();
    }

    pub fn expect_network_errors(&self, expected: &[String]) -> E2eResult<()> {
        self.monitor.expect_network_errors(expected)
    }

    pub fn expect_console(&self, expected: &[String]) -> E2eResult<()> {
        self.monitor.expect_console(expected)
    }

    /// Compare the calls made so far with `expected`, or with the recording when `None`
    pub fn expect_api_calls(&self, expected: Option<&BTreeMap<String, String>>) -> E2eResult<()> {
        match expected {
            Some(expected) => self.monitor.expect_api_calls(expected),
            None => {
                let recorded = self
                    .har
                    .har()?
                    .map(|har| har.api_calls(&self.app.base_url()))
                    .unwrap_or_default();
                self.monitor.expect_api_calls(&recorded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn helper(dir: &Path, project: &str, options: MockOptions) -> MockServerHelper {
        let test = TestInfo::new("loads items", dir.join("items.spec.ts"), project);
        MockServerHelper::new(test, AppConfig::default(), options).unwrap()
    }

    #[test]
    fn test_use_api_key_parsing() {
        let api = UseApi::new("GET:/svc/api/items?x=http://a", json!([])).unwrap();
        assert_eq!(api.method, "GET");
        assert_eq!(api.path, "/svc/api/items?x=http://a");
        assert!(UseApi::new("/svc/api/items", json!([])).is_err());
    }

    #[tokio::test]
    async fn test_strict_guard_aborts_unmocked_calls() {
        let tmp = TempDir::new().unwrap();
        let h = helper(tmp.path(), "chromium", MockOptions::default());
        let action = h
            .route(&RouteRequest::new("GET", "http://localhost:3000/svc/api/items"))
            .await
            .unwrap();
        assert_eq!(action, RouteAction::Abort(STRICT_ABORT_REASON.to_string()));

        let page = h
            .route(&RouteRequest::new("GET", "http://localhost:3000/index.html"))
            .await
            .unwrap();
        assert_eq!(page, RouteAction::Continue);
    }

    #[tokio::test]
    async fn test_recorder_skips_guard() {
        let tmp = TempDir::new().unwrap();
        let h = helper(tmp.path(), "network-recorder", MockOptions::default());
        assert!(!h.strict_guard_enabled());
        let action = h
            .route(&RouteRequest::new("GET", "http://localhost:3000/svc/api/items"))
            .await
            .unwrap();
        assert_eq!(action, RouteAction::Continue);
    }

    #[tokio::test]
    async fn test_fixture_with_variables() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("item.json"),
            r#"{"id": "${id}", "title": "Item ${id}"}"#,
        )
        .unwrap();
        let h = helper(tmp.path(), "chromium", MockOptions::default());

        let mut vars = Variables::new();
        vars.insert("id".to_string(), json!(7));
        h.use_mocks([UseApi::new("GET:/svc/api/items/*", "./item.json")
            .unwrap()
            .with_meta(ResponseMeta {
                vars: Some(vars),
                ..Default::default()
            })])
            .unwrap();

        let action = h
            .route(&RouteRequest::new("GET", "http://localhost:3000/svc/api/items/7"))
            .await
            .unwrap();
        assert_eq!(
            action,
            RouteAction::Fulfill(MockResponse::json(json!({"id": 7, "title": "Item 7"})))
        );
    }

    #[tokio::test]
    async fn test_method_mismatch_falls_back_to_guard() {
        let tmp = TempDir::new().unwrap();
        let h = helper(tmp.path(), "chromium", MockOptions::default());
        h.use_mocks([UseApi::new("POST:/svc/api/items", json!({"ok": true})).unwrap()])
            .unwrap();

        let get = h
            .route(&RouteRequest::new("GET", "http://localhost:3000/svc/api/items"))
            .await
            .unwrap();
        assert!(matches!(get, RouteAction::Abort(_)));

        let post = h
            .route(&RouteRequest::new("POST", "http://localhost:3000/svc/api/items"))
            .await
            .unwrap();
        assert!(matches!(post, RouteAction::Fulfill(_)));
    }

    #[tokio::test]
    async fn test_clean_use_removes_mocks() {
        let tmp = TempDir::new().unwrap();
        let h = helper(tmp.path(), "chromium", MockOptions::from(false));
        h.use_mocks([UseApi::new("GET:/svc/api/items", json!([])).unwrap()])
            .unwrap();
        assert_eq!(h.registrations().len(), 1);

        h.clean_use();
        assert!(h.registrations().is_empty());
        let action = h
            .route(&RouteRequest::new("GET", "http://localhost:3000/svc/api/items"))
            .await
            .unwrap();
        assert_eq!(action, RouteAction::Continue);
    }

    #[tokio::test]
    async fn test_replay_from_recording() {
        let tmp = TempDir::new().unwrap();
        let test = TestInfo::new("loads items", tmp.path().join("items.spec.ts"), "chromium");
        let har_path = HarLocation::new(None, false).har_path(&test);
        std::fs::create_dir_all(har_path.parent().unwrap()).unwrap();
        std::fs::write(
            &har_path,
            json!({"log": {"entries": [{
                "request": {"method": "GET", "url": "http://localhost:3000/svc/api/items"},
                "response": {"status": 200, "content": {"text": "[1,2]", "mimeType": "application/json"}}
            }]}})
            .to_string(),
        )
        .unwrap();

        let h = MockServerHelper::new(test, AppConfig::default(), MockOptions::default()).unwrap();
        let action = h
            .route(&RouteRequest::new("GET", "http://localhost:3000/svc/api/items"))
            .await
            .unwrap();
        match action {
            RouteAction::Fulfill(resp) => {
                assert_eq!(resp.status, 200);
                assert_eq!(resp.body, ResponseBody::Bytes(b"[1,2]".to_vec()));
            }
            other => panic!("unexpected action {:?}", other),
        }

        h.monitor()
            .record_request("GET", "http://localhost:3000/svc/api/items", Some(200));
        assert!(h.expect_api_calls(None).is_ok());
    }

    #[tokio::test]
    async fn test_missing_fixture_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let h = helper(tmp.path(), "chromium", MockOptions::default());
        h.use_mocks([UseApi::new("GET:/svc/api/items", "./nope.json").unwrap()])
            .unwrap();
        let result = h
            .route(&RouteRequest::new("GET", "http://localhost:3000/svc/api/items"))
            .await;
        assert!(matches!(result, Err(E2eError::MockResolution { .. })));
    }
}
