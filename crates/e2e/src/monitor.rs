//! Bookkeeping of what the page did on the network and in its console

use std::collections::BTreeMap;

use mockwright_common::har::{insert_numbered, NO_RESPONSE_STATUS};
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, error};

use crate::config::{AppConfig, ConsoleType};
use crate::error::{E2eError, E2eResult};

#[derive(Default)]
struct MonitorState {
    api_calls: BTreeMap<String, String>,
    failed_requests: Vec<String>,
    console: Vec<String>,
}

pub struct NetworkMonitor {
    app: AppConfig,
    track_failures: bool,
    console_types: Vec<ConsoleType>,
    state: Mutex<MonitorState>,
}

impl NetworkMonitor {
    pub fn new(app: AppConfig, track_failures: bool, console_types: Vec<ConsoleType>) -> Self {
        Self {
            app,
            track_failures,
            console_types,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Record an API call as `METHOD:/path`; `None` status means no response arrived
    pub fn record_request(&self, method: &str, url: &str, status: Option<u16>) {
        let Some(path) = self.app.api_path(url) else {
            return;
        };
        let status = status.unwrap_or(NO_RESPONSE_STATUS).to_string();
        let key = format!("{}:{}", method, path);
        debug!("API call {} -> {}", key, status);
        insert_numbered(&mut self.state.lock().api_calls, key, status);
    }

    pub fn record_request_failed(&self, method: &str, url: &str, failure: Option<&str>) {
        if !self.track_failures {
            return;
        }
        let failure = match failure {
            Some(text) => json!({ "errorText": text }),
            None => serde_json::Value::Null,
        };
        error!("Request failed: {} {} {}", method, url, failure);
        self.state
            .lock()
            .failed_requests
            .push(format!("{} {}", url, failure));
    }

    pub fn record_request_finished(&self, url: &str, status: u16) {
        if !self.track_failures || status != 401 {
            return;
        }
        error!("Request unauthorized: {} {}", url, status);
        self.state
            .lock()
            .failed_requests
            .push(format!("{} ERR:{}", url, status));
    }

    pub fn record_console(&self, kind: &str, text: &str) {
        let Some(kind) = ConsoleType::from_browser(kind) else {
            return;
        };
        if self.console_types.contains(&kind) {
            self.state.lock().console.push(text.to_string());
        }
    }

    pub fn api_calls(&self) -> BTreeMap<String, String> {
        self.state.lock().api_calls.clone()
    }

    pub fn clear_api_calls(&self) {
        self.state.lock().api_calls.clear();
    }

    pub fn failed_requests(&self) -> Vec<String> {
        self.state.lock().failed_requests.clone()
    }

    pub fn console_messages(&self) -> Vec<String> {
        self.state.lock().console.clone()
    }

    pub fn expect_network_errors(&self, expected: &[String]) -> E2eResult<()> {
        expect_equal("network errors", &self.failed_requests(), &expected.to_vec())
    }

    pub fn expect_console(&self, expected: &[String]) -> E2eResult<()> {
        expect_equal("console messages", &self.console_messages(), &expected.to_vec())
    }

    pub fn expect_api_calls(&self, expected: &BTreeMap<String, String>) -> E2eResult<()> {
        expect_equal("API calls", &self.api_calls(), expected)
    }
}

fn expect_equal<T>(what: &str, actual: &T, expected: &T) -> E2eResult<()>
where
    T: PartialEq + std::fmt::Debug,
{
    if actual == expected {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!(
            "{}: expected {:?}, got {:?}",
            what, expected, actual
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> NetworkMonitor {
        NetworkMonitor::new(AppConfig::default(), true, vec![ConsoleType::Error])
    }

    #[test]
    fn test_api_calls_numbered() {
        let m = monitor();
        m.record_request("GET", "http://localhost:3000/svc/api/items", Some(200));
        m.record_request("GET", "http://localhost:3000/svc/api/items", None);
        m.record_request("GET", "http://localhost:3000/index.html", Some(200));

        let calls = m.api_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls["GET:/svc/api/items"], "200");
        assert_eq!(calls["GET:/svc/api/items (#2)"], "418");

        m.clear_api_calls();
        assert!(m.api_calls().is_empty());
    }

    #[test]
    fn test_failures_and_unauthorized() {
        let m = monitor();
        m.record_request_failed("GET", "http://localhost:3000/a/api/x", Some("net::ERR_FAILED"));
        m.record_request_finished("http://localhost:3000/a/api/y", 200);
        m.record_request_finished("http://localhost:3000/a/api/z", 401);

        assert_eq!(
            m.failed_requests(),
            vec![
                r#"http://localhost:3000/a/api/x {"errorText":"net::ERR_FAILED"}"#.to_string(),
                "http://localhost:3000/a/api/z ERR:401".to_string(),
            ]
        );
        assert!(m.expect_network_errors(&[]).is_err());
    }

    #[test]
    fn test_failures_ignored_when_disabled() {
        let m = NetworkMonitor::new(AppConfig::default(), false, vec![]);
        m.record_request_finished("http://localhost:3000/a/api/z", 401);
        assert!(m.expect_network_errors(&[]).is_ok());
    }

    #[test]
    fn test_console_filtering() {
        let m = monitor();
        m.record_console("error", "boom");
        m.record_console("log", "hello");
        m.record_console("warning", "careful");
        assert!(m.expect_console(&["boom".to_string()]).is_ok());
    }
}
