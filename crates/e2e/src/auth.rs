//! Real login for recording runs
//!
//! Record mode talks to the live backend, so the browser needs a session.
//! The login is performed over HTTP before the script starts and the
//! returned cookies are handed to the browser context.

use std::time::Duration;

use mockwright_common::RunMode;
use reqwest::header::SET_COOKIE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{E2eError, E2eResult};
use crate::input::js_str;

/// Credentials used to open a session in record mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderAuth {
    pub login: String,
    pub password: String,
    /// App-relative login endpoint
    pub path: String,
}

impl Default for RecorderAuth {
    fn default() -> Self {
        Self {
            login: "adm".to_string(),
            password: "luxmsbi".to_string(),
            path: "/ekp-user-service/api/Auth/login".to_string(),
        }
    }
}

/// Cookie in the shape `BrowserContext.addCookies` accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

impl RecorderAuth {
    fn body(&self) -> serde_json::Value {
        serde_json::json!({ "userName": self.login, "password": self.password })
    }

    /// Log in against the live app. Replay runs never touch the backend and get no cookies.
    pub async fn login(&self, app: &AppConfig, mode: RunMode) -> E2eResult<Vec<Cookie>> {
        if !mode.is_record() {
            return Ok(Vec::new());
        }

        let url = app.app_url(&self.path);
        info!("Logging in as '{}' at {}", self.login, url);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let response = client.post(&url).json(&self.body()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(E2eError::Auth(format!("{} returned {}", url, status)));
        }

        let cookies: Vec<Cookie> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|raw| parse_set_cookie(raw, &app.host))
            .collect();

        debug!("Login returned {} cookies", cookies.len());
        Ok(cookies)
    }
}

/// Parse one `Set-Cookie` header. Attributes other than domain, path and flags are ignored.
pub fn parse_set_cookie(raw: &str, default_domain: &str) -> Option<Cookie> {
    let mut parts = raw.split(';');
    let (name, value) = parts.next()?.trim().split_once('=')?;
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie {
        name: name.to_string(),
        value: value.trim_matches('"').to_string(),
        domain: default_domain.to_string(),
        path: "/".to_string(),
        http_only: false,
        secure: false,
    };

    for attr in parts {
        let attr = attr.trim();
        let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
        match key.to_ascii_lowercase().as_str() {
            "domain" if !val.is_empty() => cookie.domain = val.to_string(),
            "path" if !val.is_empty() => cookie.path = val.to_string(),
            "httponly" => cookie.http_only = true,
            "secure" => cookie.secure = true,
            _ => {}
        }
    }
    Some(cookie)
}

/// Script line adding `cookies` to the browser context
pub fn add_cookies_js(cookies: &[Cookie]) -> E2eResult<Option<String>> {
    if cookies.is_empty() {
        return Ok(None);
    }
    let json = serde_json::to_string(cookies)?;
    Ok(Some(format!(
        "    await context.addCookies(JSON.parse({}));",
        js_str(&json)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let auth = RecorderAuth::default();
        assert_eq!(auth.login, "adm");
        assert_eq!(auth.body()["userName"], "adm");
        assert_eq!(auth.body()["password"], "luxmsbi");
    }

    #[test]
    fn test_parse_set_cookie() {
        let cookie = parse_set_cookie("sid=abc123; Path=/app; HttpOnly; SameSite=Lax", "localhost").unwrap();
        assert_eq!(cookie.name, "sid");
        assert_eq!(cookie.value, "abc123");
        assert_eq!(cookie.domain, "localhost");
        assert_eq!(cookie.path, "/app");
        assert!(cookie.http_only);
        assert!(!cookie.secure);

        assert!(parse_set_cookie("novalue", "localhost").is_none());
        assert!(parse_set_cookie("=x", "localhost").is_none());
    }

    #[tokio::test]
    async fn test_replay_mode_skips_login() {
        // unreachable port: a request would fail
        let app = AppConfig { host: "127.0.0.1".to_string(), port: 1 };
        let cookies = RecorderAuth::default().login(&app, RunMode::Replay).await.unwrap();
        assert!(cookies.is_empty());
    }

    #[test]
    fn test_add_cookies_js() {
        assert!(add_cookies_js(&[]).unwrap().is_none());
        let cookie = parse_set_cookie("a=b", "h").unwrap();
        let js = add_cookies_js(&[cookie]).unwrap().unwrap();
        assert!(js.starts_with("    await context.addCookies(JSON.parse("));
        assert!(js.contains("httpOnly"));
    }
}
