//! Playwright browser automation
//!
//! A test is rendered into one Node script: browser setup, the mock layer of
//! its [`MockServerHelper`], then every step. The script reports back over
//! stdout with lines prefixed by [`EVENT_PREFIX`] followed by a JSON object.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::auth::{add_cookies_js, Cookie};
use crate::error::{E2eError, E2eResult};
use crate::input::{
    focus_with_tab_js, js_str, mouse_click_js, mouse_down_js, mouse_over_js, press_sequence_js,
    remove_focus_js, remove_mouse_js, screen_clip_js, scroll_body_top_js, scroll_element_js,
    settle_js, ScrollPosition, DEFAULT_SETTLE_MS,
};
use crate::mock::{MockRegistration, MockServerHelper, MockSource, STRICT_ABORT_REASON};
use crate::monitor::NetworkMonitor;
use crate::route::{MockResponse, ResponseBody};
use crate::spec::{TestSpec, TestStep, WaitState};
use crate::theme::change_theme_js;
use crate::visual::{mask_js, screenshot_plan};

/// Marker in front of every event line the script prints
pub const EVENT_PREFIX: &str = "__MOCKWRIGHT__";

/// Playwright browser handle
pub struct PlaywrightHandle {
    config: PlaywrightConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }

    /// Browser engine a project name refers to; anything unknown runs on Chromium
    pub fn from_project(project: &str) -> Self {
        if project.contains("firefox") {
            Browser::Firefox
        } else if project.contains("webkit") {
            Browser::Webkit
        } else {
            Browser::Chromium
        }
    }
}

/// Result of executing a test step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// What the browser script reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ScriptEvent {
    Request {
        method: String,
        url: String,
        #[serde(default)]
        status: Option<u16>,
    },
    RequestFailed {
        method: String,
        url: String,
        #[serde(default)]
        failure: Option<String>,
    },
    RequestFinished {
        url: String,
        #[serde(default)]
        status: Option<u16>,
    },
    Console {
        kind: String,
        text: String,
    },
    Download {
        index: usize,
        path: PathBuf,
    },
    Screenshot {
        name: String,
    },
    Step {
        index: usize,
        ok: bool,
        #[serde(default)]
        error: Option<String>,
    },
    Done {
        ok: bool,
    },
}

impl ScriptEvent {
    /// Feed a network or console event into the monitor
    pub fn apply(&self, monitor: &NetworkMonitor) {
        match self {
            Self::Request { method, url, status } => monitor.record_request(method, url, *status),
            Self::RequestFailed { method, url, failure } => {
                monitor.record_request_failed(method, url, failure.as_deref())
            }
            Self::RequestFinished { url, status: Some(status) } => {
                monitor.record_request_finished(url, *status)
            }
            Self::Console { kind, text } => monitor.record_console(kind, text),
            _ => {}
        }
    }
}

/// Collect event lines from script output; other lines are ignored
pub fn parse_events(stdout: &str) -> Vec<ScriptEvent> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix(EVENT_PREFIX))
        .filter_map(|json| match serde_json::from_str(json.trim()) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Unreadable script event {}: {}", json.trim(), e);
                None
            }
        })
        .collect()
}

/// Output of a finished script
#[derive(Debug, Clone, Default)]
pub struct ScriptOutput {
    pub events: Vec<ScriptEvent>,
    pub exit_ok: bool,
    pub stderr: String,
}

impl ScriptOutput {
    /// Per-step outcome for `steps`, in order
    pub fn step_results(&self, steps: &[TestStep]) -> Vec<StepResult> {
        steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let reported = self.events.iter().find_map(|event| match event {
                    ScriptEvent::Step { index: i, ok, error } if *i == index => Some((*ok, error.clone())),
                    _ => None,
                });
                let (success, error) = match reported {
                    Some(outcome) => outcome,
                    None => (false, Some("not reached".to_string())),
                };
                StepResult {
                    success,
                    step_name: step_name(step),
                    error,
                    screenshot_path: None,
                }
            })
            .collect()
    }

    pub fn downloads(&self) -> Vec<(usize, PathBuf)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ScriptEvent::Download { index, path } => Some((*index, path.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn screenshots(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ScriptEvent::Screenshot { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;
        Self::unchecked(config)
    }

    /// Handle that skips the installation check, for rendering scripts only
    pub fn unchecked(config: PlaywrightConfig) -> E2eResult<Self> {
        std::fs::create_dir_all(&config.screenshot_dir)?;
        std::fs::create_dir_all(&config.download_dir)?;
        Ok(Self { config })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    /// Where the download triggered by step `index` of `spec` is saved
    pub fn download_path(&self, spec: &str, index: usize) -> PathBuf {
        self.config
            .download_dir
            .join(format!("{}-{}.xlsx", slug(spec), index + 1))
    }

    /// Build the browser script for a test and its mock layer
    pub fn build_script(
        &self,
        spec: &TestSpec,
        helper: &MockServerHelper,
        cookies: &[Cookie],
    ) -> E2eResult<String> {
        let browser = if self.config.browser == Browser::Chromium {
            Browser::from_project(&spec.project)
        } else {
            self.config.browser
        };

        let mut script = String::new();
        script.push_str(&format!(
            r#"
const {{ chromium, firefox, webkit }} = require('playwright');
const {{ expect }} = require('@playwright/test');

const emit = (event) => console.log('{prefix} ' + JSON.stringify(event));
const sleep = (ms) => new Promise((resolve) => setTimeout(resolve, ms));

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const baseUrl = {base_url};
  let current = -1;
  let failed = false;
"#,
            prefix = EVENT_PREFIX,
            browser = browser.as_str(),
            headless = self.config.headless,
            width = spec.viewport.width,
            height = spec.viewport.height,
            base_url = js_str(&helper.app().base_url()),
        ));

        if let Some(js) = add_cookies_js(cookies)? {
            script.push_str(&js);
            script.push('\n');
        }
        script.push_str("  const page = await context.newPage();\n");
        script.push_str(&self.setup_js(spec, helper)?);

        script.push_str("\n  try {\n");
        for (index, step) in spec.steps.iter().enumerate() {
            script.push_str(&format!(
                "\n    // Step {}: {}\n    current = {};\n",
                index + 1,
                step_name(step),
                index
            ));
            script.push_str(&self.step_to_js(spec, step, index));
            script.push_str(&format!("\n    emit({{ event: 'step', index: {}, ok: true }});\n", index));
        }

        script.push_str(
            r#"
  } catch (error) {
    failed = true;
    emit({ event: 'step', index: current, ok: false, error: error.message });
  } finally {
    await sleep(100);
    await browser.close();
  }
  emit({ event: 'done', ok: !failed });
  process.exit(failed ? 1 : 0);
})();
"#,
        );

        Ok(script)
    }

    /// Theme, clock, routes and listeners, in registration order
    fn setup_js(&self, spec: &TestSpec, helper: &MockServerHelper) -> E2eResult<String> {
        let mut js = String::new();
        let api = js_str(&helper.app().api_pattern());

        let switcher = spec.theme.clone().unwrap_or_default();
        if let Some(theme) = switcher.init_script(helper.test()) {
            js.push_str(&theme);
            js.push('\n');
        }

        if let Some(at) = helper.fixed_time() {
            js.push_str(&format!(
                "  await page.clock.setFixedTime(new Date({}));\n",
                js_str(at)
            ));
        }

        if helper.strict_guard_enabled() {
            js.push_str(&format!(
                "  await page.route({}, (route) => route.abort({}));\n",
                api,
                js_str(STRICT_ABORT_REASON)
            ));
        }

        let har = helper.har_path();
        if helper.mode().is_record() || har.exists() {
            js.push_str(&format!(
                "  await page.routeFromHAR({}, {{ url: {}, update: {}, notFound: 'fallback' }});\n",
                js_str(&har.to_string_lossy()),
                api,
                helper.mode().is_record()
            ));
        } else {
            debug!("No recording at {}, replay disabled", har.display());
        }

        for mock in helper.registrations() {
            js.push_str(&mock_route_js(&mock, helper)?);
        }

        js.push_str(MONITOR_JS);
        Ok(js)
    }

    /// Convert a step to JavaScript code
    fn step_to_js(&self, spec: &TestSpec, step: &TestStep, index: usize) -> String {
        match step {
            TestStep::Navigate { url, wait_for_selector } => {
                let wait = wait_for_selector
                    .as_ref()
                    .map(|s| format!("\n    await page.waitForSelector({});", js_str(s)))
                    .unwrap_or_default();
                format!("    await page.goto(baseUrl + {});{}", js_str(url), wait)
            }
            TestStep::Click { selector, timeout_ms } => format!(
                "    await page.click({}, {{ timeout: {} }});",
                js_str(selector),
                timeout_ms.unwrap_or(5000)
            ),
            TestStep::Fill { selector, value, clear_first } => {
                let fill = format!("    await page.fill({}, {});", js_str(selector), js_str(value));
                if *clear_first {
                    format!("    await page.fill({}, '');\n{}", js_str(selector), fill)
                } else {
                    fill
                }
            }
            TestStep::Type { selector, text, delay_ms } => format!(
                "    await page.type({}, {}, {{ delay: {} }});",
                js_str(selector),
                js_str(text),
                delay_ms.unwrap_or(50)
            ),
            TestStep::Press { selector, key } => match selector {
                Some(sel) => format!("    await page.locator({}).press({});", js_str(sel), js_str(key)),
                None => format!("    await page.keyboard.press({});", js_str(key)),
            },
            TestStep::PressSequence { keys } => press_sequence_js(keys),
            TestStep::Wait { selector, timeout_ms, state } => {
                let state = match state {
                    WaitState::Visible => "visible",
                    WaitState::Hidden => "hidden",
                    WaitState::Attached => "attached",
                    WaitState::Detached => "detached",
                };
                format!(
                    "    await page.waitForSelector({}, {{ state: '{}', timeout: {} }});",
                    js_str(selector),
                    state,
                    timeout_ms
                )
            }
            TestStep::Sleep { ms, wait_load_state } => settle_js(*ms, *wait_load_state),
            TestStep::Assert { selector, visible, text, text_contains, attribute, count } => {
                let locator = format!("page.locator({})", js_str(selector));
                let mut assertions = Vec::new();
                match visible {
                    Some(true) => assertions.push(format!("    await expect({}).toBeVisible();", locator)),
                    Some(false) => assertions.push(format!("    await expect({}).toBeHidden();", locator)),
                    None => {}
                }
                if let Some(t) = text {
                    assertions.push(format!("    await expect({}).toHaveText({});", locator, js_str(t)));
                }
                if let Some(t) = text_contains {
                    assertions.push(format!("    await expect({}).toContainText({});", locator, js_str(t)));
                }
                if let Some(attr) = attribute {
                    if let Some(value) = &attr.value {
                        assertions.push(format!(
                            "    await expect({}).toHaveAttribute({}, {});",
                            locator,
                            js_str(&attr.name),
                            js_str(value)
                        ));
                    } else if let Some(part) = &attr.contains {
                        assertions.push(format!(
                            "    await expect({}).toHaveAttribute({}, new RegExp({}));",
                            locator,
                            js_str(&attr.name),
                            js_str(&regex::escape(part))
                        ));
                    }
                }
                if let Some(c) = count {
                    assertions.push(format!("    await expect({}).toHaveCount({});", locator, c));
                }
                assertions.join("\n")
            }
            TestStep::Screenshot { name, selector, full_page, mask } => {
                let path = js_str(&self.screenshot_path(name).to_string_lossy());
                let shot = match selector {
                    Some(sel) => format!(
                        "    await page.locator({}).screenshot({{ path: {}, mask: {} }});",
                        js_str(sel),
                        path,
                        mask_js(mask)
                    ),
                    None => format!(
                        "    await page.screenshot({{ path: {}, fullPage: {}, mask: {} }});",
                        path,
                        full_page,
                        mask_js(mask)
                    ),
                };
                format!("{}\n    emit({{ event: 'screenshot', name: {} }});", shot, js_str(name))
            }
            TestStep::ClipScreenshot { name, selector, margins } => format!(
                "    {{\n{}\n    await page.screenshot({{ path: {}, clip }});\n    }}\n    emit({{ event: 'screenshot', name: {} }});",
                screen_clip_js(selector, margins),
                js_str(&self.screenshot_path(name).to_string_lossy()),
                js_str(name)
            ),
            TestStep::ScreenshotResolutions { selector, use_title, delay_ms, wait_load_state, mask } => {
                screenshot_plan(
                    selector.as_deref(),
                    use_title.then_some(spec.name.as_str()),
                    *delay_ms,
                    *wait_load_state,
                    mask,
                    &self.config.screenshot_dir,
                )
            }
            TestStep::MouseOver { selector, shift } => mouse_over_js(selector, *shift),
            TestStep::MouseDown { selector, shift } => mouse_down_js(selector, *shift),
            TestStep::MouseUp => "    await page.mouse.up();".to_string(),
            TestStep::MouseClick { selector, shift } => mouse_click_js(selector, *shift),
            TestStep::RemoveMouse => remove_mouse_js(),
            TestStep::RemoveFocus => remove_focus_js(),
            TestStep::FocusWithTab { shift_key } => focus_with_tab_js(*shift_key),
            TestStep::ScrollBodyTop { delta } => scroll_body_top_js(*delta),
            TestStep::ScrollElement { selector, top, left } => {
                scroll_element_js(selector, &ScrollPosition { top: *top, left: *left })
            }
            TestStep::RemoveAllAlerts => r#"    for (let alerts = await page.getByRole('alert').all(); alerts.length; alerts = await page.getByRole('alert').all()) {
      await alerts[0].getByRole('button').click();
    }"#
            .to_string(),
            TestStep::WaitForAlerts => {
                "    await page.waitForSelector('[role=alert]', { state: 'visible' });".to_string()
            }
            TestStep::DisableSpellcheck => r#"    await page.evaluate(() => {
      document.querySelectorAll('input[type=text], textarea').forEach((field) => { field.spellcheck = false; });
    });"#
                .to_string(),
            TestStep::ChangeTheme { theme } => change_theme_js(theme),
            TestStep::SwitchTheme { user_menu, menu_item } => format!(
                "{}\n{}\n{}\n{}",
                mouse_click_js_text(user_menu),
                settle_js(DEFAULT_SETTLE_MS, false),
                mouse_click_js_text(menu_item),
                settle_js(DEFAULT_SETTLE_MS, false)
            ),
            TestStep::Hover { selector } => format!("    await page.hover({});", js_str(selector)),
            TestStep::Focus { selector } => format!("    await page.focus({});", js_str(selector)),
            TestStep::Select { selector, value } => {
                format!("    await page.selectOption({}, {});", js_str(selector), js_str(value))
            }
            TestStep::Check { selector } => format!("    await page.check({});", js_str(selector)),
            TestStep::Uncheck { selector } => format!("    await page.uncheck({});", js_str(selector)),
            TestStep::DownloadXlsx { selector, .. } => {
                let path = js_str(&self.download_path(&spec.name, index).to_string_lossy());
                format!(
                    r#"    {{
      const downloadPromise = page.waitForEvent('download');
      await page.click({sel});
      const download = await downloadPromise;
      await download.saveAs({path});
      emit({{ event: 'download', index: {index}, path: {path} }});
    }}"#,
                    sel = js_str(selector),
                    path = path,
                    index = index,
                )
            }
            TestStep::Evaluate { script, expected } => {
                let run = format!(
                    "    const result_{} = await page.evaluate(() => {{ {} }});",
                    index, script
                );
                match expected {
                    Some(value) => format!(
                        "{}\n    expect(result_{}).toEqual({});",
                        run,
                        index,
                        serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
                    ),
                    None => run,
                }
            }
            TestStep::Log { message } => {
                info!("[TEST LOG] {}", message);
                format!("    console.log({});", js_str(&format!("[TEST] {}", message)))
            }
        }
    }

    fn screenshot_path(&self, name: &str) -> PathBuf {
        self.config.screenshot_dir.join(format!("{}.png", name))
    }

    /// Execute the full script via Playwright
    pub async fn run_script(&self, script: &str) -> E2eResult<ScriptOutput> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("test.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let mut command = TokioCommand::new("node");
        command.arg(&script_path).current_dir(&self.config.work_dir);
        if let Some(path) = &self.config.node_path {
            command.env("NODE_PATH", path);
        }
        let output = tokio::time::timeout(self.config.timeout, command.output())
            .await
            .map_err(|_| {
                E2eError::Playwright(format!(
                    "Script timed out after {}s",
                    self.config.timeout.as_secs()
                ))
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let events = parse_events(&stdout);

        let reported_failure = events
            .iter()
            .any(|e| matches!(e, ScriptEvent::Step { ok: false, .. }));
        if !output.status.success() && !reported_failure {
            return Err(E2eError::Playwright(format!(
                "Script failed:\nstdout: {}\nstderr: {}",
                stdout, stderr
            )));
        }

        Ok(ScriptOutput {
            events,
            exit_ok: output.status.success(),
            stderr,
        })
    }
}

fn mouse_click_js_text(text: &str) -> String {
    format!(
        r#"    {{
      const box = await page.getByText({text}).first().boundingBox();
      if (box) {{
        await page.mouse.move(box.x + box.width / 2, box.y + box.height / 2, {{ steps: 5 }});
        await page.mouse.down();
        await page.mouse.up();
      }}
    }}"#,
        text = js_str(text)
    )
}

/// `page.route` registration answering like the mock would
fn mock_route_js(mock: &MockRegistration, helper: &MockServerHelper) -> E2eResult<String> {
    let response = match &mock.response {
        MockSource::File(path) => helper.utils().load(path, mock.meta.vars.as_ref())?,
        MockSource::Json(value) => MockResponse::json(value.clone()),
        MockSource::Handler(_) => {
            return Err(E2eError::UnsupportedInScript(format!(
                "custom handler for {} {}",
                mock.method, mock.pattern
            )))
        }
    };

    let delay = match mock.meta.delay_ms.filter(|ms| *ms > 0) {
        Some(ms) => format!("\n    await sleep({});", ms),
        None => String::new(),
    };
    let times = match mock.meta.times {
        Some(n) => format!(", {{ times: {} }}", n),
        None => String::new(),
    };

    Ok(format!(
        r#"  await page.route({pattern}, async (route) => {{
    if (route.request().method() !== {method}) return route.fallback();
    console.log('request ' + {method} + ' ' + {pattern});{delay}
    return route.fulfill({fulfill});
  }}{times});
"#,
        pattern = js_str(&mock.pattern),
        method = js_str(&mock.method.to_ascii_uppercase()),
        delay = delay,
        fulfill = fulfill_js(&response)?,
        times = times,
    ))
}

fn fulfill_js(response: &MockResponse) -> E2eResult<String> {
    let body = match &response.body {
        ResponseBody::Json(value) => format!("json: {}", serde_json::to_string(value)?),
        ResponseBody::Text(text) => format!("body: {}", js_str(text)),
        ResponseBody::Bytes(bytes) => {
            format!("body: Buffer.from({}, 'base64')", js_str(&BASE64.encode(bytes)))
        }
    };
    let content_type = response
        .content_type
        .as_deref()
        .map(|ct| format!(", contentType: {}", js_str(ct)))
        .unwrap_or_default();
    Ok(format!("{{ status: {}, {}{} }}", response.status, body, content_type))
}

const MONITOR_JS: &str = r#"  page.on('request', async (request) => {
    const response = await request.response().catch(() => null);
    emit({ event: 'request', method: request.method(), url: request.url(), status: response ? response.status() : null });
  });
  page.on('requestfailed', (request) => {
    const failure = request.failure();
    emit({ event: 'requestfailed', method: request.method(), url: request.url(), failure: failure ? failure.errorText : null });
  });
  page.on('requestfinished', async (request) => {
    const response = await request.response().catch(() => null);
    emit({ event: 'requestfinished', url: request.url(), status: response ? response.status() : null });
  });
  page.on('console', (msg) => emit({ event: 'console', kind: msg.type(), text: msg.text() }));
"#;

/// Generate a script name for a step
pub fn step_name(step: &TestStep) -> String {
    match step {
        TestStep::Navigate { url, .. } => format!("navigate:{}", url),
        TestStep::Click { selector, .. } => format!("click:{}", selector),
        TestStep::Fill { selector, .. } => format!("fill:{}", selector),
        TestStep::Type { selector, .. } => format!("type:{}", selector),
        TestStep::Press { key, .. } => format!("press:{}", key),
        TestStep::PressSequence { keys } => format!("press:{}", keys.join("+")),
        TestStep::Wait { selector, .. } => format!("wait:{}", selector),
        TestStep::Sleep { ms, .. } => format!("sleep:{}ms", ms),
        TestStep::Assert { selector, .. } => format!("assert:{}", selector),
        TestStep::Screenshot { name, .. } => format!("screenshot:{}", name),
        TestStep::ClipScreenshot { name, .. } => format!("clip-screenshot:{}", name),
        TestStep::ScreenshotResolutions { .. } => "screenshot-resolutions".to_string(),
        TestStep::MouseOver { selector, .. } => format!("mouse-over:{}", selector),
        TestStep::MouseDown { selector, .. } => format!("mouse-down:{}", selector),
        TestStep::MouseUp => "mouse-up".to_string(),
        TestStep::MouseClick { selector, .. } => format!("mouse-click:{}", selector),
        TestStep::RemoveMouse => "remove-mouse".to_string(),
        TestStep::RemoveFocus => "remove-focus".to_string(),
        TestStep::FocusWithTab { shift_key } => {
            let key = if *shift_key { "shift+tab" } else { "tab" };
            format!("focus:{}", key)
        }
        TestStep::ScrollBodyTop { .. } => "scroll-body-top".to_string(),
        TestStep::ScrollElement { selector, .. } => format!("scroll:{}", selector),
        TestStep::RemoveAllAlerts => "remove-alerts".to_string(),
        TestStep::WaitForAlerts => "wait-alerts".to_string(),
        TestStep::DisableSpellcheck => "disable-spellcheck".to_string(),
        TestStep::ChangeTheme { theme } => format!("theme:{}", theme),
        TestStep::SwitchTheme { menu_item, .. } => format!("switch-theme:{}", menu_item),
        TestStep::Hover { selector } => format!("hover:{}", selector),
        TestStep::Focus { selector } => format!("focus:{}", selector),
        TestStep::Select { selector, .. } => format!("select:{}", selector),
        TestStep::Check { selector } => format!("check:{}", selector),
        TestStep::Uncheck { selector } => format!("uncheck:{}", selector),
        TestStep::DownloadXlsx { selector, .. } => format!("download:{}", selector),
        TestStep::Evaluate { .. } => "evaluate".to_string(),
        TestStep::Log { message } => {
            format!("log:{}", message.chars().take(30).collect::<String>())
        }
    }
}

fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub screenshot_dir: PathBuf,
    pub download_dir: PathBuf,
    /// Directory scripts run in; `playwright` must be resolvable from here
    pub work_dir: PathBuf,
    pub node_path: Option<PathBuf>,
    pub browser: Browser,
    pub headless: bool,
    pub timeout: Duration,
}

impl PlaywrightConfig {
    pub fn with_output_dir(dir: &Path) -> Self {
        Self {
            screenshot_dir: dir.join("screenshots"),
            download_dir: dir.join("downloads"),
            ..Self::default()
        }
    }
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            download_dir: PathBuf::from("test-results/downloads"),
            work_dir: PathBuf::from("."),
            node_path: None,
            browser: Browser::Chromium,
            headless: true,
            timeout: Duration::from_secs(300),
        }
    }
}
