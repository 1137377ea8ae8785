//! Declarative YAML test specification

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mockwright_common::{TestInfo, Variables};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::RecorderAuth;
use crate::config::MockOptions;
use crate::error::{E2eError, E2eResult};
use crate::input::{ClipMargins, Coord};
use crate::mock::{MockSource, ResponseMeta, UseApi};
use crate::theme::ThemeSwitcher;

/// A complete test specification parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this test, also its title
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering tests
    #[serde(default)]
    pub tags: Vec<String>,

    /// Behaviour descriptions attached to the report
    #[serde(default)]
    pub behavior: Vec<String>,

    /// Project the test runs under (e.g. `chromium`, `chromium-dark`, `network-recorder`)
    #[serde(default = "default_project")]
    pub project: String,

    /// File the test belongs to; recordings and `./` fixtures are resolved next to it
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    #[serde(default)]
    pub mock_options: MockOptions,

    /// Bindings shared by every mock of the test
    #[serde(default)]
    pub vars: Variables,

    /// Mocked API routes, later entries take precedence
    #[serde(default)]
    pub mocks: Vec<MockSpec>,

    /// Theme applied before navigation for dark projects
    #[serde(default)]
    pub theme: Option<ThemeSwitcher>,

    /// Login performed against the live backend when recording
    #[serde(default)]
    pub recorder_auth: Option<RecorderAuth>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,

    /// Expected API calls after the steps ran
    #[serde(default)]
    pub expect_api_calls: Option<ApiCallsExpectation>,

    /// Expected failed requests; `None` skips the check
    #[serde(default)]
    pub expect_network_errors: Option<Vec<String>>,

    /// Expected console messages; `None` skips the check
    #[serde(default)]
    pub expect_console: Option<Vec<String>>,

    /// Whether this test includes visual regression
    #[serde(default)]
    pub visual_regression: bool,

    /// Threshold for visual diff (0.0 - 100.0 percent)
    #[serde(default = "default_threshold")]
    pub visual_threshold: f64,
}

fn default_project() -> String {
    "chromium".to_string()
}

fn default_viewport() -> Viewport {
    Viewport { width: 1280, height: 720 }
}

fn default_threshold() -> f64 {
    0.5 // 0.5% pixel difference allowed by default
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// API calls to compare against
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiCallsExpectation {
    /// `true` compares against the recording
    Recorded(bool),
    Exact(BTreeMap<String, String>),
}

/// One mocked route in YAML form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockSpec {
    /// `METHOD:/app/relative/path`
    pub route: String,

    /// Fixture path (string) or inline JSON body
    pub response: Value,

    #[serde(default)]
    pub times: Option<usize>,

    #[serde(default)]
    pub delay_ms: Option<u64>,

    /// Bindings overriding the test-level ones
    #[serde(default)]
    pub vars: Variables,
}

impl MockSpec {
    pub fn to_use_api(&self, shared: &Variables) -> E2eResult<UseApi> {
        let response = match &self.response {
            Value::String(path) => MockSource::File(path.clone()),
            other => MockSource::Json(other.clone()),
        };

        let mut vars = shared.clone();
        vars.extend(self.vars.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(UseApi::new(&self.route, response)?.with_meta(ResponseMeta {
            times: self.times,
            vars: (!vars.is_empty()).then_some(vars),
            delay_ms: self.delay_ms,
        }))
    }
}

/// A single step in a test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to base)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Fill an input field
    Fill {
        selector: String,
        value: String,
        #[serde(default)]
        clear_first: bool,
    },

    /// Type text with keyboard simulation
    Type {
        selector: String,
        text: String,
        #[serde(default)]
        delay_ms: Option<u64>,
    },

    /// Press a key
    Press {
        selector: Option<String>,
        key: String,
    },

    /// Press keys one after another, pausing after each
    PressSequence {
        keys: Vec<String>,
    },

    /// Wait for an element to appear
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Pause, optionally after the network went idle
    Sleep {
        ms: u64,
        #[serde(default)]
        wait_load_state: bool,
    },

    /// Assert something about an element
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        attribute: Option<AttributeAssertion>,
        #[serde(default)]
        count: Option<usize>,
    },

    /// Take a screenshot
    Screenshot {
        name: String,
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        full_page: bool,
        /// Selectors painted over before capturing
        #[serde(default)]
        mask: Vec<String>,
    },

    /// Screenshot of an element's area grown by margins
    ClipScreenshot {
        name: String,
        selector: String,
        #[serde(default)]
        margins: ClipMargins,
    },

    /// Screenshots at every standard resolution
    ScreenshotResolutions {
        #[serde(default)]
        selector: Option<String>,
        /// Prefix the file names with the test name
        #[serde(default)]
        use_title: bool,
        #[serde(default = "default_resolution_delay")]
        delay_ms: u64,
        #[serde(default = "default_true")]
        wait_load_state: bool,
        #[serde(default)]
        mask: Vec<String>,
    },

    /// Move the mouse over an element's centre
    MouseOver {
        selector: String,
        #[serde(default)]
        shift: Option<Coord>,
    },

    /// Press the left button over an element
    MouseDown {
        selector: String,
        #[serde(default)]
        shift: Option<Coord>,
    },

    /// Release the left button
    MouseUp,

    /// Press and release the left button over an element
    MouseClick {
        selector: String,
        #[serde(default)]
        shift: Option<Coord>,
    },

    /// Release the button and move the pointer to the corner
    RemoveMouse,

    /// Blur the focused element
    RemoveFocus,

    /// Move focus with Tab (or Shift+Tab)
    FocusWithTab {
        #[serde(default)]
        shift_key: bool,
    },

    /// Wheel-scroll the page body
    ScrollBodyTop {
        #[serde(default)]
        delta: Option<f64>,
    },

    /// Set an element's scroll offsets
    ScrollElement {
        selector: String,
        #[serde(default)]
        top: Option<f64>,
        #[serde(default)]
        left: Option<f64>,
    },

    /// Close every alert on the page
    RemoveAllAlerts,

    /// Wait for an alert to become visible
    WaitForAlerts,

    /// Turn off spellcheck on text inputs
    DisableSpellcheck,

    /// Call the page's `setTheme`
    ChangeTheme {
        theme: String,
    },

    /// Switch to the dark theme through the user menu
    SwitchTheme {
        #[serde(default = "default_user_menu")]
        user_menu: String,
        #[serde(default = "default_dark_theme_label")]
        menu_item: String,
    },

    /// Hover over an element
    Hover {
        selector: String,
    },

    /// Focus an element
    Focus {
        selector: String,
    },

    /// Select an option from a dropdown
    Select {
        selector: String,
        value: String,
    },

    /// Check a checkbox
    Check {
        selector: String,
    },

    /// Uncheck a checkbox
    Uncheck {
        selector: String,
    },

    /// Click an element that starts a spreadsheet download and compare it with a golden file
    DownloadXlsx {
        selector: String,
        golden: PathBuf,
    },

    /// Execute custom JavaScript
    Evaluate {
        script: String,
        #[serde(default)]
        expected: Option<Value>,
    },

    /// Log a message (for debugging)
    Log {
        message: String,
    },
}

fn default_wait_timeout() -> u64 {
    5000 // 5 seconds default
}

fn default_resolution_delay() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_user_menu() -> String {
    "adm".to_string()
}

fn default_dark_theme_label() -> String {
    "Switch to dark theme".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeAssertion {
    pub name: String,
    pub value: Option<String>,
    #[serde(default)]
    pub contains: Option<String>,
}

impl TestSpec {
    /// Parse a test spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a test spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut spec = Self::from_yaml(&content)?;
        if spec.file.is_none() {
            spec.file = Some(path.to_path_buf());
        } else if let Some(file) = spec.file.as_mut().filter(|f| f.is_relative()) {
            if let Some(dir) = path.parent() {
                *file = dir.join(&*file);
            }
        }
        Ok(spec)
    }

    /// Load all test specs from a directory
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Identity of the test for recordings and reports
    pub fn test_info(&self) -> TestInfo {
        let file = self
            .file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.yaml", self.name)));
        let mut info = TestInfo::new(self.name.clone(), file, self.project.clone());
        info.add_behavior(self.behavior.iter().cloned());
        info
    }

    /// Mocks in registration order
    pub fn use_apis(&self) -> E2eResult<Vec<UseApi>> {
        self.mocks.iter().map(|m| m.to_use_api(&self.vars)).collect()
    }
}
