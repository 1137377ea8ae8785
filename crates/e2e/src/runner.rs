//! Main test runner that orchestrates mocks, Playwright, and golden comparisons

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{E2eError, E2eResult};
use crate::mock::MockServerHelper;
use crate::playwright::{PlaywrightConfig, PlaywrightHandle, ScriptOutput, StepResult};
use crate::spec::{ApiCallsExpectation, TestSpec, TestStep};
use crate::spreadsheet::compare_xlsx;
use crate::visual::{VisualConfig, VisualTester};

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub project: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub visual_diffs: Vec<VisualDiffResult>,
    pub spreadsheets: Vec<SpreadsheetResult>,
    pub api_calls: std::collections::BTreeMap<String, String>,
    pub failed_requests: Vec<String>,
    pub console: Vec<String>,
    pub error: Option<String>,
}

impl TestResult {
    fn errored(spec: &TestSpec, error: &E2eError) -> Self {
        Self {
            name: spec.name.clone(),
            project: spec.project.clone(),
            success: false,
            duration_ms: 0,
            steps: vec![],
            visual_diffs: vec![],
            spreadsheets: vec![],
            api_calls: Default::default(),
            failed_requests: vec![],
            console: vec![],
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualDiffResult {
    pub name: String,
    pub matches: bool,
    pub skipped: bool,
    pub diff_percent: f64,
    pub diff_image_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadsheetResult {
    pub golden: PathBuf,
    pub matches: bool,
    pub error: Option<String>,
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn from_results(results: Vec<TestResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            skipped: 0,
            duration_ms,
            results,
        }
    }
}

/// Main E2E test runner
pub struct TestRunner {
    app: AppConfig,
    playwright: PlaywrightHandle,
    visual_config: VisualConfig,
    fixtures_root: Option<PathBuf>,
    specs_dir: PathBuf,
    output_dir: PathBuf,
}

impl TestRunner {
    /// Create a test runner; fails when Playwright is not installed
    pub fn with_config(config: RunnerConfig) -> E2eResult<Self> {
        let playwright = PlaywrightHandle::new(config.playwright)?;
        Ok(Self {
            app: config.app,
            playwright,
            visual_config: config.visual,
            fixtures_root: config.fixtures_root,
            specs_dir: config.specs_dir,
            output_dir: config.output_dir,
        })
    }

    /// Run all tests in the specs directory
    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        Ok(self.run_specs(&specs).await)
    }

    /// Run tests matching a tag
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        let filtered: Vec<TestSpec> = TestSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        Ok(self.run_specs(&filtered).await)
    }

    /// Run a specific test by name
    pub async fn run_test(&self, name: &str) -> E2eResult<TestResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Test not found: {}", name)))?;

        self.run_spec(&spec).await
    }

    /// Run a list of test specs
    pub async fn run_specs(&self, specs: &[TestSpec]) -> TestSuiteResult {
        let start = Instant::now();
        let mut results = Vec::new();

        info!("Running {} test(s)...", specs.len());

        for spec in specs {
            let result = match self.run_spec(spec).await {
                Ok(result) => result,
                Err(e) => TestResult::errored(spec, &e),
            };
            if result.success {
                info!("✓ {} [{}] ({} ms)", result.name, result.project, result.duration_ms);
            } else {
                error!(
                    "✗ {} [{}] - {}",
                    result.name,
                    result.project,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let suite = TestSuiteResult::from_results(results, start.elapsed().as_millis() as u64);
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.skipped, suite.duration_ms
        );
        suite
    }

    /// Helper with the spec's options and mocks registered
    pub fn mock_helper(&self, spec: &TestSpec) -> E2eResult<MockServerHelper> {
        let mut options = spec.mock_options.clone();
        if options.fixtures_root.is_none() {
            options.fixtures_root = self.fixtures_root.clone();
        }
        let helper = MockServerHelper::new(spec.test_info(), self.app.clone(), options)?;
        helper.use_mocks(spec.use_apis()?)?;
        Ok(helper)
    }

    /// Run a single test spec
    pub async fn run_spec(&self, spec: &TestSpec) -> E2eResult<TestResult> {
        let start = Instant::now();
        debug!("Running test: {} [{}]", spec.name, spec.project);

        let helper = self.mock_helper(spec)?;
        let cookies = match &spec.recorder_auth {
            Some(auth) => auth.login(&self.app, helper.mode()).await?,
            None => Vec::new(),
        };

        let script = self.playwright.build_script(spec, &helper, &cookies)?;
        let output = self.playwright.run_script(&script).await?;
        for event in &output.events {
            event.apply(helper.monitor());
        }

        let steps = output.step_results(&spec.steps);
        let mut test_error = steps
            .iter()
            .find(|s| !s.success)
            .map(|s| format!("{}: {}", s.step_name, s.error.as_deref().unwrap_or("failed")));

        let visual_diffs = if test_error.is_none() && spec.visual_regression {
            self.compare_screenshots(spec, &helper, &output, &mut test_error)?
        } else {
            Vec::new()
        };

        let spreadsheets = if test_error.is_none() {
            self.compare_downloads(spec, &output, &mut test_error)
        } else {
            Vec::new()
        };

        if test_error.is_none() {
            if let Err(e) = check_expectations(spec, &helper) {
                test_error = Some(e.to_string());
            }
        }

        Ok(TestResult {
            name: spec.name.clone(),
            project: spec.project.clone(),
            success: test_error.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            visual_diffs,
            spreadsheets,
            api_calls: helper.api_calls(),
            failed_requests: helper.monitor().failed_requests(),
            console: helper.monitor().console_messages(),
            error: test_error,
        })
    }

    fn compare_screenshots(
        &self,
        spec: &TestSpec,
        helper: &MockServerHelper,
        output: &ScriptOutput,
        test_error: &mut Option<String>,
    ) -> E2eResult<Vec<VisualDiffResult>> {
        let tester = VisualTester::new(self.visual_config_for(spec), helper.mode())?;
        let mut diffs = Vec::new();

        for name in output.screenshots() {
            match tester.compare(&name, Some(spec.visual_threshold)) {
                Ok(diff) => {
                    if !diff.matches && test_error.is_none() {
                        *test_error = Some(format!(
                            "Visual regression in '{}': {:.2}% pixels differ",
                            name, diff.diff_percent
                        ));
                    }
                    diffs.push(VisualDiffResult {
                        name,
                        matches: diff.matches,
                        skipped: diff.skipped,
                        diff_percent: diff.diff_percent,
                        diff_image_path: diff
                            .diff_image_path
                            .map(|p| p.to_string_lossy().to_string()),
                    });
                }
                Err(E2eError::BaselineNotFound(path)) => {
                    info!("No baseline for '{}' ({}), run with --update-baselines", name, path);
                }
                Err(e) => {
                    *test_error = Some(format!("Visual comparison error: {}", e));
                }
            }
        }
        Ok(diffs)
    }

    /// Baselines live next to the test as `{file}-snapshots`, like recordings
    fn visual_config_for(&self, spec: &TestSpec) -> VisualConfig {
        let mut config = self.visual_config.clone();
        config.actual_dir = self.playwright.config().screenshot_dir.clone();
        if let Some(file) = &spec.file {
            let mut dir = file.clone().into_os_string();
            dir.push("-snapshots");
            config.baseline_dir = PathBuf::from(dir);
        }
        config
    }

    fn compare_downloads(
        &self,
        spec: &TestSpec,
        output: &ScriptOutput,
        test_error: &mut Option<String>,
    ) -> Vec<SpreadsheetResult> {
        let base = spec
            .file
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new("."));
        let downloads = output.downloads();
        let mut results = Vec::new();

        for (index, step) in spec.steps.iter().enumerate() {
            let TestStep::DownloadXlsx { golden, .. } = step else {
                continue;
            };
            let golden = base.join(golden);
            let Some((_, actual)) = downloads.iter().find(|(i, _)| *i == index) else {
                warn!("Step {} reported no download", index + 1);
                continue;
            };

            let outcome = compare_xlsx(actual, &golden)
                .and_then(|diff| diff.ensure_match(&golden.display().to_string()));
            let error = outcome.err().map(|e| e.to_string());
            if let (Some(e), None) = (&error, test_error.as_ref()) {
                *test_error = Some(e.clone());
            }
            results.push(SpreadsheetResult {
                golden,
                matches: error.is_none(),
                error,
            });
        }
        results
    }

    /// Update all visual baselines from current screenshots
    pub fn update_baselines(&self, spec: &TestSpec) -> E2eResult<usize> {
        let tester = VisualTester::new(
            VisualConfig {
                auto_update: true,
                ..self.visual_config_for(spec)
            },
            spec.test_info().run_mode(),
        )?;
        tester.update_all_baselines()
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.output_dir, results)
    }
}

/// Mock-layer assertions a spec asks for
pub fn check_expectations(spec: &TestSpec, helper: &MockServerHelper) -> E2eResult<()> {
    match &spec.expect_api_calls {
        Some(ApiCallsExpectation::Recorded(true)) => helper.expect_api_calls(None)?,
        Some(ApiCallsExpectation::Exact(expected)) => helper.expect_api_calls(Some(expected))?,
        _ => {}
    }
    if let Some(expected) = &spec.expect_network_errors {
        helper.expect_network_errors(expected)?;
    }
    if let Some(expected) = &spec.expect_console {
        helper.expect_console(expected)?;
    }
    Ok(())
}

/// Write `test-results.json` into `dir`
pub fn write_results(dir: &Path, results: &TestSuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub app: AppConfig,
    pub playwright: PlaywrightConfig,
    pub visual: VisualConfig,
    /// Root for fixture paths that are not relative to the test file
    pub fixtures_root: Option<PathBuf>,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let output_dir = PathBuf::from("test-results");
        Self {
            app: AppConfig::default(),
            playwright: PlaywrightConfig::with_output_dir(&output_dir),
            visual: VisualConfig::default(),
            fixtures_root: None,
            specs_dir: PathBuf::from("tests/e2e/specs"),
            output_dir,
        }
    }
}
