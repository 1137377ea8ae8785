//! Mockwright E2E Test Framework
//!
//! Drives Playwright from Rust for front-end tests that run against mocked
//! backends:
//! - Parses declarative YAML test specs
//! - Layers API mocks, HAR replay and a strict guard over the app's API routes
//! - Renders each test into a Node script and reads its events back
//! - Compares screenshots and downloaded spreadsheets with golden files
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── mock_helper(spec) -> MockServerHelper                │
//! │    │     ├── strict guard < HAR replay < user mocks         │
//! │    │     └── NetworkMonitor (API calls, failures, console)  │
//! │    ├── build_script / run_script -> ScriptOutput            │
//! │    ├── VisualTester::compare(name) -> VisualDiff            │
//! │    └── compare_xlsx(download, golden) -> SpreadsheetDiff    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSpec (YAML)                                            │
//! │    ├── name, project, file, behavior                        │
//! │    ├── mock_options, vars, mocks: [route, response, times]  │
//! │    ├── steps: [Step]                                        │
//! │    └── expect_api_calls, expect_network_errors, ...         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod input;
pub mod mock;
pub mod monitor;
pub mod playwright;
pub mod route;
pub mod runner;
pub mod spec;
pub mod spreadsheet;
pub mod theme;
pub mod visual;

pub use config::{AppConfig, MockOptions};
pub use error::{E2eError, E2eResult};
pub use mock::{MockServerHelper, MockSource, ResponseMeta, UseApi};
pub use runner::TestRunner;
pub use spec::{TestSpec, TestStep};
