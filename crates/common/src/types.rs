//! Test metadata shared by the mock and runner layers

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Annotation type given to the first behaviour description of a test
pub const BEHAVIOR_ANNOTATION: &str = "Behavior";

/// Project name marker that switches a run into recording mode
pub const RECORDER_PROJECT_MARKER: &str = "network-recorder";

/// Description attached to a test report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub description: Option<String>,
}

/// Identity of the running test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestInfo {
    /// Test title as written in the test file
    pub title: String,

    /// Path of the file that declares the test
    pub file: PathBuf,

    /// Name of the project (browser/theme/recorder configuration) running the test
    #[serde(default)]
    pub project: String,

    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl TestInfo {
    pub fn new(title: impl Into<String>, file: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            file: file.into(),
            project: project.into(),
            annotations: Vec::new(),
        }
    }

    /// Directory containing the test file
    pub fn directory(&self) -> &Path {
        self.file.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Mode the network layer runs in, derived from the project name
    pub fn run_mode(&self) -> RunMode {
        RunMode::from_project(&self.project)
    }

    /// Whether the project renders the dark theme
    pub fn is_dark_theme(&self) -> bool {
        self.project.contains("dark")
    }

    /// Add an annotation; `kind` defaults to an empty type
    pub fn add_annotation(&mut self, kind: Option<&str>, description: impl Into<String>) {
        self.annotations.push(Annotation {
            kind: kind.unwrap_or_default().to_string(),
            description: Some(description.into()),
        });
    }

    /// Record behaviour descriptions; only the first one carries the type
    pub fn add_behavior<I, S>(&mut self, descriptions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (idx, description) in descriptions.into_iter().enumerate() {
            let kind = if idx == 0 { Some(BEHAVIOR_ANNOTATION) } else { None };
            self.add_annotation(kind, description);
        }
    }
}

/// Whether API traffic is replayed from recordings or recorded against a live backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Replay,
    Record,
}

impl RunMode {
    pub fn from_project(project: &str) -> Self {
        if project.contains(RECORDER_PROJECT_MARKER) {
            Self::Record
        } else {
            Self::Replay
        }
    }

    pub fn is_record(self) -> bool {
        self == Self::Record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behavior_annotations() {
        let mut info = TestInfo::new("opens report", "tests/report.spec.ts", "chromium");
        info.add_behavior(["Opens the report", "Shows totals"]);
        info.add_annotation(None, "extra");

        assert_eq!(info.annotations.len(), 3);
        assert_eq!(info.annotations[0].kind, BEHAVIOR_ANNOTATION);
        assert_eq!(info.annotations[1].kind, "");
        assert_eq!(info.annotations[2].description.as_deref(), Some("extra"));
    }

    #[test]
    fn test_run_mode_from_project() {
        assert_eq!(RunMode::from_project("chromium"), RunMode::Replay);
        assert_eq!(RunMode::from_project("network-recorder"), RunMode::Record);
        assert!(RunMode::from_project("network-recorder-dark").is_record());
    }

    #[test]
    fn test_directory_and_theme() {
        let info = TestInfo::new("t", "suite/login.spec.ts", "chromium-dark");
        assert_eq!(info.directory(), Path::new("suite"));
        assert!(info.is_dark_theme());
    }
}
