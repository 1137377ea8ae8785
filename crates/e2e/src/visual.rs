//! Screenshot assertions against baseline images
//!
//! Screenshots are captured by the browser script into the actual directory
//! and compared here pixel by pixel. Runs in record mode only refresh
//! recordings, so their screenshot assertions always pass.

use std::path::{Path, PathBuf};

use image::{GenericImageView, Pixel, RgbaImage};
use mockwright_common::RunMode;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::input::{js_str, settle_js};

/// Selector masked in client screenshots (build version label)
pub const CLIENT_SCREENSHOT_MASK: &str = ".version-text";

/// Per-channel difference tolerated before a pixel counts as changed
const CHANNEL_TOLERANCE: i32 = 5;

/// Viewport a multi-resolution screenshot is taken at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Resolutions covered by [`screenshot_names`], smallest first
pub const STANDARD_RESOLUTIONS: [Resolution; 4] = [
    Resolution { width: 1024, height: 768 },
    Resolution { width: 1920, height: 1080 },
    Resolution { width: 2048, height: 1080 },
    Resolution { width: 3840, height: 2160 },
];

/// Screenshot name for every standard resolution, optionally prefixed by the test title
pub fn screenshot_names(title: Option<&str>) -> Vec<(Resolution, String)> {
    let prefix = title.map(|t| format!("{}-", t)).unwrap_or_default();
    STANDARD_RESOLUTIONS
        .iter()
        .map(|r| (*r, format!("{}{}x{}", prefix, r.width, r.height)))
        .collect()
}

/// Default selectors masked in client screenshots
pub fn client_screenshot_mask() -> Vec<String> {
    vec![CLIENT_SCREENSHOT_MASK.to_string()]
}

/// Script capturing a page or element at every standard resolution
///
/// The viewport is restored once all shots are taken.
pub fn screenshot_plan(
    selector: Option<&str>,
    title: Option<&str>,
    delay_ms: u64,
    wait_load_state: bool,
    mask: &[String],
    dir: &Path,
) -> String {
    let target = match selector {
        Some(sel) => format!("page.locator({})", js_str(sel)),
        None => "page".to_string(),
    };
    let mask = mask_js(mask);

    let mut js = String::from("    {\n      const defSize = page.viewportSize();\n");
    for (resolution, name) in screenshot_names(title) {
        let path = dir.join(format!("{}.png", name));
        js.push_str(&format!(
            "    await page.setViewportSize({{ width: {}, height: {} }});\n{}\n    await {}.screenshot({{ path: {}, mask: {} }});\n    emit({{ event: 'screenshot', name: {} }});\n",
            resolution.width,
            resolution.height,
            settle_js(delay_ms, wait_load_state),
            target,
            js_str(&path.to_string_lossy()),
            mask,
            js_str(&name),
        ));
    }
    js.push_str("      if (defSize) await page.setViewportSize(defSize);\n    }");
    js
}

/// `mask` option value for `screenshot()`
pub fn mask_js(selectors: &[String]) -> String {
    let locators: Vec<String> = selectors
        .iter()
        .map(|sel| format!("page.locator({})", js_str(sel)))
        .collect();
    format!("[{}]", locators.join(", "))
}

/// Result of a visual comparison
#[derive(Debug, Clone)]
pub struct VisualDiff {
    /// Whether the images match (within threshold)
    pub matches: bool,

    /// Comparison was not performed (record mode)
    pub skipped: bool,

    /// Percentage of pixels that differ
    pub diff_percent: f64,

    /// Number of different pixels
    pub diff_pixels: u64,

    /// Total pixels compared
    pub total_pixels: u64,

    /// Path to the diff image (if generated)
    pub diff_image_path: Option<PathBuf>,

    /// Hash of the actual screenshot
    pub actual_hash: String,

    /// Hash of the baseline screenshot
    pub baseline_hash: String,
}

impl VisualDiff {
    fn identical(hash: String, total_pixels: u64) -> Self {
        Self {
            matches: true,
            skipped: false,
            diff_percent: 0.0,
            diff_pixels: 0,
            total_pixels,
            diff_image_path: None,
            actual_hash: hash.clone(),
            baseline_hash: hash,
        }
    }

    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::identical(String::new(), 0)
        }
    }
}

/// Compares captured screenshots with their baselines
pub struct VisualTester {
    baseline_dir: PathBuf,
    actual_dir: PathBuf,
    diff_dir: PathBuf,
    threshold: f64,
    auto_update: bool,
    mode: RunMode,
}

impl VisualTester {
    pub fn new(config: VisualConfig, mode: RunMode) -> E2eResult<Self> {
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.actual_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;

        Ok(Self {
            baseline_dir: config.baseline_dir,
            actual_dir: config.actual_dir,
            diff_dir: config.diff_dir,
            threshold: config.threshold,
            auto_update: config.auto_update,
            mode,
        })
    }

    pub fn actual_path(&self, name: &str) -> PathBuf {
        self.actual_dir.join(format!("{}.png", name))
    }

    pub fn baseline_path(&self, name: &str) -> PathBuf {
        self.baseline_dir.join(format!("{}.png", name))
    }

    /// Compare a screenshot against its baseline
    pub fn compare(&self, name: &str, threshold: Option<f64>) -> E2eResult<VisualDiff> {
        if self.mode.is_record() {
            debug!("Screenshot comparison skipped for '{}' in record mode", name);
            return Ok(VisualDiff::skipped());
        }

        let threshold = threshold.unwrap_or(self.threshold);
        let actual_path = self.actual_path(name);
        let baseline_path = self.baseline_path(name);

        if !actual_path.exists() {
            return Err(E2eError::VisualRegression(format!(
                "Actual screenshot not found: {}",
                actual_path.display()
            )));
        }

        if !baseline_path.exists() {
            if !self.auto_update {
                return Err(E2eError::BaselineNotFound(baseline_path.display().to_string()));
            }
            info!("Creating baseline for '{}' (auto-update enabled)", name);
            std::fs::copy(&actual_path, &baseline_path)?;
            return Ok(VisualDiff::identical(hash_file(&actual_path)?, 0));
        }

        let actual_hash = hash_file(&actual_path)?;
        let baseline_hash = hash_file(&baseline_path)?;
        let actual_img = image::open(&actual_path)?;

        if actual_hash == baseline_hash {
            debug!("Screenshots match exactly (same hash)");
            let total = u64::from(actual_img.width()) * u64::from(actual_img.height());
            return Ok(VisualDiff::identical(actual_hash, total));
        }

        let baseline_img = image::open(&baseline_path)?;
        if actual_img.dimensions() != baseline_img.dimensions() {
            warn!(
                "Screenshot dimensions differ: actual {:?} vs baseline {:?}",
                actual_img.dimensions(),
                baseline_img.dimensions()
            );
        }

        let (width, height) = actual_img.dimensions();
        let baseline_rgba = baseline_img.to_rgba8();
        let actual_rgba = actual_img.to_rgba8();

        let mut diff_img = RgbaImage::new(width, height);
        let mut diff_pixels = 0u64;
        let total_pixels = u64::from(width) * u64::from(height);

        for y in 0..height {
            for x in 0..width {
                let actual_pixel = actual_rgba.get_pixel(x, y);
                let in_baseline = x < baseline_rgba.width() && y < baseline_rgba.height();

                if !in_baseline || pixels_differ(actual_pixel, baseline_rgba.get_pixel(x, y)) {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                } else {
                    let c = actual_pixel.channels();
                    diff_img.put_pixel(x, y, image::Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
                }
            }
        }

        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            (diff_pixels as f64 / total_pixels as f64) * 100.0
        };
        let matches = diff_percent <= threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.diff_dir.join(format!("{}-diff.png", name));
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "Visual regression detected in '{}': {:.2}% pixels differ (threshold: {:.2}%)",
                name, diff_percent, threshold
            );
        }

        Ok(VisualDiff {
            matches,
            skipped: false,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image_path,
            actual_hash,
            baseline_hash,
        })
    }

    /// Compare and turn a mismatch into an error
    pub fn assert_matches(&self, name: &str, threshold: Option<f64>) -> E2eResult<VisualDiff> {
        let diff = self.compare(name, threshold)?;
        if !diff.matches {
            return Err(E2eError::ScreenshotMismatch {
                name: name.to_string(),
                diff_percent: diff.diff_percent,
                threshold: threshold.unwrap_or(self.threshold),
            });
        }
        Ok(diff)
    }

    /// Update the baseline with the actual screenshot
    pub fn update_baseline(&self, name: &str) -> E2eResult<()> {
        let actual_path = self.actual_path(name);
        if !actual_path.exists() {
            return Err(E2eError::VisualRegression(format!(
                "Cannot update baseline: actual screenshot not found: {}",
                actual_path.display()
            )));
        }

        std::fs::copy(&actual_path, self.baseline_path(name))?;
        info!("Updated baseline for '{}'", name);
        Ok(())
    }

    /// Copy every captured screenshot over its baseline
    pub fn update_all_baselines(&self) -> E2eResult<usize> {
        let names = png_stems(&self.actual_dir)?;
        for name in &names {
            self.update_baseline(name)?;
        }
        Ok(names.len())
    }

    /// List all baselines
    pub fn list_baselines(&self) -> E2eResult<Vec<String>> {
        png_stems(&self.baseline_dir)
    }

    /// Clean up old diff images
    pub fn clean_diffs(&self) -> E2eResult<()> {
        for entry in std::fs::read_dir(&self.diff_dir)? {
            std::fs::remove_file(entry?.path())?;
        }
        Ok(())
    }
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (i32::from(*x) - i32::from(*y)).abs() > CHANNEL_TOLERANCE)
}

fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&data)))
}

fn png_stems(dir: &Path) -> E2eResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "png").unwrap_or(false) {
            if let Some(name) = path.file_stem() {
                names.push(name.to_string_lossy().to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Configuration for visual testing
#[derive(Debug, Clone)]
pub struct VisualConfig {
    pub baseline_dir: PathBuf,
    pub actual_dir: PathBuf,
    pub diff_dir: PathBuf,
    pub threshold: f64,
    pub auto_update: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            baseline_dir: PathBuf::from("test-results/baselines"),
            actual_dir: PathBuf::from("test-results/screenshots"),
            diff_dir: PathBuf::from("test-results/diffs"),
            threshold: 0.5,
            auto_update: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(root: &Path) -> VisualConfig {
        VisualConfig {
            baseline_dir: root.join("baselines"),
            actual_dir: root.join("actual"),
            diff_dir: root.join("diffs"),
            threshold: 0.5,
            auto_update: false,
        }
    }

    fn solid(path: &Path, width: u32, height: u32, rgba: [u8; 4]) {
        RgbaImage::from_pixel(width, height, image::Rgba(rgba))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_visual_config_default() {
        let config = VisualConfig::default();
        assert_eq!(config.threshold, 0.5);
        assert!(!config.auto_update);
    }

    #[test]
    fn test_screenshot_names() {
        let names: Vec<String> = screenshot_names(Some("report")).into_iter().map(|(_, n)| n).collect();
        assert_eq!(
            names,
            vec!["report-1024x768", "report-1920x1080", "report-2048x1080", "report-3840x2160"]
        );
        assert_eq!(screenshot_names(None)[0].1, "1024x768");
    }

    #[test]
    fn test_screenshot_plan_restores_viewport() {
        let js = screenshot_plan(
            Some("#chart"),
            Some("chart"),
            500,
            true,
            &client_screenshot_mask(),
            Path::new("shots"),
        );
        assert_eq!(js.matches("setViewportSize({ width:").count(), 4);
        assert_eq!(js.matches("networkidle").count(), 4);
        assert!(js.contains("chart-3840x2160.png"));
        assert!(js.contains(r#"mask: [page.locator(".version-text")]"#));
        assert!(js.trim_end().ends_with("if (defSize) await page.setViewportSize(defSize);\n    }"));
    }

    #[test]
    fn test_identical_and_tolerated_screenshots() {
        let tmp = TempDir::new().unwrap();
        let tester = VisualTester::new(config(tmp.path()), RunMode::Replay).unwrap();
        solid(&tester.actual_path("a"), 4, 4, [10, 10, 10, 255]);
        solid(&tester.baseline_path("a"), 4, 4, [10, 10, 10, 255]);
        assert!(tester.compare("a", None).unwrap().matches);

        solid(&tester.actual_path("b"), 4, 4, [12, 10, 10, 255]);
        solid(&tester.baseline_path("b"), 4, 4, [10, 10, 10, 255]);
        let diff = tester.compare("b", None).unwrap();
        assert!(diff.matches);
        assert_eq!(diff.diff_pixels, 0);
    }

    #[test]
    fn test_mismatch_writes_diff_image() {
        let tmp = TempDir::new().unwrap();
        let tester = VisualTester::new(config(tmp.path()), RunMode::Replay).unwrap();
        solid(&tester.actual_path("c"), 4, 4, [255, 255, 255, 255]);
        solid(&tester.baseline_path("c"), 4, 4, [0, 0, 0, 255]);

        let diff = tester.compare("c", None).unwrap();
        assert!(!diff.matches);
        assert_eq!(diff.diff_pixels, 16);
        assert!(diff.diff_image_path.unwrap().exists());
        assert!(matches!(
            tester.assert_matches("c", None),
            Err(E2eError::ScreenshotMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_baseline() {
        let tmp = TempDir::new().unwrap();
        let tester = VisualTester::new(config(tmp.path()), RunMode::Replay).unwrap();
        solid(&tester.actual_path("d"), 2, 2, [1, 2, 3, 255]);
        assert!(matches!(tester.compare("d", None), Err(E2eError::BaselineNotFound(_))));

        let updating = VisualTester::new(
            VisualConfig { auto_update: true, ..config(tmp.path()) },
            RunMode::Replay,
        )
        .unwrap();
        assert!(updating.compare("d", None).unwrap().matches);
        assert_eq!(updating.list_baselines().unwrap(), vec!["d".to_string()]);
    }

    #[test]
    fn test_record_mode_skips() {
        let tmp = TempDir::new().unwrap();
        let tester = VisualTester::new(config(tmp.path()), RunMode::Record).unwrap();
        let diff = tester.compare("never-captured", None).unwrap();
        assert!(diff.matches && diff.skipped);
    }
}
