//! Pointer, keyboard and scroll helpers
//!
//! Geometry is computed the same way on both sides: the Rust functions here
//! and the snippets they render for the browser script.

use serde::{Deserialize, Serialize};

/// Number of intermediate pointer events for a mouse move
pub const MOUSE_MOVE_STEPS: u32 = 5;

/// Pointer offset applied to the mouse before scrolling the page body
pub const SCROLL_PARK_X: f64 = -1200.0;

/// Default wheel delta for scrolling the body back to the top
pub const SCROLL_TOP_DELTA: f64 = -1000.0;

/// Pause after an interaction, in milliseconds
pub const DEFAULT_SETTLE_MS: u64 = 200;

/// Optional offset from an element's centre
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }
}

/// Element bounds as reported by the browser
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Centre of the box, moved by `shift`
    pub fn center_with_shift(&self, shift: Option<Coord>) -> (f64, f64) {
        let shift = shift.unwrap_or_default();
        (
            self.x + self.width / 2.0 + shift.x.unwrap_or(0.0),
            self.y + self.height / 2.0 + shift.y.unwrap_or(0.0),
        )
    }

    /// Box grown outward by the given margins
    pub fn screen_clip(&self, margins: &ClipMargins) -> BoundingBox {
        let mut clip = *self;
        if let Some(left) = margins.left {
            clip.x -= left;
            clip.width += left;
        }
        if let Some(right) = margins.right {
            clip.width += right;
        }
        if let Some(top) = margins.top {
            clip.y -= top;
            clip.height += top;
        }
        if let Some(bottom) = margins.bottom {
            clip.height += bottom;
        }
        clip
    }
}

/// Extra space around an element when clipping a screenshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipMargins {
    #[serde(default)]
    pub top: Option<f64>,
    #[serde(default)]
    pub left: Option<f64>,
    #[serde(default)]
    pub right: Option<f64>,
    #[serde(default)]
    pub bottom: Option<f64>,
}

/// Scroll offsets for an element
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    #[serde(default)]
    pub top: Option<f64>,
    #[serde(default)]
    pub left: Option<f64>,
}

/// JS string literal
pub fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "''".to_string())
}

fn js_num(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => "0".to_string(),
    }
}

fn js_opt_num(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => "undefined".to_string(),
    }
}

/// Move the mouse to the centre of `selector`, shifted by `shift`
pub fn mouse_over_js(selector: &str, shift: Option<Coord>) -> String {
    let shift = shift.unwrap_or_default();
    format!(
        r#"    {{
      const box = await page.locator({sel}).boundingBox();
      if (box) await page.mouse.move(box.x + box.width / 2 + {dx}, box.y + box.height / 2 + {dy}, {{ steps: {steps} }});
    }}"#,
        sel = js_str(selector),
        dx = js_num(shift.x),
        dy = js_num(shift.y),
        steps = MOUSE_MOVE_STEPS,
    )
}

pub fn mouse_down_js(selector: &str, shift: Option<Coord>) -> String {
    format!("{}\n    await page.mouse.down();", mouse_over_js(selector, shift))
}

pub fn mouse_click_js(selector: &str, shift: Option<Coord>) -> String {
    format!("{}\n    await page.mouse.up();", mouse_down_js(selector, shift))
}

/// Release the button and park the pointer in the corner
pub fn remove_mouse_js() -> String {
    format!(
        "    await page.mouse.up();\n    await page.mouse.move(0, 0, {{ steps: {} }});\n{}",
        MOUSE_MOVE_STEPS,
        settle_js(DEFAULT_SETTLE_MS, false)
    )
}

pub fn remove_focus_js() -> String {
    format!(
        "    await page.evaluate(() => {{ const el = document.activeElement; if (el) el.blur(); }});\n{}",
        settle_js(DEFAULT_SETTLE_MS, false)
    )
}

pub fn focus_with_tab_js(shift_key: bool) -> String {
    let key = if shift_key { "Shift+Tab" } else { "Tab" };
    format!(
        "    await page.keyboard.press({});\n{}",
        js_str(key),
        settle_js(DEFAULT_SETTLE_MS, false)
    )
}

/// Press each key in turn, pausing after every press
pub fn press_sequence_js(keys: &[String]) -> String {
    keys.iter()
        .map(|key| {
            format!(
                "    await page.keyboard.press({});\n{}",
                js_str(key),
                settle_js(DEFAULT_SETTLE_MS, false)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Scroll the page with the wheel after moving the pointer off the content
pub fn scroll_body_top_js(delta: Option<f64>) -> String {
    format!(
        "    await page.mouse.move({}, 0);\n    await page.mouse.wheel(0, {});",
        SCROLL_PARK_X,
        delta.unwrap_or(SCROLL_TOP_DELTA)
    )
}

pub fn scroll_element_js(selector: &str, scroll: &ScrollPosition) -> String {
    format!(
        r#"    await page.locator({sel}).evaluate((node, s) => {{
      if (s.top !== undefined) node.scrollTop = s.top;
      if (s.left !== undefined) node.scrollLeft = s.left;
    }}, {{ top: {top}, left: {left} }});"#,
        sel = js_str(selector),
        top = js_opt_num(scroll.top),
        left = js_opt_num(scroll.left),
    )
}

/// Fixed pause, optionally after the network went idle
pub fn settle_js(ms: u64, wait_load_state: bool) -> String {
    let mut js = String::new();
    if wait_load_state {
        js.push_str("    await page.waitForLoadState('networkidle', { timeout: 20000 });\n");
    }
    js.push_str(&format!("    await page.waitForTimeout({});", ms));
    js
}

/// Bounds of `selector` grown by `margins`, bound to `clip`
pub fn screen_clip_js(selector: &str, margins: &ClipMargins) -> String {
    format!(
        r#"    const clip = {{ ...(await page.locator({sel}).boundingBox()) }};
    clip.x -= {left}; clip.width += {left};
    clip.width += {right};
    clip.y -= {top}; clip.height += {top};
    clip.height += {bottom};"#,
        sel = js_str(selector),
        left = js_num(margins.left),
        right = js_num(margins.right),
        top = js_num(margins.top),
        bottom = js_num(margins.bottom),
    )
}
