//! Dark theme selection for projects that render it

use mockwright_common::TestInfo;
use serde::{Deserialize, Serialize};

use crate::input::js_str;

/// Seeds the app's theme in local storage before the page loads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSwitcher {
    pub theme_key: String,
    pub dark_value: String,
}

impl Default for ThemeSwitcher {
    fn default() -> Self {
        Self {
            theme_key: "app_theme".to_string(),
            dark_value: "app_dark_theme".to_string(),
        }
    }
}

impl ThemeSwitcher {
    /// Init script for the test, or `None` when the project is not a dark one
    pub fn init_script(&self, test: &TestInfo) -> Option<String> {
        test.is_dark_theme()
            .then(|| set_init_theme_js(&self.theme_key, &self.dark_value))
    }
}

/// Store `theme` under `key` in local storage on every navigation
pub fn set_init_theme_js(key: &str, theme: &str) -> String {
    format!(
        "    await page.addInitScript(([k, v]) => window.localStorage.setItem(k, v), [{}, {}]);",
        js_str(key),
        js_str(theme)
    )
}

/// Call the page's own theme setter (storybook builds)
pub fn change_theme_js(theme: &str) -> String {
    format!(
        "    await page.evaluate((theme) => window.setTheme(theme), {});",
        js_str(theme)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_dark_projects_get_init_script() {
        let switcher = ThemeSwitcher::default();
        let light = TestInfo::new("t", "a.yaml", "chromium");
        assert!(switcher.init_script(&light).is_none());

        let dark = TestInfo::new("t", "a.yaml", "chromium-dark");
        let js = switcher.init_script(&dark).unwrap();
        assert!(js.contains("\"app_theme\", \"app_dark_theme\""));
    }

    #[test]
    fn test_custom_keys_from_yaml() {
        let switcher: ThemeSwitcher = serde_yaml::from_str("theme_key: ui").unwrap();
        assert_eq!(switcher.theme_key, "ui");
        assert_eq!(switcher.dark_value, "app_dark_theme");
    }
}
