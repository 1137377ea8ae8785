//! The bundled YAML specs parse and render into browser scripts

use std::path::PathBuf;

use mockwright_e2e::playwright::{PlaywrightConfig, PlaywrightHandle};
use mockwright_e2e::spec::TestStep;
use mockwright_e2e::{AppConfig, MockServerHelper, TestSpec};
use tempfile::TempDir;

fn specs_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/e2e/specs")
}

#[test]
fn bundled_specs_load() {
    let specs = TestSpec::load_all(&specs_dir()).unwrap();
    assert!(!specs.is_empty());

    let reports = specs.iter().find(|s| s.name == "report list").unwrap();
    assert_eq!(reports.file.as_deref(), Some(specs_dir().join("reports.yaml").as_path()));
    assert!(matches!(reports.steps.last(), Some(TestStep::DownloadXlsx { .. })));
    assert_eq!(TestSpec::filter_by_tag(&specs, "smoke").len(), 1);
}

#[test]
fn bundled_spec_renders() {
    let tmp = TempDir::new().unwrap();
    let specs = TestSpec::load_all(&specs_dir()).unwrap();
    let spec = specs.iter().find(|s| s.name == "report list").unwrap();

    let helper = MockServerHelper::new(spec.test_info(), AppConfig::default(), spec.mock_options.clone()).unwrap();
    helper.use_mocks(spec.use_apis().unwrap()).unwrap();

    let handle = PlaywrightHandle::unchecked(PlaywrightConfig::with_output_dir(tmp.path())).unwrap();
    let script = handle.build_script(spec, &helper, &[]).unwrap();

    assert!(script.contains(r#""owner":"adm""#));
    assert!(script.contains(r#""total":2"#));
    assert!(script.contains("report list-1024x768.png"));
    assert!(script.contains("page.waitForEvent('download')"));
    assert!(script.contains(&handle.download_path(&spec.name, 6).to_string_lossy().to_string()));
}
