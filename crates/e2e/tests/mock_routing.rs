//! Route layering of `MockServerHelper` against on-disk recordings

use std::fs::File;
use std::io::Write;
use std::path::Path;

use mockwright_common::{HarLocation, TestInfo};
use mockwright_e2e::route::{MockResponse, ResponseBody, RouteAction, RouteRequest};
use mockwright_e2e::{AppConfig, MockOptions, MockServerHelper, ResponseMeta, UseApi};
use serde_json::json;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const ITEMS_URL: &str = "http://localhost:3000/svc/api/items";

fn recording() -> String {
    json!({"log": {"entries": [
        {"request": {"method": "GET", "url": ITEMS_URL},
         "response": {"status": 200, "content": {"mimeType": "application/json", "_file": "items.json"}}},
        {"request": {"method": "GET", "url": "http://localhost:3000/svc/api/user"},
         "response": {"status": 401, "content": {"text": "{}"}}}
    ]}})
    .to_string()
}

fn write_zipped_recording(test: &TestInfo) {
    let path = HarLocation::new(None, true).har_path(test);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
    for (name, content) in [
        ("har.har", recording()),
        ("items.json", r#"[{"id": "${id}"}]"#.to_string()),
    ] {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn zipped_helper(dir: &Path, project: &str) -> MockServerHelper {
    let test = TestInfo::new("lists items", dir.join("items.yaml"), project);
    write_zipped_recording(&test);
    let options = MockOptions {
        zip_har: true,
        ..MockOptions::default()
    };
    MockServerHelper::new(test, AppConfig::default(), options).unwrap()
}

async fn route(helper: &MockServerHelper, method: &str, url: &str) -> RouteAction {
    helper.route(&RouteRequest::new(method, url)).await.unwrap()
}

#[tokio::test]
async fn replays_zipped_recording_with_side_files() {
    let tmp = TempDir::new().unwrap();
    let helper = zipped_helper(tmp.path(), "chromium");

    match route(&helper, "GET", ITEMS_URL).await {
        RouteAction::Fulfill(resp) => {
            assert_eq!(resp.status, 200);
            assert_eq!(resp.body, ResponseBody::Bytes(br#"[{"id": "${id}"}]"#.to_vec()));
        }
        other => panic!("unexpected {:?}", other),
    }

    // not recorded: the strict guard answers
    assert_eq!(
        route(&helper, "DELETE", ITEMS_URL).await,
        RouteAction::Abort("accessdenied".to_string())
    );
}

#[tokio::test]
async fn mocks_override_recording_and_expire() {
    let tmp = TempDir::new().unwrap();
    let helper = zipped_helper(tmp.path(), "chromium");

    let mut vars = mockwright_common::Variables::new();
    vars.insert("id".to_string(), json!(12));
    helper
        .use_mocks([UseApi::new("GET:/svc/api/items", "har/items.json")
            .unwrap()
            .with_meta(ResponseMeta {
                times: Some(1),
                vars: Some(vars),
                delay_ms: None,
            })])
        .unwrap();

    assert_eq!(
        route(&helper, "GET", ITEMS_URL).await,
        RouteAction::Fulfill(MockResponse::json(json!([{"id": 12}])))
    );

    // second call falls through to the recording
    match route(&helper, "GET", ITEMS_URL).await {
        RouteAction::Fulfill(resp) => assert!(matches!(resp.body, ResponseBody::Bytes(_))),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn recorder_lets_calls_through() {
    let tmp = TempDir::new().unwrap();
    let helper = zipped_helper(tmp.path(), "network-recorder");
    assert!(helper.mode().is_record());
    assert_eq!(route(&helper, "GET", ITEMS_URL).await, RouteAction::Continue);
}

#[tokio::test]
async fn api_calls_compared_with_recording() {
    let tmp = TempDir::new().unwrap();
    let helper = zipped_helper(tmp.path(), "chromium");
    let monitor = helper.monitor();

    monitor.record_request("GET", ITEMS_URL, Some(200));
    assert!(helper.expect_api_calls(None).is_err());

    monitor.record_request("GET", "http://localhost:3000/svc/api/user", Some(401));
    assert!(helper.expect_api_calls(None).is_ok());

    monitor.record_request("GET", ITEMS_URL, None);
    assert_eq!(helper.api_calls()["GET:/svc/api/items (#2)"], "418");

    helper.clear_api_calls();
    assert!(helper.api_calls().is_empty());
}

#[tokio::test]
async fn auth_mocks_from_fixtures_root() {
    let tmp = TempDir::new().unwrap();
    let mocks = tmp.path().join("utils/mocks");
    std::fs::create_dir_all(&mocks).unwrap();
    std::fs::write(mocks.join("auth.mock.json"), r#"{"authenticated": true}"#).unwrap();
    std::fs::write(mocks.join("auth.settings.mock.json"), r#"{"sso": false}"#).unwrap();

    let options = MockOptions {
        use_auth: true,
        fixtures_root: Some(tmp.path().to_path_buf()),
        ..MockOptions::default()
    };
    let test = TestInfo::new("auth", tmp.path().join("auth.yaml"), "chromium");
    let helper = MockServerHelper::new(test, AppConfig::default(), options).unwrap();
    assert_eq!(helper.registrations().len(), 2);

    assert_eq!(
        route(&helper, "GET", "http://localhost:3000/ekp-user-service/api/auth/check").await,
        RouteAction::Fulfill(MockResponse::json(json!({"authenticated": true})))
    );
}
