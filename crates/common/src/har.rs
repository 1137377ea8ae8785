//! HTTP archive (HAR) recordings
//!
//! Recordings live next to the test file under
//! `{test file}-snapshots/{title}/har/`. They are either a plain directory
//! (`har` plus body side files) or a single zip archive whose main entry is
//! `har.har`.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::types::TestInfo;

/// Default file stem of a recording
pub const DEFAULT_HAR_NAME: &str = "har";

/// Name of the main recording entry inside a zipped HAR
pub const ZIPPED_HAR_ENTRY: &str = "har.har";

/// Status reported for requests that never produced a response
pub const NO_RESPONSE_STATUS: u16 = 418;

/// Parsed HAR document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Har {
    #[serde(default)]
    pub log: HarLog,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarLog {
    #[serde(default)]
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarEntry {
    pub request: HarRequest,
    pub response: HarResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarRequest {
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarResponse {
    pub status: u16,
    #[serde(default)]
    pub content: HarContent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    /// Side file holding the body, relative to the recording directory
    #[serde(rename = "_file", default)]
    pub file: Option<String>,
}

impl HarContent {
    /// Decoded inline body, if the recording kept it inline
    pub fn body(&self) -> Option<Vec<u8>> {
        let text = self.text.as_ref()?;
        if self.encoding.as_deref() == Some("base64") {
            base64::engine::general_purpose::STANDARD.decode(text).ok()
        } else {
            Some(text.clone().into_bytes())
        }
    }
}

impl Har {
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(Error::from)
    }

    /// First recorded exchange for the given method and absolute URL
    pub fn find(&self, method: &str, url: &str) -> Option<&HarEntry> {
        self.log
            .entries
            .iter()
            .find(|e| e.request.method.eq_ignore_ascii_case(method) && e.request.url == url)
    }

    /// Recorded calls keyed as `METHOD:/path`, with `app_url` stripped
    ///
    /// Repeated calls get a ` (#n)` suffix starting at 2, in recording order.
    pub fn api_calls(&self, app_url: &str) -> BTreeMap<String, String> {
        let mut calls = BTreeMap::new();
        for entry in &self.log.entries {
            let key = format!("{}:{}", entry.request.method, entry.request.url).replacen(app_url, "", 1);
            insert_numbered(&mut calls, key, entry.response.status.to_string());
        }
        calls
    }
}

/// Insert `value` under `key`, or under `key (#n)` for the first free n >= 2
pub fn insert_numbered(map: &mut BTreeMap<String, String>, key: String, value: String) {
    let mut candidate = key.clone();
    let mut idx = 1;
    while map.contains_key(&candidate) {
        idx += 1;
        candidate = format!("{} (#{})", key, idx);
    }
    map.insert(candidate, value);
}

/// Where a test's recording is stored
#[derive(Debug, Clone)]
pub struct HarLocation {
    pub har_name: Option<String>,
    pub zipped: bool,
}

impl HarLocation {
    pub fn new(har_name: Option<String>, zipped: bool) -> Self {
        Self { har_name, zipped }
    }

    /// Path of the recording for `test`
    pub fn har_path(&self, test: &TestInfo) -> PathBuf {
        let snapshots = format!("{}-snapshots", test.file.to_string_lossy());
        let name = self.har_name.as_deref().unwrap_or(DEFAULT_HAR_NAME);
        let file = if self.zipped {
            format!("{}.zip", name)
        } else {
            name.to_string()
        };
        PathBuf::from(snapshots)
            .join(test.title.replace(' ', "-"))
            .join("har")
            .join(file)
    }

    /// Path of a side file stored next to the recording
    pub fn entry_path(&self, test: &TestInfo, file_name: &str) -> PathBuf {
        let har_path = self.har_path(test);
        har_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(file_name)
    }

    /// Name of the main recording file (inside the zip, or next to it)
    pub fn main_entry(&self) -> &str {
        if self.zipped {
            ZIPPED_HAR_ENTRY
        } else {
            self.har_name.as_deref().unwrap_or(DEFAULT_HAR_NAME)
        }
    }
}

/// Read one entry of a zip archive as text; `None` when the entry is absent
pub fn read_zip_entry(zip_path: &Path, file_name: &str) -> Result<Option<String>> {
    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut entry = match archive.by_name(file_name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(Some(content))
}

/// Memoised access to the files of one test's recording
///
/// Every file is read at most once; read failures are logged and cached as
/// absent.
pub struct HarStore {
    har_path: PathBuf,
    side_dir: PathBuf,
    location: HarLocation,
    files: Mutex<HashMap<String, Option<Arc<String>>>>,
}

impl HarStore {
    pub fn new(test: &TestInfo, location: HarLocation) -> Self {
        let har_path = location.har_path(test);
        let side_dir = har_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            har_path,
            side_dir,
            location,
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn har_path(&self) -> &Path {
        &self.har_path
    }

    pub fn location(&self) -> &HarLocation {
        &self.location
    }

    /// Contents of `file_name` from the recording, if the recording exists and holds it
    pub fn file(&self, file_name: &str) -> Option<Arc<String>> {
        self.files
            .lock()
            .entry(file_name.to_string())
            .or_insert_with(|| self.load(file_name).map(Arc::new))
            .clone()
    }

    fn load(&self, file_name: &str) -> Option<String> {
        if !self.har_path.exists() {
            debug!("No recording at {}", self.har_path.display());
            return None;
        }

        let result = if self.location.zipped {
            read_zip_entry(&self.har_path, file_name)
        } else {
            let path = self.side_dir.join(file_name);
            std::fs::read_to_string(&path).map(Some).map_err(Error::from)
        };

        match result {
            Ok(content) => content.filter(|c| !c.is_empty()),
            Err(e) => {
                error!("Failed to read '{}' from {}: {}", file_name, self.har_path.display(), e);
                None
            }
        }
    }

    /// Parsed main recording
    pub fn har(&self) -> Result<Option<Har>> {
        let entry = self.location.main_entry().to_string();
        match self.file(&entry) {
            Some(content) => Har::parse(&content)
                .map(Some)
                .map_err(|e| Error::InvalidHar {
                    path: self.har_path.display().to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }
}
