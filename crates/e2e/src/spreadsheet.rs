//! Downloaded XLSX comparison against golden files
//!
//! A workbook is a zip of XML parts. Two workbooks are equal when they hold
//! the same parts with the same content, ignoring the creation and
//! modification stamps in the core document properties and the whole of the
//! extended properties part (application name and version).
//!
//! Parts are compared byte for byte, so reordered attributes inside a part
//! count as a difference.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};

const CORE_PROPERTIES: &str = "docProps/core.xml";
const IGNORED_PARTS: &[&str] = &["docProps/app.xml"];

static VOLATILE_STAMPS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<dcterms:(created|modified)\b[^>]*>.*?</dcterms:(created|modified)>")
        .expect("static regex")
});

/// Part-level differences between a downloaded workbook and its golden file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpreadsheetDiff {
    /// Parts only the golden file has
    pub missing: Vec<String>,
    /// Parts only the download has
    pub extra: Vec<String>,
    /// Parts whose content differs
    pub differing: Vec<String>,
}

impl SpreadsheetDiff {
    pub fn is_match(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.differing.is_empty()
    }

    pub fn ensure_match(&self, name: &str) -> E2eResult<()> {
        if self.is_match() {
            return Ok(());
        }
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing [{}]", self.missing.join(", ")));
        }
        if !self.extra.is_empty() {
            parts.push(format!("extra [{}]", self.extra.join(", ")));
        }
        if !self.differing.is_empty() {
            parts.push(format!("changed [{}]", self.differing.join(", ")));
        }
        Err(E2eError::SpreadsheetMismatch {
            name: name.to_string(),
            parts: parts.join("; "),
        })
    }
}

/// Compare `actual` with `golden`. A missing golden file is created from `actual` first.
pub fn compare_xlsx(actual: &Path, golden: &Path) -> E2eResult<SpreadsheetDiff> {
    if !golden.exists() {
        if let Some(parent) = golden.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(actual, golden)?;
        info!("Saved golden workbook {}", golden.display());
    }

    let actual_parts = read_parts(actual)?;
    let golden_parts = read_parts(golden)?;

    let mut diff = SpreadsheetDiff::default();
    for (name, content) in &golden_parts {
        match actual_parts.get(name) {
            None => diff.missing.push(name.clone()),
            Some(other) if other != content => diff.differing.push(name.clone()),
            Some(_) => {}
        }
    }
    diff.extra = actual_parts
        .keys()
        .filter(|name| !golden_parts.contains_key(*name))
        .cloned()
        .collect();

    debug!(
        "Compared {} with {}: {} parts, match={}",
        actual.display(),
        golden.display(),
        golden_parts.len(),
        diff.is_match()
    );
    Ok(diff)
}

fn read_parts(path: &Path) -> E2eResult<BTreeMap<String, Vec<u8>>> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut parts = BTreeMap::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if IGNORED_PARTS.contains(&name.as_str()) {
            continue;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;

        if name == CORE_PROPERTIES {
            content = strip_volatile_stamps(&content);
        }
        parts.insert(name, content);
    }
    Ok(parts)
}

fn strip_volatile_stamps(xml: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(xml);
    VOLATILE_STAMPS.replace_all(&text, "").into_owned().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn core_xml(created: &str) -> String {
        format!(
            r#"<cp:coreProperties><dc:creator>report</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{0}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{0}</dcterms:modified></cp:coreProperties>"#,
            created
        )
    }

    fn workbook(path: &Path, parts: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in parts {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_missing_golden_is_saved() {
        let tmp = TempDir::new().unwrap();
        let actual = tmp.path().join("download.xlsx");
        let golden = tmp.path().join("golden/report.xlsx");
        workbook(&actual, &[("xl/workbook.xml", "<workbook/>")]);

        let diff = compare_xlsx(&actual, &golden).unwrap();
        assert!(diff.is_match());
        assert!(golden.exists());
    }

    #[test]
    fn test_timestamps_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let actual = tmp.path().join("a.xlsx");
        let golden = tmp.path().join("g.xlsx");
        let sheet = ("xl/worksheets/sheet1.xml", "<sheetData><row r=\"1\"/></sheetData>");
        let new_core = core_xml("2026-01-01T00:00:00Z");
        let old_core = core_xml("2024-02-02T10:00:00Z");
        workbook(&actual, &[sheet, (CORE_PROPERTIES, new_core.as_str())]);
        workbook(&golden, &[sheet, (CORE_PROPERTIES, old_core.as_str())]);

        let diff = compare_xlsx(&actual, &golden).unwrap();
        assert!(diff.is_match(), "{:?}", diff);
    }

    #[test]
    fn test_application_properties_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let actual = tmp.path().join("a.xlsx");
        let golden = tmp.path().join("g.xlsx");
        let sheet = ("xl/worksheets/sheet1.xml", "<sheetData/>");
        workbook(&actual, &[sheet, ("docProps/app.xml", "<AppVersion>16.0300</AppVersion>")]);
        workbook(&golden, &[sheet]);

        let diff = compare_xlsx(&actual, &golden).unwrap();
        assert!(diff.is_match(), "{:?}", diff);
    }

    #[test]
    fn test_content_changes_reported() {
        let tmp = TempDir::new().unwrap();
        let actual = tmp.path().join("a.xlsx");
        let golden = tmp.path().join("g.xlsx");
        workbook(
            &actual,
            &[("xl/sharedStrings.xml", "<si>Total</si>"), ("xl/styles.xml", "<styles/>")],
        );
        workbook(
            &golden,
            &[("xl/sharedStrings.xml", "<si>Sum</si>"), ("xl/workbook.xml", "<workbook/>")],
        );

        let diff = compare_xlsx(&actual, &golden).unwrap();
        assert_eq!(diff.missing, vec!["xl/workbook.xml"]);
        assert_eq!(diff.extra, vec!["xl/styles.xml"]);
        assert_eq!(diff.differing, vec!["xl/sharedStrings.xml"]);

        let err = diff.ensure_match("report.xlsx").unwrap_err();
        assert!(err.to_string().contains("changed [xl/sharedStrings.xml]"));
    }
}
