//! Line-oriented project control file (`control.eo`).
//! 專案控制檔的讀寫。
//!
//! Line one is the literal marker `project_pages`; each further line is a
//! `key=value` pair. Every key is parsed on its own and falls back to its
//! default when malformed, so one bad field never discards the others.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use projectpages_core::NewDocument;
use thiserror::Error;

use crate::util::write_atomic;

/// First line of every control file.
/// 控制檔第一行的標記。
pub const CONTROL_MARKER: &str = "project_pages";

const KEY_BASENAME: &str = "doc_basename";
const KEY_WIDTH: &str = "doc_width";
const KEY_HEIGHT: &str = "doc_height";
const KEY_SWAP: &str = "doc_swap";
const KEY_COLORSPACE: &str = "doc_colorspace";
const KEY_BITDEPTH: &str = "doc_bitdepth";
const KEY_DPI: &str = "doc_dpi";
const KEY_GUIDES_HORIZONTAL: &str = "doc_gh";
const KEY_GUIDES_VERTICAL: &str = "doc_gv";

const ALL_KEYS: [&str; 9] = [
    KEY_BASENAME,
    KEY_WIDTH,
    KEY_HEIGHT,
    KEY_SWAP,
    KEY_COLORSPACE,
    KEY_BITDEPTH,
    KEY_DPI,
    KEY_GUIDES_HORIZONTAL,
    KEY_GUIDES_VERTICAL,
];

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("control field `{key}` cannot be stored: {reason}")]
    InvalidField { key: &'static str, reason: String },
}

/// Document template and guide presets stored with the project.
/// 專案保存的文件樣板與參考線設定。
#[derive(Debug, Clone, PartialEq)]
pub struct ControlDocument {
    pub basename: String,
    pub width: u32,
    pub height: u32,
    /// Swap width and height when creating documents.
    pub swap: bool,
    pub colorspace: String,
    pub bitdepth: String,
    pub dpi: u32,
    pub guides_horizontal: Vec<f64>,
    pub guides_vertical: Vec<f64>,
}

impl Default for ControlDocument {
    fn default() -> Self {
        Self {
            basename: "page".to_string(),
            width: 1920,
            height: 1080,
            swap: false,
            colorspace: "RGBA".to_string(),
            bitdepth: "U8".to_string(),
            dpi: 300,
            guides_horizontal: Vec::new(),
            guides_vertical: Vec::new(),
        }
    }
}

impl ControlDocument {
    /// Editor template for a new page named `name`.
    /// 依樣板建立新文件的參數。
    pub fn new_document(&self, name: &str) -> NewDocument {
        let (width, height) = if self.swap {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        };
        NewDocument {
            name: name.to_string(),
            width,
            height,
            colorspace: self.colorspace.clone(),
            bitdepth: self.bitdepth.clone(),
            dpi: self.dpi,
        }
    }

    /// Checks that every field survives a save/load cycle unchanged.
    ///
    /// Text must be non-empty, carry no surrounding whitespace and no control
    /// characters; sizes and DPI must be positive; guides must be finite.
    /// 檢查每個欄位都能原樣寫入並讀回。
    pub fn check(&self) -> Result<(), ControlError> {
        for (key, value) in [
            (KEY_BASENAME, &self.basename),
            (KEY_COLORSPACE, &self.colorspace),
            (KEY_BITDEPTH, &self.bitdepth),
        ] {
            check_text(key, value)?;
        }
        for (key, value) in [
            (KEY_WIDTH, self.width),
            (KEY_HEIGHT, self.height),
            (KEY_DPI, self.dpi),
        ] {
            if value == 0 {
                return Err(invalid(key, "must be greater than zero"));
            }
        }
        for (key, guides) in [
            (KEY_GUIDES_HORIZONTAL, &self.guides_horizontal),
            (KEY_GUIDES_VERTICAL, &self.guides_vertical),
        ] {
            if let Some(bad) = guides.iter().find(|v| !v.is_finite()) {
                return Err(invalid(key, &format!("guide {bad} is not finite")));
            }
        }
        Ok(())
    }

    /// Serializes into the control-file text form.
    pub fn to_control_text(&self) -> String {
        let mut out = String::new();
        out.push_str(CONTROL_MARKER);
        out.push('\n');
        let _ = writeln!(out, "{KEY_BASENAME}={}", self.basename);
        let _ = writeln!(out, "{KEY_WIDTH}={}", self.width);
        let _ = writeln!(out, "{KEY_HEIGHT}={}", self.height);
        let _ = writeln!(out, "{KEY_SWAP}={}", self.swap);
        let _ = writeln!(out, "{KEY_COLORSPACE}={}", self.colorspace);
        let _ = writeln!(out, "{KEY_BITDEPTH}={}", self.bitdepth);
        let _ = writeln!(out, "{KEY_DPI}={}", self.dpi);
        let _ = writeln!(
            out,
            "{KEY_GUIDES_HORIZONTAL}={}",
            format_list(&self.guides_horizontal)
        );
        let _ = writeln!(
            out,
            "{KEY_GUIDES_VERTICAL}={}",
            format_list(&self.guides_vertical)
        );
        out
    }
}

/// A key whose stored value could not be parsed and was replaced by its default.
/// 無法解析而改用預設值的欄位。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlIssue {
    pub key: String,
    pub raw: String,
}

/// Result of parsing control-file text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedControl {
    pub document: ControlDocument,
    /// `false` when the marker line is absent or different; the document is then all defaults.
    pub marker_found: bool,
    pub issues: Vec<ControlIssue>,
    pub missing_keys: Vec<&'static str>,
}

impl ParsedControl {
    /// Whether the file should be rewritten with the recovered document.
    pub fn needs_rewrite(&self) -> bool {
        self.marker_found && (!self.issues.is_empty() || !self.missing_keys.is_empty())
    }
}

/// Parses control-file text, recovering each malformed key independently.
/// 解析控制檔；每個欄位獨立回復預設值。
pub fn parse_control(text: &str) -> ParsedControl {
    let mut lines = text.lines();
    let marker_found = lines
        .next()
        .map(|line| line.trim_start_matches('\u{feff}').trim() == CONTROL_MARKER)
        .unwrap_or(false);
    let mut document = ControlDocument::default();
    if !marker_found {
        return ParsedControl {
            document,
            marker_found,
            issues: Vec::new(),
            missing_keys: Vec::new(),
        };
    }

    let mut issues = Vec::new();
    let mut seen: Vec<&'static str> = Vec::new();
    for line in lines {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        let Some(known) = ALL_KEYS.iter().copied().find(|candidate| *candidate == key) else {
            continue;
        };
        seen.push(known);
        let applied = match known {
            KEY_BASENAME => parse_text(value).map(|v| document.basename = v),
            KEY_WIDTH => parse_dimension(value).map(|v| document.width = v),
            KEY_HEIGHT => parse_dimension(value).map(|v| document.height = v),
            KEY_SWAP => parse_bool(value).map(|v| document.swap = v),
            KEY_COLORSPACE => parse_text(value).map(|v| document.colorspace = v),
            KEY_BITDEPTH => parse_text(value).map(|v| document.bitdepth = v),
            KEY_DPI => parse_dimension(value).map(|v| document.dpi = v),
            KEY_GUIDES_HORIZONTAL => parse_list(value).map(|v| document.guides_horizontal = v),
            KEY_GUIDES_VERTICAL => parse_list(value).map(|v| document.guides_vertical = v),
            _ => Some(()),
        };
        if applied.is_none() {
            issues.push(ControlIssue {
                key: known.to_string(),
                raw: value.to_string(),
            });
        }
    }

    let missing_keys = ALL_KEYS
        .iter()
        .copied()
        .filter(|key| !seen.contains(key))
        .collect();
    ParsedControl {
        document,
        marker_found,
        issues,
        missing_keys,
    }
}

fn invalid(key: &'static str, reason: &str) -> ControlError {
    ControlError::InvalidField {
        key,
        reason: reason.to_string(),
    }
}

fn check_text(key: &'static str, value: &str) -> Result<(), ControlError> {
    if value.is_empty() {
        return Err(invalid(key, "must not be empty"));
    }
    if value.trim() != value {
        return Err(invalid(key, "must not start or end with whitespace"));
    }
    if value.chars().any(char::is_control) {
        return Err(invalid(key, "must not contain control characters"));
    }
    Ok(())
}

fn parse_text(value: &str) -> Option<String> {
    (!value.is_empty() && !value.chars().any(char::is_control)).then(|| value.to_string())
}

fn parse_dimension(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|v| *v > 0)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "True" | "TRUE" | "1" => Some(true),
        "false" | "False" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

fn parse_list(value: &str) -> Option<Vec<f64>> {
    let inner = value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(value)
        .trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|item| item.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect()
}

fn format_list(values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

/// Owns the control file of the active project and its in-memory document.
/// 持有作用中專案的控制檔與記憶體中的文件。
#[derive(Debug)]
pub struct ControlStore {
    path: PathBuf,
    document: ControlDocument,
    issues: Vec<ControlIssue>,
}

impl ControlStore {
    /// Loads `path`; a missing or foreign file yields defaults.
    ///
    /// Recovered keys and legacy marker-only files are written back immediately.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ControlError> {
        let path = path.as_ref().to_path_buf();
        let text = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(ControlError::Io { path, source }),
        };

        let parsed = parse_control(&text);
        if !parsed.marker_found {
            warn!(
                "event=control_load module=project status=foreign path={}",
                path.display()
            );
        }
        for issue in &parsed.issues {
            warn!(
                "event=control_load module=project status=recovered key={} raw={}",
                issue.key, issue.raw
            );
        }
        let needs_rewrite = parsed.needs_rewrite();
        let store = Self {
            path,
            document: parsed.document,
            issues: parsed.issues,
        };
        if needs_rewrite {
            store.save()?;
        }
        Ok(store)
    }

    pub fn new(path: impl Into<PathBuf>, document: ControlDocument) -> Self {
        Self {
            path: path.into(),
            document,
            issues: Vec::new(),
        }
    }

    pub fn document(&self) -> &ControlDocument {
        &self.document
    }

    /// Keys recovered to defaults during the last load.
    pub fn issues(&self) -> &[ControlIssue] {
        &self.issues
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `op` to the document and saves immediately.
    ///
    /// A document failing [`ControlDocument::check`] is rejected and the
    /// previous one is kept.
    /// 修改文件後立即寫回；不合法的修改會被拒絕。
    pub fn update<F>(&mut self, op: F) -> Result<(), ControlError>
    where
        F: FnOnce(&mut ControlDocument),
    {
        let mut candidate = self.document.clone();
        op(&mut candidate);
        candidate.check()?;
        self.document = candidate;
        self.save()
    }

    pub fn save(&self) -> Result<(), ControlError> {
        self.document.check()?;
        write_atomic(&self.path, self.document.to_control_text().as_bytes()).map_err(|source| {
            ControlError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> ControlDocument {
        ControlDocument {
            basename: "scene".into(),
            width: 2480,
            height: 3508,
            swap: true,
            colorspace: "CMYKA".into(),
            bitdepth: "U16".into(),
            dpi: 600,
            guides_horizontal: vec![0.5, 120.25, 1e-3],
            guides_vertical: vec![],
        }
    }

    #[test]
    fn save_then_load_reproduces_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("control.eo");
        for document in [ControlDocument::default(), sample()] {
            ControlStore::new(&path, document.clone()).save().unwrap();
            let loaded = ControlStore::load(&path).unwrap();
            assert_eq!(loaded.document(), &document);
            assert!(loaded.issues().is_empty());
        }
    }

    #[test]
    fn save_then_load_reproduces_edge_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("control.eo");
        let documents = [
            ControlDocument {
                basename: "cover page".into(),
                width: 1,
                height: u32::MAX,
                dpi: 1,
                ..ControlDocument::default()
            },
            ControlDocument {
                basename: "a=b".into(),
                colorspace: "[x]".into(),
                guides_horizontal: vec![-0.5, 1e300, f64::MIN_POSITIVE, 0.1 + 0.2],
                guides_vertical: vec![f64::MAX, -7.0],
                ..ControlDocument::default()
            },
        ];
        for document in documents {
            ControlStore::new(&path, document.clone()).save().unwrap();
            let loaded = ControlStore::load(&path).unwrap();
            assert_eq!(loaded.document(), &document);
            assert!(loaded.issues().is_empty());
        }
    }

    #[test]
    fn unstorable_values_are_rejected_before_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("control.eo");
        let mut store = ControlStore::new(&path, ControlDocument::default());
        store.save().unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let edits: [fn(&mut ControlDocument); 7] = [
            |doc| doc.basename = " cover ".into(),
            |doc| doc.basename = "a\ndoc_width=7".into(),
            |doc| doc.colorspace = String::new(),
            |doc| doc.bitdepth = "U8\r".into(),
            |doc| doc.width = 0,
            |doc| doc.dpi = 0,
            |doc| doc.guides_vertical = vec![1.0, f64::NAN],
        ];
        for edit in edits {
            let err = store.update(edit).unwrap_err();
            assert!(matches!(err, ControlError::InvalidField { .. }), "{err}");
            assert_eq!(store.document(), &ControlDocument::default());
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), before);

        let document = ControlDocument {
            height: 0,
            ..ControlDocument::default()
        };
        assert!(matches!(
            ControlStore::new(&path, document).save(),
            Err(ControlError::InvalidField { key: "doc_height", .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn one_bad_field_keeps_the_rest() {
        let text = "project_pages\ndoc_basename=cover\ndoc_width=wide\ndoc_height=900\ndoc_gh=[1, x]\n";
        let parsed = parse_control(text);
        assert_eq!(parsed.document.basename, "cover");
        assert_eq!(parsed.document.width, 1920);
        assert_eq!(parsed.document.height, 900);
        assert!(parsed.document.guides_horizontal.is_empty());
        let keys: Vec<_> = parsed.issues.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["doc_width", "doc_gh"]);
        assert!(parsed.needs_rewrite());
    }

    #[test]
    fn foreign_file_is_ignored() {
        let parsed = parse_control("something_else\ndoc_width=10\n");
        assert!(!parsed.marker_found);
        assert_eq!(parsed.document, ControlDocument::default());
        assert!(!parsed.needs_rewrite());
    }

    #[test]
    fn legacy_spellings_are_accepted() {
        let text = "project_pages\ndoc_swap=True\ndoc_gh=10.5,20\ndoc_gv=[]\n";
        let parsed = parse_control(text);
        assert!(parsed.document.swap);
        assert_eq!(parsed.document.guides_horizontal, vec![10.5, 20.0]);
        assert!(parsed.document.guides_vertical.is_empty());
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn control_characters_in_text_fall_back() {
        let parsed = parse_control("project_pages\ndoc_colorspace=RG\tBA\n");
        assert_eq!(parsed.document.colorspace, "RGBA");
        assert_eq!(parsed.issues.len(), 1);
        assert!(parsed.document.check().is_ok());
    }

    #[test]
    fn non_finite_guides_are_rejected() {
        let parsed = parse_control("project_pages\ndoc_gv=[inf, 3]\n");
        assert!(parsed.document.guides_vertical.is_empty());
        assert_eq!(parsed.issues.len(), 1);
    }

    #[test]
    fn marker_only_file_is_migrated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("control.eo");
        fs::write(&path, "project_pages").unwrap();

        let store = ControlStore::load(&path).unwrap();
        assert_eq!(store.document(), &ControlDocument::default());
        let rewritten = fs::read_to_string(&path).unwrap();
        for key in ALL_KEYS {
            assert!(rewritten.contains(&format!("{key}=")), "missing {key}");
        }
    }

    #[test]
    fn update_persists_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("control.eo");
        let mut store = ControlStore::new(&path, ControlDocument::default());
        store.update(|doc| doc.dpi = 72).unwrap();
        assert_eq!(ControlStore::load(&path).unwrap().document().dpi, 72);
    }

    #[test]
    fn swap_exchanges_template_dimensions() {
        let template = sample().new_document("scene_0001");
        assert_eq!((template.width, template.height), (3508, 2480));
        assert_eq!(template.name, "scene_0001");
    }
}
