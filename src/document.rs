//! Reading project XML documents and memoising their storage-unit headers.
//!
//! Every document the checker cares about is a `_StorageUnit` element
//! wrapping exactly one root element. Most stages only need that root's tag
//! and the two elements' attributes, so that slice is extracted once per
//! file and cached for the rest of the run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ErrorCode, Fault};

pub const STORAGE_UNIT_TAG: &str = "_StorageUnit";

/// The storage-unit attributes plus the tag and attributes of the single
/// element under it.
#[derive(Debug, Clone)]
pub struct DocumentHeader {
    pub root_tag: String,
    root_attrs: HashMap<String, String>,
    unit_attrs: HashMap<String, String>,
}

impl DocumentHeader {
    pub fn root_attr(&self, name: &str) -> Option<&str> {
        self.root_attrs.get(name).map(String::as_str)
    }

    pub fn unit_attr(&self, name: &str) -> Option<&str> {
        self.unit_attrs.get(name).map(String::as_str)
    }
}

/// Reads a document into memory, faulting with `NotReadable` (or `BadXml`
/// for undecodable bytes).
pub fn read_file(path: &Path) -> Result<String, Fault> {
    fs::read_to_string(path).map_err(|err| {
        let code = if err.kind() == std::io::ErrorKind::InvalidData {
            ErrorCode::BadXml
        } else {
            ErrorCode::NotReadable
        };
        Fault::new(
            code,
            path.display().to_string(),
            format!("while reading {}: {err}", path.display()),
        )
    })
}

/// Parses document text into a DOM, faulting with `BadXml`. The `path` only
/// labels the fault; the text has already been read.
pub fn parse_text<'a>(text: &'a str, path: &Path) -> Result<roxmltree::Document<'a>, Fault> {
    roxmltree::Document::parse(text).map_err(|err| {
        Fault::new(
            ErrorCode::BadXml,
            path.display().to_string(),
            format!("while parsing the xml in {}: {err}", path.display()),
        )
    })
}

/// Last path component as text, for messages that name a file.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads and parses a document far enough to produce its header.
pub fn load_header(path: &Path) -> Result<DocumentHeader, Fault> {
    let text = read_file(path)?;
    header_from_text(&text, path)
}

fn header_from_text(text: &str, path: &Path) -> Result<DocumentHeader, Fault> {
    let document = parse_text(text, path)?;

    let unit = document.root_element();
    if unit.tag_name().name() != STORAGE_UNIT_TAG {
        return Err(Fault::new(
            ErrorCode::NoStorageUnit,
            path.display().to_string(),
            format!(
                "expected a storage unit but found {} at the root of {}",
                unit.tag_name().name(),
                path.display()
            ),
        ));
    }

    let roots: Vec<_> = unit.children().filter(|node| node.is_element()).collect();
    let root = match roots.as_slice() {
        [root] => *root,
        [] => {
            return Err(Fault::new(
                ErrorCode::NoRootOrTopObject,
                path.display().to_string(),
                "expected a single root element under the storage unit, found none",
            ));
        }
        _ => {
            return Err(Fault::new(
                ErrorCode::MultipleRootOrTopObjectsInStorageUnit,
                path.display().to_string(),
                format!(
                    "expected a single root element under the storage unit, found {}",
                    roots.len()
                ),
            ));
        }
    };

    let attrs = |node: roxmltree::Node<'_, '_>| {
        node.attributes()
            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
            .collect()
    };

    Ok(DocumentHeader {
        root_tag: root.tag_name().name().to_string(),
        root_attrs: attrs(root),
        unit_attrs: attrs(unit),
    })
}

/// Per-run memo of document headers. The first read of a path wins, faults
/// included, so every stage sees the same view of a file.
#[derive(Debug, Default)]
pub struct DocumentCache {
    entries: HashMap<PathBuf, Result<DocumentHeader, Fault>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&mut self, path: &Path) -> Result<DocumentHeader, Fault> {
        if let Some(cached) = self.entries.get(path) {
            return cached.clone();
        }
        let loaded = load_header(path);
        self.entries.insert(path.to_path_buf(), loaded.clone());
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    const GOOD: &str = r#"<?xml version="1.0"?>
<_StorageUnit time="Sat Feb 24 16:16:06 2024" release="3.1.0" packageGuid="pkg-1">
  <NMR.NmrProject guid="g1" name="default"/>
</_StorageUnit>"#;

    #[test]
    fn test_good_header() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "good.xml", GOOD);
        let header = load_header(&path).unwrap();
        assert_eq!(header.root_tag, "NMR.NmrProject");
        assert_eq!(header.root_attr("guid"), Some("g1"));
        assert_eq!(header.root_attr("missing"), None);
        assert_eq!(header.unit_attr("release"), Some("3.1.0"));
        assert_eq!(header.unit_attr("packageGuid"), Some("pkg-1"));
    }

    #[test]
    fn test_missing_file_is_not_readable() {
        let dir = TempDir::new().unwrap();
        let fault = load_header(&dir.path().join("absent.xml")).unwrap_err();
        assert_eq!(fault.code, ErrorCode::NotReadable);
        assert!(fault.messages[0].contains("while reading"));
    }

    #[test]
    fn test_unparsable_xml() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.xml", "<_StorageUnit><oops</_StorageUnit>");
        let fault = load_header(&path).unwrap_err();
        assert_eq!(fault.code, ErrorCode::BadXml);
    }

    #[test]
    fn test_wrong_root_is_no_storage_unit() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "plain.xml", "<html><body/></html>");
        let fault = load_header(&path).unwrap_err();
        assert_eq!(fault.code, ErrorCode::NoStorageUnit);
        assert!(fault.messages[0].contains("found html"));
    }

    #[test]
    fn test_empty_storage_unit() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.xml", "<_StorageUnit release='3.1.0'/>");
        let fault = load_header(&path).unwrap_err();
        assert_eq!(fault.code, ErrorCode::NoRootOrTopObject);
    }

    #[test]
    fn test_two_roots_in_storage_unit() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "double.xml",
            "<_StorageUnit><A.B guid='1'/><A.C guid='2'/></_StorageUnit>",
        );
        let fault = load_header(&path).unwrap_err();
        assert_eq!(fault.code, ErrorCode::MultipleRootOrTopObjectsInStorageUnit);
        assert!(fault.messages[0].contains("found 2"));
    }

    #[test]
    fn test_cache_pins_the_first_read() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "cached.xml", GOOD);
        let mut cache = DocumentCache::new();
        assert!(cache.header(&path).is_ok());

        // the file disappearing no longer matters once the header is pinned
        fs::remove_file(&path).unwrap();
        assert!(cache.header(&path).is_ok());
        assert!(load_header(&path).is_err());
    }
}
