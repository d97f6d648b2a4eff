//! Locating top-object files on disk and pairing them with the exo links
//! the root document declares.
//!
//! Project files live under the model root (`ccpnv3`), reference files under
//! a shared reference root. A top-object filename encodes its identity as
//! `<key1>+<key2>+...+<guid>.xml` and the directories above it, relative to
//! its enumeration root, are its containment. The root document's own
//! directory is never enumerated; extra files there are roots, not top
//! objects.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ErrorCode;
use crate::exolink::ExoLinkSet;
use crate::formats::SEPARATOR_FILENAME_CHAR;
use crate::report::RunReport;

/// Fallback listing of reference data files, shipped next to the schema
/// tables for installs without a reference data tree.
pub const REFERENCE_LISTING_FILE: &str = "data_file_names.txt";

/// Which root a matched top-object file was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLocation {
    Project,
    Reference,
}

impl StorageLocation {
    pub fn name(self) -> &'static str {
        match self {
            StorageLocation::Project => "PROJECT",
            StorageLocation::Reference => "REFERENCE",
        }
    }
}

/// Identity a top-object file carries in its name and location.
#[derive(Debug, Clone)]
pub struct ObjectIdentifier {
    pub storage_location: StorageLocation,
    /// Directory segments above the file, relative to its enumeration root.
    pub containment: Vec<String>,
    /// Key segments of the filename, in filename order.
    pub filename_keys: Vec<String>,
    pub guid: String,
    /// Path relative to the enumeration root; absent for placeholders.
    pub path: Option<PathBuf>,
}

impl ObjectIdentifier {
    /// Stands in for an exo link no file was found for.
    pub fn placeholder(guid: impl Into<String>) -> Self {
        ObjectIdentifier {
            storage_location: StorageLocation::Project,
            containment: Vec::new(),
            filename_keys: Vec::new(),
            guid: guid.into(),
            path: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_some()
    }

    fn from_relative_path(path: PathBuf, storage_location: StorageLocation) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut segments: Vec<&str> = file_name.split(SEPARATOR_FILENAME_CHAR).collect();
        let last = segments.pop().unwrap_or("");
        let guid = last.split('.').next().unwrap_or("").to_string();
        let filename_keys = segments.into_iter().map(str::to_string).collect();
        let containment = path
            .parent()
            .map(|parent| {
                parent
                    .components()
                    .map(|part| part.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        ObjectIdentifier {
            storage_location,
            containment,
            filename_keys,
            guid,
            path: Some(path),
        }
    }
}

/// Identifiers for one storage location: walk order preserved, latest entry
/// per guid wins without moving position.
#[derive(Debug, Default)]
pub struct IdentifierSet {
    entries: Vec<ObjectIdentifier>,
    by_guid: HashMap<String, usize>,
}

impl IdentifierSet {
    fn insert(&mut self, identifier: ObjectIdentifier) {
        match self.by_guid.get(&identifier.guid) {
            Some(&index) => self.entries[index] = identifier,
            None => {
                self.by_guid
                    .insert(identifier.guid.clone(), self.entries.len());
                self.entries.push(identifier);
            }
        }
    }

    pub fn get(&self, guid: &str) -> Option<&ObjectIdentifier> {
        self.by_guid.get(guid).map(|&index| &self.entries[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectIdentifier> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// XML files under `root` as paths relative to it, in sorted walk order.
/// `exclude` prunes one subtree.
fn xml_files_under(root: &Path, exclude: Option<&Path>) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| Some(entry.path()) != exclude)
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|extension| extension == "xml")
        })
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect()
}

/// Enumerates the project's own top-object files under the model root,
/// skipping the `memops/Implementation` subtree the root document lives in.
pub fn project_identifiers(model_dir: &Path) -> IdentifierSet {
    let exclude = model_dir.join("memops").join("Implementation");
    let mut set = IdentifierSet::default();
    for path in xml_files_under(model_dir, Some(&exclude)) {
        set.insert(ObjectIdentifier::from_relative_path(
            path,
            StorageLocation::Project,
        ));
    }
    set
}

/// Enumerates the shared reference data files. Falls back to the cached
/// listing next to the schema tables when no reference tree is installed;
/// with neither present, reference objects simply won't be matched.
pub fn reference_identifiers(
    reference_dir: &Path,
    schema_dir: &Path,
    report: &mut RunReport,
) -> IdentifierSet {
    let mut set = IdentifierSet::default();
    if reference_dir.is_dir() {
        for path in xml_files_under(reference_dir, None) {
            set.insert(ObjectIdentifier::from_relative_path(
                path,
                StorageLocation::Reference,
            ));
        }
        return set;
    }

    let listing = schema_dir.join(REFERENCE_LISTING_FILE);
    match fs::read_to_string(&listing) {
        Ok(text) => {
            report.note("using the cached reference data file listing in stand alone mode");
            for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
                set.insert(ObjectIdentifier::from_relative_path(
                    PathBuf::from(line),
                    StorageLocation::Reference,
                ));
            }
        }
        Err(_) => {
            report.note(
                "no reference data root or cached file listing found, reference objects will not be matched",
            );
        }
    }
    set
}

/// Pairs every exo link with its on-disk identifier, in link order, with
/// placeholders for links no file was found for. A guid present in both
/// roots matches the reference copy.
pub fn match_links(
    links: &ExoLinkSet,
    project: &IdentifierSet,
    reference: &IdentifierSet,
) -> Vec<ObjectIdentifier> {
    links
        .iter()
        .map(|link| {
            reference
                .get(&link.guid)
                .or_else(|| project.get(&link.guid))
                .cloned()
                .unwrap_or_else(|| ObjectIdentifier::placeholder(&link.guid))
        })
        .collect()
}

/// Project files whose guid no exo link declares, in walk order.
pub fn detached_files(project: &IdentifierSet, links: &ExoLinkSet) -> Vec<ObjectIdentifier> {
    project
        .iter()
        .filter(|identifier| !links.contains_guid(&identifier.guid))
        .cloned()
        .collect()
}

/// Flags directories under the model root that hold no XML files anywhere
/// below them. Such containers are usually left behind by hand-deleted
/// objects.
pub fn note_empty_containers(model_dir: &Path, report: &mut RunReport) {
    let mut empty: Vec<PathBuf> = Vec::new();
    collect_empty_directories(model_dir, &mut empty);
    if empty.is_empty() {
        return;
    }
    empty.sort();

    report.note(format!(
        "empty directories [{}] which may be orphaned containers found and listed below [warning]",
        empty.len(),
    ));
    for (i, dir) in empty.iter().enumerate() {
        let number = i + 1;
        report.warning(
            ErrorCode::WarningEmptyContainer,
            dir.display().to_string(),
            format!("possibly empty_container found at {}", dir.display()),
        );
        report.note_plain(format!("{number:>3}. {} [warning]", dir.display()));
    }
}

/// A directory is effectively empty when it holds no XML files and every
/// subdirectory is itself effectively empty. Pushes every empty directory
/// below `dir` and returns the verdict for `dir` itself.
fn collect_empty_directories(dir: &Path, empty: &mut Vec<PathBuf>) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    let mut holds_xml = false;
    let mut subdirs_empty = true;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if !collect_empty_directories(&path, empty) {
                subdirs_empty = false;
            }
        } else if path.extension().is_some_and(|extension| extension == "xml") {
            holds_xml = true;
        }
    }

    let is_empty = !holds_xml && subdirs_empty;
    if is_empty {
        empty.push(dir.to_path_buf());
    }
    is_empty
}

/// Lists project files no exo link points at and records a warning for each.
pub fn note_detached_files(detached: &[ObjectIdentifier], report: &mut RunReport) {
    if detached.is_empty() {
        return;
    }
    report.note(format!(
        "there are {} files in the project directory that are not linked to a file by an exo link [warning]",
        detached.len(),
    ));
    for (i, identifier) in detached.iter().enumerate() {
        let number = i + 1;
        let path = identifier.path.as_deref().unwrap_or(Path::new(""));
        report.warning(
            ErrorCode::WarningDetachedFiles,
            path.display().to_string(),
            format!(
                "the file {} is not linked to a file by an exo link",
                path.display(),
            ),
        );
        report.note_plain(format!("{number:>3}. {} [warning]", path.display()));
    }
}

/// Counts the links a file was found for and records an error per missing
/// one.
pub fn note_missing_links(
    links: &ExoLinkSet,
    matched: &[ObjectIdentifier],
    report: &mut RunReport,
) {
    let found = matched.iter().filter(|m| m.exists()).count();
    report.note(format!(
        "found {found} out of {} top object files exo linked by the project",
        links.len(),
    ));

    let missing: Vec<&ObjectIdentifier> = matched.iter().filter(|m| !m.exists()).collect();
    if missing.is_empty() {
        return;
    }
    report.note(format!(
        "there are {} missing top object files the list of exo links for the missing files are:",
        missing.len(),
    ));
    for (i, identifier) in missing.iter().enumerate() {
        let number = i + 1;
        let (short_name, keys) = match links.get(&identifier.guid) {
            Some(link) => (link.short_name(), link.keys_display()),
            None => ("*unknown-package*.*unknown-class*".to_string(), "{}".to_string()),
        };
        report.note_plain(format!(
            "{number}. {} {short_name} [keys: {keys}]",
            identifier.guid,
        ));
        report.error(
            ErrorCode::ExoLinkedFileMissing,
            identifier.guid.clone(),
            format!("missing top object file for exo link guid {}", identifier.guid),
        );
    }
}

/// Lists where each exo-linked file was found (or should have been).
pub fn note_expected_paths(
    links: &ExoLinkSet,
    matched: &[ObjectIdentifier],
    report: &mut RunReport,
) {
    report.note("expected top object paths are:");
    for (i, identifier) in matched.iter().enumerate() {
        let number = i + 1;
        let short_name = links
            .get(&identifier.guid)
            .map(|link| link.short_name())
            .unwrap_or_else(|| "*unknown-package*.*unknown-class*".to_string());
        let location = identifier.storage_location.name();
        match &identifier.path {
            Some(path) => report.note_plain(format!(
                "{number:>3}. {} {short_name} - [{location}] {}",
                identifier.guid,
                path.display(),
            )),
            None => report.note_plain(format!(
                "{number:>3}. {} {short_name} - [{location}] *file not found*",
                identifier.guid,
            )),
        }
    }
}
