//! The project checker itself: one `run` wires every stage together and
//! folds whatever happens into a `RunReport`.
//!
//! Stages run in a fixed order. Gate failures (missing directories, no
//! usable root document, unreadable schema tables) stop the run early with
//! the stop fault recorded as the last error; everything after the gates
//! accumulates findings and keeps going.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;

use crate::document::{self, DocumentCache};
use crate::error::{CheckError, ErrorCode, Fault, Result};
use crate::exolink::{self, MEMOPS_ROOT_TAG};
use crate::formats;
use crate::keycheck;
use crate::matcher;
use crate::report::RunReport;
use crate::schema::SchemaIndex;
use crate::structure::StructureValidator;

/// Suffix a ccpn project directory is expected to carry.
pub const PROJECT_SUFFIX: &str = ".ccpn";
/// Directory under the project root the model tree lives in.
pub const MODEL_DIR_NAME: &str = "ccpnv3";

/// Overrides the schema-table directory.
pub const MODEL_INFO_DIR_VAR: &str = "CCPN_MODEL_INFO_DIR";
/// Overrides the reference data root.
pub const REFERENCE_DATA_DIR_VAR: &str = "CCPN_REFERENCE_DATA_DIR";

/// Where a run finds its supporting data and how it grades warnings.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Directory holding the versioned schema tables.
    pub schema_dir: PathBuf,
    /// Root of the shared reference data tree.
    pub reference_dir: PathBuf,
    /// Promote warnings to errors at append time.
    pub warnings_are_errors: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        let app_data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(env!("CARGO_PKG_NAME"));
        let schema_dir = env::var_os(MODEL_INFO_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| app_data.join("model_info"));
        let reference_dir = env::var_os(REFERENCE_DATA_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| app_data.join(MODEL_DIR_NAME));
        CheckOptions {
            schema_dir,
            reference_dir,
            warnings_are_errors: false,
        }
    }
}

/// Checks one project tree per call to [`ProjectChecker::run`].
pub struct ProjectChecker {
    options: CheckOptions,
}

impl ProjectChecker {
    pub fn new(options: CheckOptions) -> Self {
        ProjectChecker { options }
    }

    /// Runs every stage over the project at `project_path`. The path is
    /// reported exactly as given; it is never canonicalised. Defects in the
    /// checker itself are folded into the report instead of escaping.
    pub fn run(&self, project_path: &Path) -> RunReport {
        let mut report = RunReport::new(self.options.warnings_are_errors);
        match self.run_stages(project_path, &mut report) {
            Ok(()) => {}
            Err(CheckError::Stop(fault)) => report.record_stop(fault),
            Err(CheckError::Internal(err)) => {
                report.error(
                    ErrorCode::InternalError,
                    env!("CARGO_PKG_NAME"),
                    format!("{err:?}\n\nthere was an internal error see the details above"),
                );
                report.internal_error = true;
                report.stop_error = true;
            }
        }
        report.finish();
        report
    }

    fn run_stages(&self, project_path: &Path, report: &mut RunReport) -> Result<()> {
        report.note(format!("target {}", project_path.display()));

        let project_name = project_name(project_path);
        report.note(format!("project_name appears to be... {project_name}"));

        let directory_name = last_components(project_path, 1);
        check_name_character_set(
            &directory_name,
            "ccpn project directory name",
            &[PROJECT_SUFFIX],
            report,
        );

        readable_directory(project_path)?;

        if directory_name.ends_with(PROJECT_SUFFIX) {
            report.note(format!(
                "the directory {directory_name} has the correct suffix"
            ));
        } else {
            report.note(format!(
                "ccpn project directories should have the suffix {PROJECT_SUFFIX} the directory {directory_name} doesn't"
            ));
        }

        let model_dir = project_path.join(MODEL_DIR_NAME);
        readable_directory(&model_dir)?;

        let implementation_dir = model_dir.join("memops").join("Implementation");
        readable_directory(&implementation_dir)?;
        report.note(format!(
            "found an implementation directory {}",
            last_components(&implementation_dir, 4)
        ));

        let mut cache = DocumentCache::new();
        let root_path =
            self.locate_root_document(&implementation_dir, &project_name, &mut cache, report)?;
        report.note(format!(
            "ccpn project memops root file found in {}",
            last_components(&root_path, 5)
        ));

        let root_file_name = last_components(&root_path, 1);
        check_name_character_set(&root_file_name, "ccpn root file name", &[".xml"], report);

        // The root document is the one file read in full; every other file
        // only has its header examined.
        let text = document::read_file(&root_path)?;
        let doc = document::parse_text(&text, &root_path)?;
        exolink::note_root_metadata(&doc, &root_path, report)?;
        let model_version = report
            .model_version
            .clone()
            .ok_or_else(|| anyhow!("model version not set, can't proceed further"))?;

        let schema =
            SchemaIndex::load(&self.options.schema_dir, &model_version).map_err(|err| {
                CheckError::stop(
                    ErrorCode::SchemaLoadFailed,
                    self.options.schema_dir.display().to_string(),
                    format!(
                        "could not load the model schema tables for version {model_version}: {err}"
                    ),
                )
            })?;

        let links = exolink::extract(&doc, &root_path, &schema, report);
        exolink::check_key_character_set(&links, &root_path, report);
        if links.is_empty() {
            return Err(CheckError::stop(
                ErrorCode::NoExoLinksFound,
                root_path.display().to_string(),
                format!(
                    "no exo links were found in the memops root file {}",
                    root_path.display()
                ),
            ));
        }

        let project = matcher::project_identifiers(&model_dir);
        let reference = matcher::reference_identifiers(
            &self.options.reference_dir,
            &self.options.schema_dir,
            report,
        );
        let matched = matcher::match_links(&links, &project, &reference);
        let detached = matcher::detached_files(&project, &links);

        matcher::note_empty_containers(&model_dir, report);
        matcher::note_detached_files(&detached, report);
        matcher::note_missing_links(&links, &matched, report);
        matcher::note_expected_paths(&links, &matched, report);

        let validator = StructureValidator::new(&model_dir, &links, &schema, &model_version);
        validator.cross_check_guids(&matched, &mut cache, report);
        validator.check_contents(&matched, true, &mut cache, report);
        keycheck::check_keys(&matched, &links, &model_dir, report);
        if !detached.is_empty() {
            validator.check_contents(&detached, false, &mut cache, report);
        }

        Ok(())
    }

    /// Picks the memops root document out of the implementation directory.
    ///
    /// Every `*.xml` child is a candidate, in sorted order. A candidate
    /// qualifies when it parses and its root element is `IMPL.MemopsRoot`;
    /// a qualifying file named after the project wins outright, a single
    /// qualifying file wins with a renamed-project note, anything else
    /// stops the run with the parse messages collected along the way.
    fn locate_root_document(
        &self,
        implementation_dir: &Path,
        project_name: &str,
        cache: &mut DocumentCache,
        report: &mut RunReport,
    ) -> Result<PathBuf> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(implementation_dir).map_err(anyhow::Error::from)? {
            let entry = entry.map_err(anyhow::Error::from)?;
            let path = entry.path();
            if path.extension().is_some_and(|extension| extension == "xml") {
                candidates.push(path);
            }
        }
        candidates.sort();

        if candidates.is_empty() {
            return Err(Fault::with_messages(
                ErrorCode::NoMemopsRootFiles,
                implementation_dir.display().to_string(),
                vec![
                    format!(
                        "no xml files which could be memops roots were found in {}",
                        implementation_dir.display()
                    ),
                    format!(
                        "with the following extra messages being reported no root xml file found in {}",
                        implementation_dir.display()
                    ),
                ],
            )
            .into());
        }

        let expected_name = format!("{project_name}.xml");
        let several = candidates.len() > 1;
        if several {
            let names: Vec<String> = candidates
                .iter()
                .map(|path| last_components(path, 1))
                .collect();
            let causes: Vec<String> = candidates
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            let detail = format!(
                "more than one possible memops root file found in the implementation directory\n{}",
                names.join("\n"),
            );
            report.warning(
                ErrorCode::MultipleMemopsRootFiles,
                causes.join(", "),
                detail.clone(),
            );
            report.note(format!("{detail}\n[warning]"));
        }

        for candidate in &candidates {
            let name = last_components(candidate, 1);
            if name == expected_name {
                report.note(format!(
                    "the path {} is a possible memops root [name matches project]",
                    candidate.display()
                ));
            } else if several {
                report.warning(
                    ErrorCode::MultipleMemopsRootFiles,
                    implementation_dir.display().to_string(),
                    format!(
                        "more than one possible memops root file found in the implementation directory\n{name}"
                    ),
                );
                report.note(format!(
                    "the file {name} is a possible orphaned memops root [warning]"
                ));
            }
        }

        let mut qualifying: Vec<PathBuf> = Vec::new();
        let mut collected_code: Option<ErrorCode> = None;
        let mut collected_messages: Vec<String> = Vec::new();
        for candidate in &candidates {
            if candidate.is_dir() {
                return Err(CheckError::stop(
                    ErrorCode::IsNotFile,
                    candidate.display().to_string(),
                    format!("{} is not a file it's a directory", candidate.display()),
                ));
            }
            match cache.header(candidate) {
                Ok(header) if header.root_tag == MEMOPS_ROOT_TAG => {
                    qualifying.push(candidate.clone());
                }
                Ok(_) => {
                    collected_code.get_or_insert(ErrorCode::RootIsNotMemopsRoot);
                    collected_messages.push(format!(
                        "{} doesn't contain a {MEMOPS_ROOT_TAG}",
                        candidate.display()
                    ));
                }
                Err(fault) => {
                    collected_code.get_or_insert(fault.code);
                    collected_messages.extend(fault.messages);
                }
            }
        }

        let preferred = implementation_dir.join(&expected_name);
        if qualifying.iter().any(|path| path == &preferred) {
            report.note(format!(
                "The project in {expected_name}, was not renamed after saving"
            ));
            return Ok(preferred);
        }

        match qualifying.len() {
            1 => {
                let winner = qualifying.remove(0);
                report.note(format!(
                    "The project in {}, was probably renamed after saving",
                    last_components(&winner, 1)
                ));
                Ok(winner)
            }
            0 => {
                let code = collected_code.unwrap_or(ErrorCode::NoMemopsRootFiles);
                if candidates.len() == 1 {
                    let candidate = &candidates[0];
                    let mut messages = vec![
                        format!(
                            "the file {} is not a valid root xml file and",
                            candidate.display()
                        ),
                        "while parsing this file i got the following messages:".to_string(),
                    ];
                    messages.extend(collected_messages);
                    Err(Fault::with_messages(
                        code,
                        candidate.display().to_string(),
                        messages,
                    )
                    .into())
                } else {
                    let mut messages = vec![
                        "no valid root xml file found in the implementation directory:".to_string(),
                        implementation_dir.display().to_string(),
                        "but when parsing some of the files in the implementation directory i got the following messages:"
                            .to_string(),
                    ];
                    messages.extend(collected_messages);
                    Err(Fault::with_messages(
                        code,
                        implementation_dir.display().to_string(),
                        messages,
                    )
                    .into())
                }
            }
            _ => {
                let mut messages = vec![
                    format!(
                        "no xml files which could be memops roots were found in {}",
                        implementation_dir.display()
                    ),
                    "with the following extra messages being reported".to_string(),
                    format!(
                        "more than one ccpn root file found in {} and none match project name",
                        implementation_dir.display()
                    ),
                    "roots are:".to_string(),
                ];
                messages.extend(qualifying.iter().map(|path| last_components(path, 5)));
                Err(Fault::with_messages(
                    ErrorCode::NoMemopsRootFiles,
                    implementation_dir.display().to_string(),
                    messages,
                )
                .into())
            }
        }
    }
}

/// Last path component with the project suffix stripped.
fn project_name(path: &Path) -> String {
    let name = last_components(path, 1);
    match name.strip_suffix(PROJECT_SUFFIX) {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

/// Last `count` components joined back into a short display path.
fn last_components(path: &Path, count: usize) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect();
    let start = parts.len().saturating_sub(count);
    parts[start..].join("/")
}

/// Stops the run unless `path` is a directory we can list.
fn readable_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CheckError::stop(
            ErrorCode::MissingDirectory,
            path.display().to_string(),
            format!("the directory {} doesn't exist", path.display()),
        ));
    }
    if !path.is_dir() {
        return Err(CheckError::stop(
            ErrorCode::IsNotDirectory,
            path.display().to_string(),
            format!(
                "the path {} should be a directory, it isn't, it's a file",
                path.display()
            ),
        ));
    }
    if fs::read_dir(path).is_err() {
        return Err(CheckError::stop(
            ErrorCode::NotReadable,
            path.display().to_string(),
            format!("the path {} is not readable", path.display()),
        ));
    }
    Ok(())
}

/// Flags a project-level name that strays outside the ccpn character set,
/// ignoring one of the expected suffixes when present.
fn check_name_character_set(
    value: &str,
    what: &str,
    suffixes: &[&str],
    report: &mut RunReport,
) {
    let Some(pointers) = formats::filename_outside_letter_set(value, "", suffixes) else {
        return;
    };
    let detail = [
        format!(
            "the {what} {value} contains characters outside the set [a-zA-Z0-9_] which is not allowed"
        ),
        format!("value: {value}"),
        format!("_______{pointers}"),
    ]
    .join("\n");
    report.error(ErrorCode::NonCcpnAsciiCharacter, value, detail.clone());
    report.note(format!("{detail} [error]"));
}
