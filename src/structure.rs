//! Structural checks over the top-object files the exo links point at.
//!
//! Two passes live here. The guid cross-check compares each project file's
//! internal guid attribute with the guid its filename carries. The content
//! walk then examines every file's storage-unit header: root-element naming,
//! package guid, version and time attributes, and whether the file sits in
//! the storage location the schema assigns its package.

use std::path::Path;

use crate::document::{DocumentCache, DocumentHeader, STORAGE_UNIT_TAG};
use crate::error::ErrorCode;
use crate::exolink::ExoLinkSet;
use crate::formats;
use crate::matcher::{ObjectIdentifier, StorageLocation};
use crate::report::RunReport;
use crate::schema::SchemaIndex;

const UNKNOWN_OBJECT_LABEL: &str = "*unknown-package*.*unknown-class*";

/// Shared context for the structural passes of one run.
pub struct StructureValidator<'a> {
    model_dir: &'a Path,
    links: &'a ExoLinkSet,
    schema: &'a SchemaIndex,
    root_version: &'a str,
}

impl<'a> StructureValidator<'a> {
    pub fn new(
        model_dir: &'a Path,
        links: &'a ExoLinkSet,
        schema: &'a SchemaIndex,
        root_version: &'a str,
    ) -> Self {
        StructureValidator {
            model_dir,
            links,
            schema,
            root_version,
        }
    }

    fn label(&self, guid: &str) -> String {
        self.links
            .get(guid)
            .map(|link| link.short_name())
            .unwrap_or_else(|| UNKNOWN_OBJECT_LABEL.to_string())
    }

    /// Compares each existing project file's internal guid attribute with
    /// the guid its filename carries. Unreadable files are reported here as
    /// well so the later content walk can skip them quietly.
    pub fn cross_check_guids(
        &self,
        objects: &[ObjectIdentifier],
        cache: &mut DocumentCache,
        report: &mut RunReport,
    ) {
        for identifier in objects {
            if identifier.storage_location != StorageLocation::Project {
                continue;
            }
            let Some(relative) = &identifier.path else {
                continue;
            };
            let full = self.model_dir.join(relative);

            match cache.header(&full) {
                Ok(header) => {
                    let file_guid = header.root_attr("guid");
                    if file_guid == Some(identifier.guid.as_str()) {
                        continue;
                    }
                    let file_name = full
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let name_label = self.label(&identifier.guid);
                    let file_label = file_guid
                        .map(|guid| self.label(guid))
                        .unwrap_or_else(|| "unknown".to_string());
                    report.error(
                        ErrorCode::InternalAndExternalGuidsDisagree,
                        full.display().to_string(),
                        [
                            format!(
                                "the guid in the file {file_name} does not match the guid in the file name"
                            ),
                            format!("file name guid: {} {name_label}", identifier.guid),
                            format!(
                                "file guid: {} {file_label}",
                                file_guid.unwrap_or("*absent*"),
                            ),
                        ]
                        .join("\n"),
                    );
                }
                Err(fault) => {
                    report.error(
                        fault.code,
                        full.display().to_string(),
                        format!(
                            "could not read the file {} because\n{}",
                            full.display(),
                            fault.detail(),
                        ),
                    );
                }
            }
        }
    }

    /// Walks the matched objects and checks each existing file's header
    /// against the schema. `linked` only changes the wording; the detached
    /// pass runs the same checks.
    pub fn check_contents(
        &self,
        objects: &[ObjectIdentifier],
        linked: bool,
        cache: &mut DocumentCache,
        report: &mut RunReport,
    ) {
        let kind = if linked { "linked" } else { "detached" };
        let num_active = objects.iter().filter(|object| object.exists()).count();

        report.blank_note();
        report.note(format!(
            "checking the contents of {num_active} {kind} top objects"
        ));

        let mut good = 0usize;
        for (i, identifier) in objects.iter().enumerate() {
            let number = i + 1;
            let short = self.label(&identifier.guid);
            let guid = &identifier.guid;

            let Some(relative) = &identifier.path else {
                report.note_plain(format!("{number:>3}. {guid} {short} - the file is missing"));
                continue;
            };
            if identifier.storage_location == StorageLocation::Reference {
                report.note_plain(format!(
                    "{number:>3}. {guid} {short} - is ok [reference object assumed good (further analysis skipped)]"
                ));
                good += 1;
                continue;
            }

            let full = self.model_dir.join(relative);
            let header = match cache.header(&full) {
                Ok(header) => header,
                Err(_) => {
                    report.note_plain(format!(
                        "{number:>3}. {guid} {short} - xml is bad skipped [see errors at the end of the run for details]"
                    ));
                    continue;
                }
            };

            match self.examine(identifier, &header, &full, &short) {
                Ok((time, release)) => {
                    report.note_plain(format!(
                        "{number:>3}. {guid} {short} - is ok [saved on: {time} model version: {release}]"
                    ));
                    good += 1;
                }
                Err((code, detail)) => {
                    report.error(code, full.display().to_string(), detail.clone());
                    report.note_plain(format!("{number:>3}. {guid} {short} - {detail} [ERROR]"));
                }
            }
        }

        if good == num_active {
            report.note(format!(
                "all the analysed {kind} top objects [{good}] appear to have the correct basic structure"
            ));
        } else {
            report.note(format!(
                "only {good} of the {num_active} analysed top objects appear to have the correct basic structure\n[see complete errors at the end of the run for details]"
            ));
        }
    }

    /// First structural defect of one file, or its time and release
    /// attributes when the header is sound.
    fn examine(
        &self,
        identifier: &ObjectIdentifier,
        header: &DocumentHeader,
        full: &Path,
        short: &str,
    ) -> Result<(String, String), (ErrorCode, String)> {
        let file_name = full
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let unit_tag = STORAGE_UNIT_TAG;

        let Some(package_guid) = header.unit_attr("packageGuid") else {
            return Err((
                ErrorCode::MissingPackageGuid,
                format!(
                    "the top object has no packageGuid attribute in the element {unit_tag} in the file {file_name} {short}"
                ),
            ));
        };
        let Some(expected_location) = self.schema.containment_for(package_guid) else {
            return Err((
                ErrorCode::UnknownPackageGuid,
                format!(
                    "the package guid {package_guid} in the file {file_name} {short} is not recognised"
                ),
            ));
        };

        let root_tag = header.root_tag.as_str();
        let name_parts: Vec<&str> = root_tag.split('.').collect();
        let [short_package, _type_name] = name_parts.as_slice() else {
            return Err((
                ErrorCode::BadRootElementName,
                [
                    format!(
                        "the root elements name in the file {file_name} {short} doesn't have the correct name format"
                    ),
                    format!(
                        "it should be of the form <SHORT_PACKAGE_NAME>.<TOP-OBJECT-NAME> but was {root_tag}"
                    ),
                ]
                .join("\n"),
            ));
        };
        let Some(short_package_guid) = self.schema.package_guid(short_package) else {
            return Err((
                ErrorCode::UnknownShortPackageName,
                format!(
                    "the short package name ({short_package}) in the root element of the file {file_name} {short} is not recognised"
                ),
            ));
        };
        if short_package_guid != package_guid {
            let package_label = self
                .schema
                .package_short_name(package_guid)
                .unwrap_or("unknown");
            return Err((
                ErrorCode::ShortNameGuidDoesntMatchPackageGuid,
                [
                    format!("the guid for the short name {short_package} [{short_package_guid}]"),
                    format!("is not the same as the package guid {package_guid} [{package_label}]"),
                    format!("for the root element in the file {file_name} {short}"),
                ]
                .join("\n"),
            ));
        }

        let Some(time) = header.unit_attr("time") else {
            return Err((
                ErrorCode::ExoFileTimeAttribMissing,
                format!(
                    "in the file {file_name} {short} the attribute time is missing in the element {unit_tag}"
                ),
            ));
        };
        if !formats::is_parsable_timestamp(time) {
            return Err((
                ErrorCode::ExoFileTimeAttribInvalid,
                format!(
                    "in the file {file_name} {short} the attribute time [{time}] in the element {unit_tag} is not a valid time"
                ),
            ));
        }

        let Some(release) = header.unit_attr("release") else {
            return Err((
                ErrorCode::ExoFileReleaseAttribMissing,
                format!(
                    "in the file {file_name} {short} the attribute release is missing in the element {unit_tag}"
                ),
            ));
        };
        if !formats::is_valid_version(release) {
            return Err((
                ErrorCode::ExoFileReleaseAttribInvalid,
                [
                    format!("in the file {file_name} {short} the attribute release [{release}]"),
                    format!("the attribute release [{release}] is not a valid version number"),
                    "it should be of the form <major>.<minor>.<patch>".to_string(),
                    "where <major>, <minor>, and <patch> can only contain digits with a possible prepended letter"
                        .to_string(),
                ]
                .join("\n"),
            ));
        }
        if release != self.root_version {
            return Err((
                ErrorCode::ExoFileReleaseDoesntMatchRoot,
                [
                    format!(
                        "in the file {file_name} {short} the model version for the top object"
                    ),
                    format!(
                        "{} [{release}] is different from root {}",
                        identifier.guid, self.root_version,
                    ),
                ]
                .join("\n"),
            ));
        }

        if identifier.containment != expected_location {
            return Err((
                ErrorCode::ExoFileWrongStorageLocation,
                [
                    format!(
                        "the file {file_name} {short} is not stored in the correct place in the project"
                    ),
                    format!(
                        "it should be stored in ccpnv3/{} but is stored in ccpnv3/{}",
                        expected_location.join("/"),
                        identifier.containment.join("/"),
                    ),
                ]
                .join("\n"),
            ));
        }

        Ok((time.to_string(), release.to_string()))
    }
}
