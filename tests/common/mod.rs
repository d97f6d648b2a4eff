//! Shared project-tree fixture for the checker integration tests.
//!
//! `ProjectFixture` lays out everything one checker run needs inside a
//! single temporary directory: the versioned schema tables, a project
//! with a memops root document declaring eight exo links, the matching
//! top-object files, and a reference tree holding one of them. The link
//! set covers every key policy (source attribute, schema default, role
//! reference, embedded element, sanitized `Line` text), and the
//! constraint store is the only file in its directory so deleting it
//! leaves an orphaned container behind. Tests damage the tree through
//! the fixture's helpers before running the checker over it.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

use validate_ccpn::checker::{CheckOptions, ProjectChecker};
use validate_ccpn::matcher::REFERENCE_LISTING_FILE;
use validate_ccpn::report::RunReport;

pub const PROJECT_NAME: &str = "alpha";
pub const MODEL_VERSION: &str = "3.1.0";
pub const SAVE_TIME: &str = "Sat Feb 24 16:16:06 2024";

/// Guid of the NmrProject top object; its `name` key rides on a source
/// attribute.
pub const NMR_PROJECT_GUID: &str = "guid-nmr-1";
/// Guid of the NoteStore top object, keyed by a role link to the
/// NmrProject plus a schema-default serial.
pub const NOTE_STORE_GUID: &str = "guid-notes-1";
/// Guid of the constraint store, the only top object in its directory.
pub const CONSTRAINT_STORE_GUID: &str = "guid-constraints-1";
pub const MOL_SYSTEM_GUID: &str = "guid-molsystem-1";
pub const DATA_LOCATION_GUID: &str = "guid-datalocation-1";
/// Guid of the analysis project; its `name` key lives in an embedded
/// child element instead of an attribute.
pub const ANALYSIS_GUID: &str = "guid-analysis-1";
/// Guid of the window stored in the reference tree.
pub const WINDOW_STORE_GUID: &str = "guid-window-1";
/// Guid of the project-side window; its `Line` title carries a space
/// the filename sanitizer turns into `_`.
pub const SECOND_WINDOW_GUID: &str = "guid-window-2";

pub const NMR_PROJECT_FILE: &str = "ccp/nmr/Nmr/alpha+guid-nmr-1.xml";
pub const NOTE_STORE_FILE: &str =
    "ccp/nmr/Nmr/_ccp_nmr_Nmr_NmrProject___alpha___+1+guid-notes-1.xml";
pub const CONSTRAINT_STORE_FILE: &str = "ccp/nmr/NmrConstraint/7+guid-constraints-1.xml";
pub const MOL_SYSTEM_FILE: &str = "ccp/molecule/MolSystem/msA+guid-molsystem-1.xml";
pub const DATA_LOCATION_FILE: &str = "memops/DataLocation/standard+guid-datalocation-1.xml";
pub const ANALYSIS_FILE: &str = "ccpnmr/AnalysisProject/analysis+guid-analysis-1.xml";
pub const WINDOW_STORE_FILE: &str = "ccpnmr/gui/Window/main_window+guid-window-1.xml";
pub const SECOND_WINDOW_FILE: &str = "ccpnmr/gui/Window/scene_2+guid-window-2.xml";

pub struct ProjectFixture {
    root: TempDir,
}

impl ProjectFixture {
    pub fn new() -> Self {
        let fixture = ProjectFixture {
            root: TempDir::new().unwrap(),
        };
        fixture.write_schema_tables();
        fixture.write_root_document();

        let model_dir = fixture.model_dir();
        write_top_object(&model_dir, NMR_PROJECT_FILE, "NMR.NmrProject", NMR_PROJECT_GUID, "pkg-nmr");
        write_top_object(&model_dir, NOTE_STORE_FILE, "NMR.NoteStore", NOTE_STORE_GUID, "pkg-nmr");
        write_top_object(
            &model_dir,
            CONSTRAINT_STORE_FILE,
            "NMRC.NmrConstraintStore",
            CONSTRAINT_STORE_GUID,
            "pkg-nmrc",
        );
        write_top_object(&model_dir, MOL_SYSTEM_FILE, "MOLS.MolSystem", MOL_SYSTEM_GUID, "pkg-mols");
        write_top_object(
            &model_dir,
            DATA_LOCATION_FILE,
            "DLOC.DataLocationStore",
            DATA_LOCATION_GUID,
            "pkg-dloc",
        );
        write_top_object(&model_dir, ANALYSIS_FILE, "ANAP.AnalysisProject", ANALYSIS_GUID, "pkg-anap");
        write_top_object(&model_dir, SECOND_WINDOW_FILE, "GUIW.WindowStore", SECOND_WINDOW_GUID, "pkg-guiw");
        write_top_object(
            &fixture.reference_dir(),
            WINDOW_STORE_FILE,
            "GUIW.WindowStore",
            WINDOW_STORE_GUID,
            "pkg-guiw",
        );
        fixture
    }

    /// Runs the checker over the fixture project with the fixture's options.
    pub fn run(&self) -> RunReport {
        ProjectChecker::new(self.options()).run(&self.project_path())
    }

    pub fn options(&self) -> CheckOptions {
        CheckOptions {
            schema_dir: self.schema_dir(),
            reference_dir: self.reference_dir(),
            warnings_are_errors: false,
        }
    }

    pub fn project_path(&self) -> PathBuf {
        self.root.path().join(format!("{PROJECT_NAME}.ccpn"))
    }

    pub fn model_dir(&self) -> PathBuf {
        self.project_path().join("ccpnv3")
    }

    pub fn implementation_dir(&self) -> PathBuf {
        self.model_dir().join("memops").join("Implementation")
    }

    pub fn root_document(&self) -> PathBuf {
        self.implementation_dir().join(format!("{PROJECT_NAME}.xml"))
    }

    pub fn schema_dir(&self) -> PathBuf {
        self.root.path().join("model_info")
    }

    pub fn reference_dir(&self) -> PathBuf {
        self.root.path().join("reference").join("ccpnv3")
    }

    /// Full path of a top-object file inside the project's model tree.
    pub fn project_file(&self, relative: &str) -> PathBuf {
        self.model_dir().join(relative)
    }

    pub fn remove_project_file(&self, relative: &str) {
        fs::remove_file(self.project_file(relative)).unwrap();
    }

    pub fn rename_project_file(&self, from: &str, to: &str) {
        let target = self.project_file(to);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::rename(self.project_file(from), target).unwrap();
    }

    /// Adds a project-side top object beyond the ones the fixture starts
    /// with, sound in itself but not mentioned by the root document.
    pub fn write_project_object(&self, relative: &str, root_tag: &str, guid: &str, package_guid: &str) {
        write_top_object(&self.model_dir(), relative, root_tag, guid, package_guid);
    }

    pub fn remove_reference_tree(&self) {
        fs::remove_dir_all(self.reference_dir()).unwrap();
    }

    /// Writes the cached reference listing the checker falls back to when
    /// no reference tree is installed.
    pub fn write_reference_listing(&self, lines: &[&str]) {
        fs::write(
            self.schema_dir().join(REFERENCE_LISTING_FILE),
            lines.join("\n"),
        )
        .unwrap();
    }

    fn write_schema_tables(&self) {
        let dir = self.schema_dir();
        fs::create_dir_all(&dir).unwrap();

        let object_info = json!({
            "type-line": {
                "guid": "type-line",
                "name": "Line",
                "parent_guid": "pkg-impl",
            },
            "type-word": {
                "guid": "type-word",
                "name": "Word",
                "parent_guid": "pkg-impl",
            },
            "type-nmrproject": {
                "guid": "type-nmrproject",
                "name": "NmrProject",
                "parent_guid": "pkg-nmr",
                "containment": ["ccp", "nmr", "Nmr"],
                "keys": ["name"],
                "key_type_guids": {"name": "type-word"},
                "key_model_types": {"name": "MetaAttribute"},
            },
            "type-notestore": {
                "guid": "type-notestore",
                "name": "NoteStore",
                "parent_guid": "pkg-nmr",
                "containment": ["ccp", "nmr", "Nmr"],
                "keys": ["nmrProject", "serial"],
                "key_type_guids": {"nmrProject": "type-nmrproject", "serial": "type-word"},
                "key_model_types": {"nmrProject": "MetaRole", "serial": "MetaAttribute"},
                "key_defaults": {"serial": "1"},
            },
            "type-constraintstore": {
                "guid": "type-constraintstore",
                "name": "NmrConstraintStore",
                "parent_guid": "pkg-nmrc",
                "containment": ["ccp", "nmr", "NmrConstraint"],
                "keys": ["serial"],
                "key_type_guids": {"serial": "type-word"},
                "key_model_types": {"serial": "MetaAttribute"},
            },
            "type-molsystem": {
                "guid": "type-molsystem",
                "name": "MolSystem",
                "parent_guid": "pkg-mols",
                "containment": ["ccp", "molecule", "MolSystem"],
                "keys": ["code"],
                "key_type_guids": {"code": "type-word"},
                "key_model_types": {"code": "MetaAttribute"},
            },
            "type-datalocationstore": {
                "guid": "type-datalocationstore",
                "name": "DataLocationStore",
                "parent_guid": "pkg-dloc",
                "containment": ["memops", "DataLocation"],
                "keys": ["name"],
                "key_type_guids": {"name": "type-word"},
                "key_model_types": {"name": "MetaAttribute"},
            },
            "type-analysisproject": {
                "guid": "type-analysisproject",
                "name": "AnalysisProject",
                "parent_guid": "pkg-anap",
                "containment": ["ccpnmr", "AnalysisProject"],
                "keys": ["name"],
                "key_type_guids": {"name": "type-word"},
                "key_model_types": {"name": "MetaAttribute"},
            },
            "type-windowstore": {
                "guid": "type-windowstore",
                "name": "WindowStore",
                "parent_guid": "pkg-guiw",
                "containment": ["ccpnmr", "gui", "Window"],
                "keys": ["title"],
                "key_type_guids": {"title": "type-line"},
                "key_model_types": {"title": "MetaAttribute"},
            },
        });
        let storage = json!({
            "pkg-impl": ["memops", "Implementation"],
            "pkg-nmr": ["ccp", "nmr", "Nmr"],
            "pkg-nmrc": ["ccp", "nmr", "NmrConstraint"],
            "pkg-mols": ["ccp", "molecule", "MolSystem"],
            "pkg-dloc": ["memops", "DataLocation"],
            "pkg-anap": ["ccpnmr", "AnalysisProject"],
            "pkg-guiw": ["ccpnmr", "gui", "Window"],
        });
        let short_names = json!({
            "IMPL": "pkg-impl",
            "NMR": "pkg-nmr",
            "NMRC": "pkg-nmrc",
            "MOLS": "pkg-mols",
            "DLOC": "pkg-dloc",
            "ANAP": "pkg-anap",
            "GUIW": "pkg-guiw",
        });

        fs::write(
            dir.join("v_3_1_0_object_info.json"),
            object_info.to_string(),
        )
        .unwrap();
        fs::write(
            dir.join("v_3_1_0_guid_to_storage_location.json"),
            storage.to_string(),
        )
        .unwrap();
        fs::write(
            dir.join("v_3_1_0_short_name_to_guid.json"),
            short_names.to_string(),
        )
        .unwrap();
    }

    fn write_root_document(&self) {
        let path = self.root_document();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<_StorageUnit release="{MODEL_VERSION}" time="{SAVE_TIME}" packageGuid="pkg-impl">
  <IMPL.MemopsRoot>
    <IMPL.DataObject._objectVersion><IMPL.String>3.2.1</IMPL.String></IMPL.DataObject._objectVersion>
    <NMR.exo-NmrProject><IMPL.GuidString>{NMR_PROJECT_GUID}</IMPL.GuidString></NMR.exo-NmrProject>
    <NMR.exo-NoteStore><IMPL.GuidString>{NOTE_STORE_GUID}</IMPL.GuidString></NMR.exo-NoteStore>
    <NMRC.exo-NmrConstraintStore><IMPL.GuidString>{CONSTRAINT_STORE_GUID}</IMPL.GuidString></NMRC.exo-NmrConstraintStore>
    <MOLS.exo-MolSystem><IMPL.GuidString>{MOL_SYSTEM_GUID}</IMPL.GuidString></MOLS.exo-MolSystem>
    <DLOC.exo-DataLocationStore><IMPL.GuidString>{DATA_LOCATION_GUID}</IMPL.GuidString></DLOC.exo-DataLocationStore>
    <ANAP.exo-AnalysisProject><IMPL.GuidString>{ANALYSIS_GUID}</IMPL.GuidString></ANAP.exo-AnalysisProject>
    <GUIW.exo-WindowStore><IMPL.GuidString>{WINDOW_STORE_GUID}</IMPL.GuidString></GUIW.exo-WindowStore>
    <GUIW.exo-WindowStore><IMPL.GuidString>{SECOND_WINDOW_GUID}</IMPL.GuidString></GUIW.exo-WindowStore>
    <NMR.NmrProject guid="{NMR_PROJECT_GUID}" name="{PROJECT_NAME}"/>
    <NMR.NoteStore guid="{NOTE_STORE_GUID}">
      <NMR.NoteStore.nmrProject>
        <NMR.exo-NmrProject><IMPL.GuidString>{NMR_PROJECT_GUID}</IMPL.GuidString></NMR.exo-NmrProject>
      </NMR.NoteStore.nmrProject>
    </NMR.NoteStore>
    <NMRC.NmrConstraintStore guid="{CONSTRAINT_STORE_GUID}" serial="7"/>
    <MOLS.MolSystem guid="{MOL_SYSTEM_GUID}" code="msA"/>
    <DLOC.DataLocationStore guid="{DATA_LOCATION_GUID}" name="standard"/>
    <ANAP.AnalysisProject guid="{ANALYSIS_GUID}">
      <ANAP.AnalysisProject.name><IMPL.Word>analysis</IMPL.Word></ANAP.AnalysisProject.name>
    </ANAP.AnalysisProject>
    <GUIW.WindowStore guid="{WINDOW_STORE_GUID}" title="main_window"/>
    <GUIW.WindowStore guid="{SECOND_WINDOW_GUID}" title="scene 2"/>
  </IMPL.MemopsRoot>
</_StorageUnit>
"#
        );
        fs::write(path, xml).unwrap();
    }
}

/// Writes a structurally sound top-object file under `root`.
fn write_top_object(root: &Path, relative: &str, root_tag: &str, guid: &str, package_guid: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        path,
        format!(
            "<_StorageUnit release=\"{MODEL_VERSION}\" time=\"{SAVE_TIME}\" packageGuid=\"{package_guid}\">\
             <{root_tag} guid=\"{guid}\"/></_StorageUnit>"
        ),
    )
    .unwrap();
}

/// True when any note of the report contains `needle`.
pub fn has_note(report: &RunReport, needle: &str) -> bool {
    report.notes().iter().any(|note| note.text.contains(needle))
}
