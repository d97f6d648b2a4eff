use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Every condition the checker can report against a project.
///
/// The set is closed: stages pick codes from here and never invent new ones,
/// so downstream tooling can match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingDirectory,
    IsNotDirectory,
    IsNotFile,
    NotReadable,
    NoMemopsRootFiles,
    MultipleMemopsRootFiles,
    RootIsNotMemopsRoot,
    BadXml,
    NoStorageUnit,
    NoRootOrTopObject,
    MultipleRootOrTopObjectsInStorageUnit,
    RootModelVersionMissing,
    RootModelVersionBad,
    RootFileTimeAttribMissing,
    RootFileTimeAttribBadFormat,
    RootHasNoModelVersion,
    SchemaLoadFailed,
    NoExoLinksFound,
    BadlyFormattedRootExoLink,
    ExoLinkSourceMissing,
    ExoLinkTooManySources,
    BadlyFormattedExoLinkKeyData,
    BadlyFormattedRoleExoLinkKeyData,
    NonCcpnAsciiCharacter,
    BadGuidFormat,
    ExoLinkedFileMissing,
    ExoLinkedFileHasWrongKey,
    InternalAndExternalGuidsDisagree,
    MissingPackageGuid,
    UnknownPackageGuid,
    BadRootElementName,
    UnknownShortPackageName,
    ShortNameGuidDoesntMatchPackageGuid,
    ExoFileTimeAttribMissing,
    ExoFileTimeAttribInvalid,
    ExoFileReleaseAttribMissing,
    ExoFileReleaseAttribInvalid,
    ExoFileReleaseDoesntMatchRoot,
    ExoFileWrongStorageLocation,
    WarningDetachedFiles,
    WarningEmptyContainer,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A tagged failure carried through fallible stage helpers.
///
/// The Err side of stage operations: a code, the entity that caused it and
/// one or more free-form messages. Converts into a [`Finding`] when recorded.
#[derive(Debug, Clone)]
pub struct Fault {
    pub code: ErrorCode,
    pub cause: String,
    pub messages: Vec<String>,
}

impl Fault {
    pub fn new(code: ErrorCode, cause: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            cause: cause.into(),
            messages: vec![message.into()],
        }
    }

    pub fn with_messages(
        code: ErrorCode,
        cause: impl Into<String>,
        messages: Vec<String>,
    ) -> Self {
        Self {
            code,
            cause: cause.into(),
            messages,
        }
    }

    /// The messages joined into the detail text a report record carries.
    pub fn detail(&self) -> String {
        self.messages.join("\n")
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.cause, self.messages.join("; "))
    }
}

impl std::error::Error for Fault {}

/// A recorded error or warning: code, offending entity and detail text.
#[derive(Debug, Clone)]
pub struct Finding {
    pub code: ErrorCode,
    pub cause: String,
    pub detail: String,
    pub is_warning: bool,
}

impl Finding {
    pub fn error(code: ErrorCode, cause: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code,
            cause: cause.into(),
            detail: detail.into(),
            is_warning: false,
        }
    }

    pub fn warning(code: ErrorCode, cause: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code,
            cause: cause.into(),
            detail: detail.into(),
            is_warning: true,
        }
    }
}

impl From<Fault> for Finding {
    fn from(fault: Fault) -> Self {
        let detail = fault.detail();
        Finding::error(fault.code, fault.cause, detail)
    }
}

/// Control-flow error for a checker run.
///
/// `Stop` aborts the run over a project fault that makes further analysis
/// meaningless; `Internal` is a defect in the checker itself.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("analysis stopped: {0}")]
    Stop(Fault),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CheckError {
    pub fn stop(code: ErrorCode, cause: impl Into<String>, message: impl Into<String>) -> Self {
        CheckError::Stop(Fault::new(code, cause, message))
    }
}

impl From<Fault> for CheckError {
    fn from(fault: Fault) -> Self {
        CheckError::Stop(fault)
    }
}

/// Schema-table loading error types
#[derive(Error, Debug)]
pub enum SchemaLoadError {
    #[error("schema tables for model version {version} not found in {dir}")]
    MissingTables { version: String, dir: PathBuf },

    #[error("cannot read schema table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse schema table {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("the supertype hierarchy contains a cycle involving {guid}")]
    CyclicHierarchy { guid: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CheckError>;
