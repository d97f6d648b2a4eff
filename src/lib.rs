//! # validate-ccpn Library
//!
//! Integrity checking for CCPN v3 projects: a project is a directory tree of
//! XML documents tied together by exo links (guid references from the memops
//! root document to top object files). The checker verifies that the tree,
//! the links, the file names and the per-file structure all agree, and
//! reports everything it saw as an ordered run log plus severity-classified
//! findings.
//!
//! The library never prints: [`ProjectChecker::run`] returns a [`RunReport`]
//! and [`output::Output`] renders it to any `Write` sink.

pub mod checker;
pub mod cli;
pub mod document;
pub mod error;
pub mod exolink;
pub mod formats;
pub mod keycheck;
pub mod matcher;
pub mod output;
pub mod report;
pub mod schema;
pub mod structure;

pub use checker::{CheckOptions, ProjectChecker};
pub use cli::Cli;
pub use error::{CheckError, ErrorCode, Fault, Finding, Result, SchemaLoadError};
pub use exolink::{ExoLink, ExoLinkSet};
pub use matcher::{ObjectIdentifier, StorageLocation};
pub use output::Output;
pub use report::{ExitStatus, Note, RunReport};
pub use schema::{SchemaIndex, TypeDescriptor};
