//! Error types for the generation framework
//!
//! Every fatal fault carries the path of the offending artifact so a human
//! can locate the file without digging through a backtrace. Expected
//! negatives ("no marker recorded yet", "file does not exist yet") are not
//! errors; they are modeled as `Option`/`bool` results.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::chat::ChatError;

/// Errors that can occur while checking or rewriting generated artifacts
#[derive(Debug, Error)]
pub enum GenError {
    #[error("separator /{pattern}/ not found in {path}")]
    SeparatorNotFound { pattern: String, path: PathBuf },

    #[error("separator /{pattern}/ also matches inside segment {segment} of {path} - likely a usage error")]
    AmbiguousSeparator {
        pattern: String,
        segment: usize,
        path: PathBuf,
    },

    #[error("joined segments do not reproduce the content of {path}")]
    SegmentMismatch { path: PathBuf },

    #[error("no version marker found in {path}")]
    MarkerNotFound { path: PathBuf },

    #[error("cannot recover a version marker from an output written without one")]
    MarkerUnsupported,

    #[error("region marker {marker:?} occurs {count} times in {path}, expected exactly 2")]
    RegionMarkerCount {
        marker: String,
        count: usize,
        path: PathBuf,
    },

    #[error("generated content contains the region marker {marker:?}, refusing to write {path}")]
    ContentContainsMarker { marker: String, path: PathBuf },

    #[error("cannot rewrite a region of {path}: the file does not exist")]
    MissingRegionFile { path: PathBuf },

    #[error("writing to {target} is not supported")]
    UnsupportedWrite { target: String },

    #[error("input file {path} does not exist")]
    MissingInput { path: PathBuf },

    #[error("no output file given")]
    NoOutput,

    #[error("no prompt given for {path}")]
    NoPrompt { path: PathBuf },

    #[error("task has not been run yet for {path}")]
    NotYetRun { path: PathBuf },

    #[error("the AI returned FIXME for {path}:\n{output}")]
    FixmeReturned { path: PathBuf, output: String },

    #[error("invalid separator pattern /{pattern}/: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("could not write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Chat(#[from] ChatError),
}

pub type Result<T> = std::result::Result<T, GenError>;
