use crate::library::Grouping;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening, projecting or querying an iPhoto library.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Can't open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupted library: {0}")]
    Corrupted(#[from] Corruption),

    #[error("Can't find image #{id}")]
    ImageNotFound { id: String },

    #[error("Unknown keyword #{id}")]
    KeywordNotFound { id: String },

    #[error("Unknown face #{id}")]
    FaceNotFound { id: String },
}

impl LibraryError {
    /// True for every failure that means the AlbumData.xml itself can't be trusted.
    pub fn is_corrupted(&self) -> bool {
        matches!(self, LibraryError::Corrupted(_))
    }
}

/// The ways an AlbumData.xml document can be malformed.
#[derive(Debug, Error)]
pub enum Corruption {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid UTF-8 in text content: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("unexpected value '{raw}' for integer")]
    BadInteger { raw: String },

    #[error("unexpected value '{raw}' for real")]
    BadReal { raw: String },

    #[error("unexpected value '{raw}' for date")]
    BadDate { raw: String },

    #[error("invalid base64 in <data>: {source}")]
    BadData { source: base64::DecodeError },

    #[error("don't know what a <{tag}> is")]
    UnknownTag { tag: String },

    #[error("unexpected <{found}> {context}")]
    Unexpected { found: String, context: &'static str },

    #[error("<{tag}> value without a preceding <key>")]
    ValueWithoutKey { tag: String },

    #[error("document ended inside <{tag}>")]
    UnexpectedEof { tag: String },

    #[error("can't understand version {found} iPhoto libraries (expected {expected})")]
    UnsupportedVersion { found: i64, expected: i64 },

    #[error("'{key}' holds a {found}, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("missing required key '{key}'")]
    MissingKey { key: String },
}

/// Failures of the export walk. Apart from [`ExportError::Destination`] and
/// [`ExportError::GroupingMismatch`] these are reported per image and never
/// stop the walk.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("Destination {} is not writable: {source}", .path.display())]
    Destination {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Library was read for {library:?} but the export wants {requested:?}")]
    GroupingMismatch { library: Grouping, requested: Grouping },

    #[error("Image #{id} has neither ImagePath nor OriginalPath")]
    MissingImagePath { id: String },

    #[error("Source file {} does not exist", .path.display())]
    MissingSource { path: PathBuf },

    #[error("Can't create {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Can't stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Can't copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("Problem setting metadata on {}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        source: ExifToolError,
    },

    #[error("Invalid folder name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Can't import {}: {source}", .path.display())]
    Import {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExifToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't start exiftool: {0}")]
    ExifToolNotFound(std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {}. command={command_args}", .path.display())]
    FileNotFound { path: PathBuf, command_args: String },

    #[error("ExifTool error: {message}. command={command_args}")]
    ExifToolProcess {
        message: String,
        std_err: String,
        command_args: String,
    },

    #[error("Process terminated unexpectedly.")]
    ProcessTerminated,

    #[error("stderr channel for exiftool disconnected.")]
    StderrDisconnected,

    #[error("Expected different format from exiftool. file={path}, args={command_args}")]
    UnexpectedFormat { path: String, command_args: String },

    #[error("Deserialization error at path '{path}': {source}")]
    Deserialization {
        path: String,
        source: serde_json::Error,
    },
}

impl From<serde_path_to_error::Error<serde_json::Error>> for ExifToolError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        ExifToolError::Deserialization {
            path: err.path().to_string(),
            source: err.into_inner(),
        }
    }
}
