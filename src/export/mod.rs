//! Copying a projected library into a plain folder tree.

mod copy;
mod driver;
mod import;
mod metadata;
mod naming;
mod options;

pub use copy::{copy_preserving_mtime, is_unchanged, FileStamp, STALE_TOLERANCE};
pub use driver::{ExportSummary, Exporter};
pub use import::{import_folder, import_script, ImportCandidate, MissingFolderImport};
pub use metadata::{MetadataRequest, MetadataWriter};
pub use naming::{Deconflicter, FolderNamer};
pub use options::{ExportOptions, DEFAULT_DATE_DELIMITER};
