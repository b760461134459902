use crate::error::ExportError;
use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

/// Modification times closer than this count as equal. Some filesystems only
/// keep two-second resolution.
pub const STALE_TOLERANCE: Duration = Duration::from_secs(10);

/// The parts of a file's metadata the skip decision looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub len: u64,
    pub modified: SystemTime,
}

impl FileStamp {
    pub fn of(path: &Path) -> Result<Self, ExportError> {
        let stat = |source| ExportError::Stat {
            path: path.to_path_buf(),
            source,
        };
        let metadata = fs::metadata(path).map_err(stat)?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().map_err(stat)?,
        })
    }
}

/// Whether an existing copy can be left alone: either its modification time
/// is within [`STALE_TOLERANCE`] of the source (unless `ignore_time_delta`),
/// or it has the same size.
pub fn is_unchanged(source: &FileStamp, target: &FileStamp, ignore_time_delta: bool) -> bool {
    if !ignore_time_delta {
        let delta = source
            .modified
            .duration_since(target.modified)
            .or_else(|_| target.modified.duration_since(source.modified))
            .unwrap_or(Duration::MAX);
        if delta <= STALE_TOLERANCE {
            return true;
        }
    }
    source.len == target.len
}

/// Copies `from` to `to`, keeping the source's permissions and modification
/// time. The data is written to a temporary file next to `to` and renamed
/// over it, so an interrupted copy never leaves a truncated image behind.
pub fn copy_preserving_mtime(from: &Path, to: &Path) -> Result<u64, ExportError> {
    let copy_error = |source| ExportError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    let dir = to.parent().unwrap_or_else(|| Path::new("."));

    let mut source = File::open(from).map_err(copy_error)?;
    let metadata = source.metadata().map_err(copy_error)?;
    let mut staged = NamedTempFile::new_in(dir).map_err(copy_error)?;
    let copied = std::io::copy(&mut source, staged.as_file_mut()).map_err(copy_error)?;

    let file = staged.as_file();
    file.set_permissions(metadata.permissions()).map_err(copy_error)?;
    file.set_modified(metadata.modified().map_err(copy_error)?)
        .map_err(copy_error)?;
    staged.persist(to).map_err(|err| copy_error(err.error))?;
    Ok(copied)
}
