use crate::library::Grouping;
use chrono::NaiveDate;

/// Separator between year, month and day in dated folder names.
pub const DEFAULT_DATE_DELIMITER: &str = "-";

/// Everything that changes how a library is exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Export events or albums.
    pub grouping: Grouping,
    /// Prefix dated folders with `YYYY-MM-DD`.
    pub date_prefix: bool,
    /// Nest dated folders in a directory per year.
    pub year_dirs: bool,
    pub date_delimiter: String,
    /// Make repeated folder and file names unique instead of merging them.
    pub deconflict: bool,
    /// Export unedited originals instead of the current versions.
    pub originals: bool,
    /// Write captions, ratings, comments and keywords into the copies.
    pub metadata: bool,
    /// Add face names to the keywords. Only used together with `metadata`.
    pub faces: bool,
    /// Only compare file sizes when deciding whether a copy is up to date.
    pub ignore_time_delta: bool,
    /// Log what would happen without touching the destination.
    pub dry_run: bool,
    /// Ask iPhoto to import destination folders the library doesn't know.
    pub import_missing: bool,
    /// Ignore destination folders dated before this day when importing.
    pub import_from: Option<NaiveDate>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            grouping: Grouping::Events,
            date_prefix: true,
            year_dirs: false,
            date_delimiter: DEFAULT_DATE_DELIMITER.to_string(),
            deconflict: false,
            originals: false,
            metadata: false,
            faces: false,
            ignore_time_delta: false,
            dry_run: false,
            import_missing: false,
            import_from: None,
        }
    }
}
