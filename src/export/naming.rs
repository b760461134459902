use super::options::ExportOptions;
use crate::error::ExportError;
use crate::library::FolderRecord;
use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Names iPhoto gives events it creates on import, e.g. `Jan 5, 2010`.
const GENERATED_NAME: &str = r"^[A-Z][a-z]{2} [0-9]{1,2}, [0-9]{4}";
/// Names that already start with a date, e.g. `2010-01-05 Skiing`.
const DATED_NAME: &str = r"^[0-9]{4}.[0-9]{2}.[0-9]{2}";

/// Maps folder records to directory names relative to the destination.
#[derive(Debug, Clone)]
pub struct FolderNamer {
    date_prefix: bool,
    year_dirs: bool,
    delimiter: String,
    generated_name: Regex,
    dated_name: Regex,
}

impl FolderNamer {
    pub fn new(options: &ExportOptions) -> Result<Self, ExportError> {
        Ok(Self {
            date_prefix: options.date_prefix,
            year_dirs: options.year_dirs,
            delimiter: options.date_delimiter.clone(),
            generated_name: Regex::new(GENERATED_NAME)?,
            dated_name: Regex::new(DATED_NAME)?,
        })
    }

    /// `YYYY<delimiter>MM<delimiter>DD`
    pub fn date_label(&self, date: DateTime<Utc>) -> String {
        let d = &self.delimiter;
        format!("{:04}{d}{:02}{d}{:02}", date.year(), date.month(), date.day())
    }

    /// Relative directory for `folder`.
    ///
    /// Dated folders get the date in front of their name, or instead of it
    /// when the name is one iPhoto generated from the date anyway. Names that
    /// already start with a date are left alone.
    pub fn relative_dir(&self, folder: &FolderRecord) -> PathBuf {
        let name = component(folder.name());
        let date = match folder.date() {
            Some(date) if self.date_prefix => date,
            _ => return PathBuf::from(name),
        };

        let label = self.date_label(date);
        let leaf = if self.generated_name.is_match(&name) {
            label
        } else if self.dated_name.is_match(&name) {
            name
        } else {
            format!("{label} {name}")
        };

        if self.year_dirs {
            Path::new(&date.year().to_string()).join(leaf)
        } else {
            PathBuf::from(leaf)
        }
    }
}

/// A folder name usable as a single path component.
fn component(name: &str) -> String {
    match name.trim() {
        "" => "Untitled".to_string(),
        "." | ".." => name.replace('.', "_"),
        _ => name.replace(['/', '\0'], "_"),
    }
}

/// Keeps directory and file paths produced in one run unique.
///
/// The first claim of a path gets it unchanged. Later claims of a directory
/// get ` 01`, ` 02`… appended and later claims of a file get `01_`, `02_`…
/// in front of the file name.
#[derive(Debug, Default)]
pub struct Deconflicter {
    dirs: HashSet<PathBuf>,
    files: HashSet<PathBuf>,
}

impl Deconflicter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim_dir(&mut self, dir: &Path) -> PathBuf {
        let mut candidate = dir.to_path_buf();
        let mut j = 1;
        while self.dirs.contains(&candidate) {
            let mut numbered = OsString::from(dir.as_os_str());
            numbered.push(format!(" {j:02}"));
            candidate = PathBuf::from(numbered);
            j += 1;
        }
        self.dirs.insert(candidate.clone());
        candidate
    }

    pub fn claim_file(&mut self, dir: &Path, file_name: &OsStr) -> PathBuf {
        let mut candidate = dir.join(file_name);
        let mut j = 1;
        while self.files.contains(&candidate) {
            let mut numbered = OsString::from(format!("{j:02}_"));
            numbered.push(file_name);
            candidate = dir.join(numbered);
            j += 1;
        }
        self.files.insert(candidate.clone());
        candidate
    }
}
