//! Finding dated folders in the destination that the library doesn't know
//! about, and asking iPhoto to import them.

use super::options::ExportOptions;
use crate::error::ExportError;
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

const YEAR_DIR: &str = r"^[0-9]{4}$";

/// A destination folder and the library folder names that would correspond
/// to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    pub dir: PathBuf,
    pub date: NaiveDate,
    pub names: Vec<String>,
}

impl ImportCandidate {
    pub fn matches(&self, folder_name: &str) -> bool {
        self.names.iter().any(|name| name == folder_name)
    }
}

/// Destination folders not (yet) matched by any exported library folder.
#[derive(Debug, Default)]
pub struct MissingFolderImport {
    candidates: Vec<ImportCandidate>,
}

impl MissingFolderImport {
    /// Lists the dated folders of `dest`, inside year directories when
    /// `options.year_dirs` is set.
    pub fn scan(dest: &Path, options: &ExportOptions) -> Result<Self, ExportError> {
        let mut scan = Self::default();
        if !dest.is_dir() {
            return Ok(scan);
        }
        let dated = dated_folder_pattern(&options.date_delimiter)?;

        if options.year_dirs {
            let year_dir = Regex::new(YEAR_DIR)?;
            for (path, name) in subdirectories(dest)? {
                if !year_dir.is_match(&name) {
                    continue;
                }
                let year: i32 = name.parse().unwrap_or_default();
                if options.import_from.is_some_and(|from| year < from.year()) {
                    continue;
                }
                scan.scan_dir(&path, &dated, options.import_from)?;
            }
        } else {
            scan.scan_dir(dest, &dated, options.import_from)?;
        }
        debug!("{} destination folders could be imported", scan.candidates.len());
        Ok(scan)
    }

    fn scan_dir(&mut self, base: &Path, dated: &Regex, from: Option<NaiveDate>) -> Result<(), ExportError> {
        for (path, name) in subdirectories(base)? {
            let Some(caps) = dated.captures(&name) else {
                continue;
            };
            let date = match (caps[1].parse::<i32>(), caps[2].parse::<u32>(), caps[3].parse::<u32>()) {
                (Ok(year), Ok(month), Ok(day)) => NaiveDate::from_ymd_opt(year, month, day),
                _ => None,
            };
            let Some(date) = date else {
                continue;
            };
            if from.is_some_and(|from| date < from) {
                continue;
            }

            let mut names = vec![name.clone()];
            match caps.get(4).map(|m| m.as_str()).filter(|rest| !rest.is_empty()) {
                Some(rest) => names.push(rest.to_string()),
                None => names.push(date.format("%b %-d, %Y").to_string()),
            }
            let dir = fs::canonicalize(&path).unwrap_or(path);
            self.candidates.push(ImportCandidate { dir, date, names });
        }
        Ok(())
    }

    /// Drops the candidates an exported library folder corresponds to.
    pub fn mark_exported(&mut self, folder_name: &str) {
        self.candidates.retain(|candidate| !candidate.matches(folder_name));
    }

    pub fn remaining(&self) -> &[ImportCandidate] {
        &self.candidates
    }

    pub fn into_remaining(self) -> Vec<ImportCandidate> {
        self.candidates
    }
}

/// `YYYY<d>MM<d>DD`, optionally followed by a space and a name.
fn dated_folder_pattern(delimiter: &str) -> Result<Regex, regex::Error> {
    let d = regex::escape(delimiter);
    Regex::new(&format!(r"^([0-9]{{4}}){d}([0-9]{{2}}){d}([0-9]{{2}})(?: (.*))?$"))
}

fn subdirectories(dir: &Path) -> Result<Vec<(PathBuf, String)>, ExportError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|err| ExportError::Import {
            path: dir.to_path_buf(),
            source: err.into(),
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        found.push((entry.into_path(), name));
    }
    Ok(found)
}

/// AppleScript telling iPhoto to import `dir`. Importing this way gives the
/// new event the folder's name, which the "Auto Import" folder doesn't.
pub fn import_script(dir: &Path) -> String {
    let escaped = dir.to_string_lossy().replace('\\', "\\\\").replace('"', "\\\"");
    format!("tell application \"iPhoto\"\n    import from \"{escaped}\"\nend tell")
}

/// Runs [`import_script`] through `osascript`.
pub fn import_folder(candidate: &ImportCandidate) -> Result<(), ExportError> {
    info!("Importing {}", candidate.dir.display());
    let import_error = |source| ExportError::Import {
        path: candidate.dir.clone(),
        source,
    };
    let status = Command::new("osascript")
        .arg("-e")
        .arg(import_script(&candidate.dir))
        .status()
        .map_err(import_error)?;
    if !status.success() {
        return Err(import_error(std::io::Error::other(format!("osascript exited with {status}"))));
    }
    Ok(())
}
