use super::copy::{copy_preserving_mtime, is_unchanged, FileStamp};
use super::import::{import_folder, MissingFolderImport};
use super::metadata::{MetadataRequest, MetadataWriter};
use super::naming::{Deconflicter, FolderNamer};
use super::options::ExportOptions;
use crate::error::ExportError;
use crate::library::{FolderRecord, LibraryIndex};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// What happened during one export run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub folders: usize,
    pub copied: usize,
    pub skipped: usize,
    pub metadata_written: usize,
    pub failed: usize,
    pub imported: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Copied { metadata: bool },
    Skipped,
}

/// Copies every image of a library into a folder tree under `dest`.
///
/// The destination doubles as the record of earlier runs: copies that look
/// up to date are left alone, so running an export again only copies what
/// changed.
pub struct Exporter<'a> {
    library: &'a LibraryIndex,
    dest: PathBuf,
    options: ExportOptions,
    namer: FolderNamer,
    deconflicter: Deconflicter,
    metadata_writer: Option<&'a mut dyn MetadataWriter>,
}

impl std::fmt::Debug for Exporter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("library", &self.library)
            .field("dest", &self.dest)
            .field("options", &self.options)
            .field("namer", &self.namer)
            .field("deconflicter", &self.deconflicter)
            .field("metadata_writer", &self.metadata_writer.is_some())
            .finish()
    }
}

/// Output directory of one folder, created when its first image needs it.
#[derive(Debug)]
struct FolderDir {
    path: PathBuf,
    ready: bool,
}

impl FolderDir {
    fn new(path: PathBuf) -> Self {
        let ready = path.exists();
        Self { path, ready }
    }

    /// Creates the directory unless it exists or was already handled. In a dry
    /// run it is only logged, once.
    fn ensure(&mut self, dry_run: bool) -> Result<(), ExportError> {
        if self.ready {
            return Ok(());
        }
        if dry_run {
            info!("Would create {}", self.path.display());
        } else {
            fs::create_dir_all(&self.path).map_err(|source| ExportError::CreateDir {
                path: self.path.clone(),
                source,
            })?;
            info!("Created {}", self.path.display());
        }
        self.ready = true;
        Ok(())
    }
}

impl<'a> Exporter<'a> {
    /// Fails when `library` was read for another grouping than
    /// [`ExportOptions::grouping`].
    pub fn new(library: &'a LibraryIndex, dest: impl Into<PathBuf>, options: ExportOptions) -> Result<Self, ExportError> {
        if library.grouping() != options.grouping {
            return Err(ExportError::GroupingMismatch {
                library: library.grouping(),
                requested: options.grouping,
            });
        }
        Ok(Self {
            library,
            dest: dest.into(),
            namer: FolderNamer::new(&options)?,
            options,
            deconflicter: Deconflicter::new(),
            metadata_writer: None,
        })
    }

    /// Used to store metadata when [`ExportOptions::metadata`] is on.
    pub fn with_metadata_writer(mut self, writer: &'a mut dyn MetadataWriter) -> Self {
        self.metadata_writer = Some(writer);
        self
    }

    /// Exports everything. Only an unusable destination stops the run; every
    /// other failure is logged and counted against the image it happened to.
    pub fn run(mut self) -> Result<ExportSummary, ExportError> {
        if !self.options.dry_run {
            self.check_destination()?;
        }
        let mut import = if self.options.import_missing {
            Some(MissingFolderImport::scan(&self.dest, &self.options)?)
        } else {
            None
        };

        let library = self.library;
        let grouping = self.options.grouping;
        let total = library.folders(grouping).count();
        let mut summary = ExportSummary::default();

        // Empty folders claim their directory too.
        for folder in library.folders(grouping) {
            summary.folders += 1;
            info!(
                "Processing {} of {}: {} ({} images)",
                summary.folders,
                total,
                folder.name(),
                folder.image_ids().len()
            );
            let mut dir = FolderDir::new(self.folder_dir(folder));

            for id in folder.image_ids() {
                match self.export_image(&mut dir, id) {
                    Ok(Outcome::Copied { metadata }) => {
                        summary.copied += 1;
                        if metadata {
                            summary.metadata_written += 1;
                        }
                    }
                    Ok(Outcome::Skipped) => summary.skipped += 1,
                    Err(err) => {
                        warn!("{err}");
                        summary.failed += 1;
                    }
                }
            }
        }

        if let Some(mut import) = import.take() {
            for folder in library.folders(grouping) {
                import.mark_exported(folder.name());
            }
            for candidate in import.into_remaining() {
                if self.options.dry_run {
                    info!("Would import {}", candidate.dir.display());
                    continue;
                }
                match import_folder(&candidate) {
                    Ok(()) => summary.imported += 1,
                    Err(err) => warn!("{err}"),
                }
            }
        }

        info!(
            "Exported {} images from {} folders: {} copied, {} unchanged, {} with metadata, {} failed",
            summary.copied + summary.skipped,
            summary.folders,
            summary.copied,
            summary.skipped,
            summary.metadata_written,
            summary.failed
        );
        Ok(summary)
    }

    /// Creates the destination and makes sure files can be written to it.
    fn check_destination(&self) -> Result<(), ExportError> {
        let unusable = |source| ExportError::Destination {
            path: self.dest.clone(),
            source,
        };
        fs::create_dir_all(&self.dest).map_err(unusable)?;
        tempfile::tempfile_in(&self.dest).map_err(unusable)?;
        Ok(())
    }

    fn folder_dir(&mut self, folder: &FolderRecord) -> PathBuf {
        let dir = self.dest.join(self.namer.relative_dir(folder));
        if self.options.deconflict {
            self.deconflicter.claim_dir(&dir)
        } else {
            dir
        }
    }

    fn export_image(&mut self, dir: &mut FolderDir, id: &str) -> Result<Outcome, ExportError> {
        let library = self.library;
        let record = library.image_record(id)?;
        let source = record
            .source_path(self.options.originals)
            .map(Path::new)
            .ok_or_else(|| ExportError::MissingImagePath { id: id.to_string() })?;
        let file_name = source
            .file_name()
            .ok_or_else(|| ExportError::MissingImagePath { id: id.to_string() })?;
        let target = if self.options.deconflict {
            self.deconflicter.claim_file(&dir.path, file_name)
        } else {
            dir.path.join(file_name)
        };

        dir.ensure(self.options.dry_run)?;
        if !source.exists() {
            return Err(ExportError::MissingSource {
                path: source.to_path_buf(),
            });
        }

        // Metadata can't be compared, so with metadata on everything is copied.
        if !self.options.metadata && target.exists() {
            let unchanged = is_unchanged(
                &FileStamp::of(source)?,
                &FileStamp::of(&target)?,
                self.options.ignore_time_delta,
            );
            if unchanged {
                debug!("Unchanged {}", target.display());
                return Ok(Outcome::Skipped);
            }
        }

        if self.options.dry_run {
            info!("Would copy {} to {}", source.display(), target.display());
        } else {
            copy_preserving_mtime(source, &target)?;
            debug!("Copied {} to {}", source.display(), target.display());
        }

        let metadata = self.options.metadata && self.write_metadata(id, &target);
        Ok(Outcome::Copied { metadata })
    }

    /// True when metadata was written. Failing to write it doesn't fail the
    /// image.
    fn write_metadata(&mut self, id: &str, target: &Path) -> bool {
        let library = self.library;
        let Ok(record) = library.image_record(id) else {
            return false;
        };
        let request = MetadataRequest::for_image(library, record, self.options.faces);
        if request.is_empty() {
            return false;
        }
        if self.options.dry_run {
            debug!("Would write {request:?} to {}", target.display());
            return false;
        }
        let Some(writer) = self.metadata_writer.as_deref_mut() else {
            return false;
        };
        match writer.write_metadata(target, &request) {
            Ok(()) => true,
            Err(source) => {
                let err = ExportError::Metadata {
                    path: target.to_path_buf(),
                    source,
                };
                warn!("{err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExifToolError;
    use crate::library::Grouping;
    use crate::utils::test_helpers::{album, album_data, image, list_files_recursive, roll};
    use assert_matches::assert_matches;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        library: LibraryIndex,
    }

    impl Fixture {
        /// `files` are created under `<tmp>/src`, `{src}` in `body` expands to
        /// that directory.
        fn new(files: &[&str], body: &str) -> Self {
            Self::grouped(Grouping::Events, files, body)
        }

        fn grouped(grouping: Grouping, files: &[&str], body: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let src = dir.path().join("src");
            for file in files {
                let path = src.join(file);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, format!("contents of {file}")).unwrap();
            }
            let xml = album_data(&body.replace("{src}", &src.to_string_lossy()));
            let library = LibraryIndex::from_reader(xml.as_bytes(), grouping).unwrap();
            Self { dir, library }
        }

        fn dest(&self) -> PathBuf {
            self.dir.path().join("out")
        }

        fn exported(&self) -> BTreeSet<String> {
            let dest = self.dest();
            list_files_recursive(&dest)
                .unwrap()
                .into_iter()
                .map(|path| path.strip_prefix(&dest).unwrap().to_string_lossy().replace('\\', "/"))
                .collect()
        }

        fn run(&self, options: ExportOptions) -> ExportSummary {
            Exporter::new(&self.library, self.dest(), options).unwrap().run().unwrap()
        }
    }

    fn path_of(file: &str) -> String {
        format!("<key>ImagePath</key><string>{{src}}/{file}</string>")
    }

    fn two_events() -> Fixture {
        Fixture::new(
            &["a.jpg", "b.jpg", "c.jpg"],
            &format!(
                "<key>List of Rolls</key><array>{}{}</array><key>Master Image List</key><dict>{}{}{}</dict>",
                roll("Summer", 0.0, &["1", "2"]),
                roll("Jan 2, 2001", 86400.0, &["3"]),
                image("1", &path_of("a.jpg")),
                image("2", &path_of("b.jpg")),
                image("3", &path_of("c.jpg")),
            ),
        )
    }

    #[derive(Default)]
    struct RecordingWriter {
        written: Vec<(PathBuf, MetadataRequest)>,
        fail: bool,
    }

    impl MetadataWriter for RecordingWriter {
        fn write_metadata(&mut self, path: &Path, request: &MetadataRequest) -> Result<(), ExifToolError> {
            if self.fail {
                return Err(ExifToolError::ProcessTerminated);
            }
            self.written.push((path.to_path_buf(), request.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_export_events() {
        let fixture = two_events();
        let summary = fixture.run(ExportOptions::default());
        assert_eq!(summary.folders, 2);
        assert_eq!(summary.copied, 3);
        assert_eq!(
            fixture.exported(),
            BTreeSet::from([
                "2001-01-01 Summer/a.jpg".to_string(),
                "2001-01-01 Summer/b.jpg".to_string(),
                "2001-01-02/c.jpg".to_string(),
            ])
        );
        let copied = fs::read_to_string(fixture.dest().join("2001-01-01 Summer/a.jpg")).unwrap();
        assert_eq!(copied, "contents of a.jpg");
    }

    #[test]
    fn test_second_run_copies_nothing() {
        let fixture = two_events();
        fixture.run(ExportOptions::default());
        let summary = fixture.run(ExportOptions::default());
        assert_eq!(summary.copied, 0);
        assert_eq!(summary.skipped, 3);
    }

    #[test]
    fn test_dry_run_leaves_destination_alone() {
        let fixture = two_events();
        let summary = fixture.run(ExportOptions {
            dry_run: true,
            ..ExportOptions::default()
        });
        assert_eq!(summary.copied, 3);
        assert!(!fixture.dest().exists());
    }

    #[test]
    fn test_year_dirs() {
        let fixture = two_events();
        fixture.run(ExportOptions {
            year_dirs: true,
            ..ExportOptions::default()
        });
        assert!(fixture.exported().contains("2001/2001-01-02/c.jpg"));
    }

    #[test]
    fn test_deconflict_folders_and_files() {
        let fixture = Fixture::new(
            &["x/IMG.jpg", "y/IMG.jpg", "z/IMG.jpg"],
            &format!(
                "<key>List of Rolls</key><array>{}{}</array><key>Master Image List</key><dict>{}{}{}</dict>",
                roll("Trip", 0.0, &["1", "2"]),
                roll("Trip", 0.0, &["3"]),
                image("1", &path_of("x/IMG.jpg")),
                image("2", &path_of("y/IMG.jpg")),
                image("3", &path_of("z/IMG.jpg")),
            ),
        );
        let summary = fixture.run(ExportOptions {
            deconflict: true,
            ..ExportOptions::default()
        });
        assert_eq!(summary.copied, 3);
        assert_eq!(
            fixture.exported(),
            BTreeSet::from([
                "2001-01-01 Trip/IMG.jpg".to_string(),
                "2001-01-01 Trip/01_IMG.jpg".to_string(),
                "2001-01-01 Trip 01/IMG.jpg".to_string(),
            ])
        );
    }

    #[test]
    fn test_album_mode_with_originals() {
        let fixture = Fixture::grouped(
            Grouping::Albums,
            &["mod/a.jpg", "orig/a.jpg", "b.jpg"],
            &format!(
                "<key>List of Albums</key><array>{}{}</array><key>Master Image List</key><dict>{}{}</dict>",
                album("Favourites", "Regular", &["1"]),
                album("Smart", "Smart", &["2"]),
                image(
                    "1",
                    "<key>ImagePath</key><string>{src}/mod/a.jpg</string><key>OriginalPath</key><string>{src}/orig/a.jpg</string>"
                ),
                image("2", &path_of("b.jpg")),
            ),
        );
        fixture.run(ExportOptions {
            grouping: Grouping::Albums,
            originals: true,
            ..ExportOptions::default()
        });
        assert_eq!(fixture.exported(), BTreeSet::from(["Favourites/a.jpg".to_string()]));
        let copied = fs::read_to_string(fixture.dest().join("Favourites/a.jpg")).unwrap();
        assert_eq!(copied, "contents of orig/a.jpg");
    }

    #[test]
    fn test_failures_are_per_image() {
        let fixture = Fixture::new(
            &["a.jpg"],
            &format!(
                "<key>List of Rolls</key><array>{}</array><key>Master Image List</key><dict>{}{}{}</dict>",
                roll("Mixed", 0.0, &["1", "404", "2", "3"]),
                image("1", &path_of("a.jpg")),
                image("2", &path_of("gone.jpg")),
                image("3", "<key>Caption</key><string>no path</string>"),
            ),
        );
        let summary = fixture.run(ExportOptions::default());
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.failed, 3);
    }

    #[test]
    fn test_metadata_is_written_to_copies() {
        let fixture = Fixture::new(
            &["a.jpg", "b.jpg"],
            &format!(
                "<key>List of Keywords</key><dict><key>7</key><string>Sea</string></dict>
                 <key>List of Rolls</key><array>{}</array><key>Master Image List</key><dict>{}{}</dict>",
                roll("Beach", 0.0, &["1", "2"]),
                image(
                    "1",
                    &format!(
                        "{}<key>Rating</key><integer>5</integer><key>Keywords</key><array><string>7</string></array>",
                        path_of("a.jpg")
                    )
                ),
                image("2", &path_of("b.jpg")),
            ),
        );
        let options = ExportOptions {
            metadata: true,
            ..ExportOptions::default()
        };
        let mut writer = RecordingWriter::default();
        let summary = Exporter::new(&fixture.library, fixture.dest(), options.clone())
            .unwrap()
            .with_metadata_writer(&mut writer)
            .run()
            .unwrap();
        assert_eq!(summary.copied, 2);
        assert_eq!(summary.metadata_written, 1);
        assert_eq!(writer.written.len(), 1);
        let (path, request) = &writer.written[0];
        assert_eq!(path, &fixture.dest().join("2001-01-01 Beach/a.jpg"));
        assert_eq!(request.rating, Some(5));
        assert_eq!(request.keywords, BTreeSet::from(["Sea".to_string()]));

        // With metadata on, nothing counts as unchanged.
        let again = fixture.run(options);
        assert_eq!(again.copied, 2);
        assert_eq!(again.skipped, 0);
    }

    #[test]
    fn test_metadata_failure_keeps_the_copy() {
        let fixture = Fixture::new(
            &["a.jpg"],
            &format!(
                "<key>List of Rolls</key><array>{}</array><key>Master Image List</key><dict>{}</dict>",
                roll("Beach", 0.0, &["1"]),
                image("1", &format!("{}<key>Caption</key><string>Hi</string>", path_of("a.jpg"))),
            ),
        );
        let mut writer = RecordingWriter {
            fail: true,
            ..RecordingWriter::default()
        };
        let summary = Exporter::new(
            &fixture.library,
            fixture.dest(),
            ExportOptions {
                metadata: true,
                ..ExportOptions::default()
            },
        )
        .unwrap()
        .with_metadata_writer(&mut writer)
        .run()
        .unwrap();
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.metadata_written, 0);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_unusable_destination() {
        let fixture = two_events();
        fs::write(fixture.dest(), b"not a directory").unwrap();
        let result = Exporter::new(&fixture.library, fixture.dest(), ExportOptions::default())
            .unwrap()
            .run();
        assert_matches!(result, Err(ExportError::Destination { .. }));
    }

    #[test]
    fn test_import_skips_known_folders_in_dry_run() {
        let fixture = two_events();
        fs::create_dir_all(fixture.dest().join("2001-01-02")).unwrap();
        fs::create_dir_all(fixture.dest().join("2005-05-05 Elsewhere")).unwrap();
        let summary = fixture.run(ExportOptions {
            import_missing: true,
            dry_run: true,
            ..ExportOptions::default()
        });
        assert_eq!(summary.imported, 0);
        let mut scan = MissingFolderImport::scan(&fixture.dest(), &ExportOptions::default()).unwrap();
        for folder in fixture.library.folders(Grouping::Events) {
            scan.mark_exported(folder.name());
        }
        let remaining: Vec<_> = scan.remaining().iter().map(|c| c.names[0].clone()).collect();
        assert_eq!(remaining, vec!["2005-05-05 Elsewhere".to_string()]);
    }

    #[test]
    fn test_empty_folders_take_part_in_deconfliction() {
        let fixture = Fixture::new(
            &["a.jpg"],
            &format!(
                "<key>List of Rolls</key><array>{}{}</array><key>Master Image List</key><dict>{}</dict>",
                roll("Trip", 0.0, &[]),
                roll("Trip", 0.0, &["1"]),
                image("1", &path_of("a.jpg")),
            ),
        );
        let summary = fixture.run(ExportOptions {
            deconflict: true,
            ..ExportOptions::default()
        });
        assert_eq!(summary.folders, 2);
        assert_eq!(fixture.exported(), BTreeSet::from(["2001-01-01 Trip 01/a.jpg".to_string()]));
        assert!(!fixture.dest().join("2001-01-01 Trip").exists());
    }

    #[test]
    fn test_folder_dir_is_handled_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2001-01-01 Trip");

        let mut dry = FolderDir::new(path.clone());
        dry.ensure(true).unwrap();
        assert!(dry.ready);
        assert!(!path.exists());

        let mut real = FolderDir::new(path.clone());
        assert!(!real.ready);
        real.ensure(false).unwrap();
        assert!(path.is_dir());
        assert!(FolderDir::new(path).ready);
    }

    #[test]
    fn test_library_grouping_must_match() {
        let fixture = two_events();
        let result = Exporter::new(
            &fixture.library,
            fixture.dest(),
            ExportOptions {
                grouping: Grouping::Albums,
                ..ExportOptions::default()
            },
        );
        assert_matches!(
            result,
            Err(ExportError::GroupingMismatch {
                library: Grouping::Events,
                requested: Grouping::Albums
            })
        );
    }
}
