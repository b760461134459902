//! # iPhoto export
//!
//! Copies the photos of an iPhoto library into a plain folder tree, one
//! folder per event or album, optionally writing the library's captions,
//! ratings and keywords into the copies.
//!
//! Libraries can hold hundreds of thousands of images, so `AlbumData.xml` is
//! never loaded as a whole. A streaming projector reads it once and keeps
//! only the folders, the image fields the export uses, and the keyword and
//! face names.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use iphoto_export::{ExportError, ExportOptions, Exporter, Grouping, LibraryIndex};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ExportError> {
//!     let library = LibraryIndex::open(Path::new("Pictures/iPhoto Library"), Grouping::Events)?;
//!
//!     for (folder, id) in library.enumerate(Grouping::Events).take(5) {
//!         let record = library.image_record(id)?;
//!         println!("{}: {:?}", folder.name(), record.image_path());
//!     }
//!
//!     let options = ExportOptions {
//!         year_dirs: true,
//!         ..ExportOptions::default()
//!     };
//!     let summary = Exporter::new(&library, "/Volumes/Backup/Photos", options)?.run()?;
//!     println!("{} copied, {} unchanged", summary.copied, summary.skipped);
//!     Ok(())
//! }
//! ```
//!
//! Writing metadata needs a [`MetadataWriter`]; [`ExifTool`] is one:
//!
//! ```no_run
//! use iphoto_export::{ExifTool, ExportOptions, Exporter, Grouping, LibraryIndex};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let library = LibraryIndex::open(Path::new("Pictures/iPhoto Library"), Grouping::Events)?;
//!     let mut exiftool = ExifTool::new()?;
//!     let options = ExportOptions {
//!         metadata: true,
//!         faces: true,
//!         ..ExportOptions::default()
//!     };
//!     Exporter::new(&library, "export", options)?
//!         .with_metadata_writer(&mut exiftool)
//!         .run()?;
//!     Ok(())
//! }
//! ```

mod error;
mod exiftool;
pub mod export;
pub mod library;
pub mod plist;
pub mod value;

pub use error::{Corruption, ExifToolError, ExportError, LibraryError};
pub use exiftool::ExifTool;
pub use export::{ExportOptions, ExportSummary, Exporter, MetadataRequest, MetadataWriter};
pub use library::{FolderRecord, Grouping, ImageRecord, LibraryIndex, LibraryVersion};
pub use value::{Mapping, Value};

mod utils;
