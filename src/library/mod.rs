//! The in-memory view of an iPhoto library built from one pass over
//! AlbumData.xml.

mod records;

pub use records::{FolderRecord, ImageRecord, IMAGE_FIELDS, REGULAR_ALBUM};

use crate::error::LibraryError;
use crate::plist::{projector, NulStripper};
use indexmap::IndexMap;
use log::{info, warn};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Name of the catalog file inside an iPhoto library directory.
pub const ALBUM_DATA_FILE: &str = "AlbumData.xml";

/// How images are grouped into output folders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Grouping {
    /// Events ("rolls"): one folder per import batch, with a date.
    #[default]
    Events,
    /// User albums. Only albums of the regular kind are exported.
    Albums,
}

impl Grouping {
    /// The top-level AlbumData.xml key listing the folders of this grouping.
    pub fn list_key(self) -> &'static str {
        match self {
            Grouping::Events => "List of Rolls",
            Grouping::Albums => "List of Albums",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryVersion {
    pub major: i64,
    pub minor: i64,
}

/// Everything the exporter needs from an iPhoto library.
///
/// Built once by [`LibraryIndex::open`] or [`LibraryIndex::from_reader`] and
/// read-only afterwards. Construction either succeeds completely or returns an
/// error; a half-built index is never handed out.
///
/// Only the folders of the grouping chosen at construction are read; the
/// other folder list isn't even decoded.
#[derive(Debug)]
pub struct LibraryIndex {
    pub(crate) version: LibraryVersion,
    pub(crate) grouping: Grouping,
    pub(crate) folders: Vec<FolderRecord>,
    pub(crate) keywords: IndexMap<String, String>,
    pub(crate) faces: IndexMap<String, String>,
    pub(crate) images: HashMap<String, ImageRecord>,
}

impl LibraryIndex {
    pub(crate) fn empty(grouping: Grouping) -> Self {
        Self {
            version: LibraryVersion::default(),
            grouping,
            folders: Vec::new(),
            keywords: IndexMap::new(),
            faces: IndexMap::new(),
            images: HashMap::new(),
        }
    }

    /// Reads `AlbumData.xml` from an iPhoto library directory.
    pub fn open(library_dir: &Path, grouping: Grouping) -> Result<Self, LibraryError> {
        let path = library_dir.join(ALBUM_DATA_FILE);
        let file = File::open(&path).map_err(|source| LibraryError::Open {
            path: path.clone(),
            source,
        })?;
        info!("Parsing iPhoto Library data from {}", path.display());
        let index = Self::from_reader(file, grouping)?;
        info!(
            "Parsed {} images and {} {}",
            index.images.len(),
            index.folders.len(),
            match grouping {
                Grouping::Events => "events",
                Grouping::Albums => "albums",
            }
        );
        Ok(index)
    }

    /// Projects an AlbumData.xml document. NUL bytes in the stream are ignored.
    pub fn from_reader<R: Read>(source: R, grouping: Grouping) -> Result<Self, LibraryError> {
        let mut stripper = NulStripper::new(source);
        let index = projector::project(BufReader::new(&mut stripper), grouping)?;
        if stripper.stripped() > 0 {
            warn!("Ignored {} NUL bytes in AlbumData.xml", stripper.stripped());
        }
        Ok(index)
    }

    pub fn version(&self) -> LibraryVersion {
        self.version
    }

    /// The grouping whose folders were read.
    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Folders of `grouping` in document order, without the non-regular
    /// albums when grouping by album. Empty unless `grouping` is the one the
    /// index was read with.
    pub fn folders(&self, grouping: Grouping) -> impl Iterator<Item = &FolderRecord> + '_ {
        let folders: &[FolderRecord] = if grouping == self.grouping { &self.folders } else { &[] };
        folders
            .iter()
            .filter(move |folder| grouping == Grouping::Events || folder.kind() == Some(REGULAR_ALBUM))
    }

    /// Every `(folder, image id)` pair of `grouping`, folders in document
    /// order and images in the folder's own order. Call again to restart.
    pub fn enumerate(&self, grouping: Grouping) -> impl Iterator<Item = (&FolderRecord, &str)> + '_ {
        self.folders(grouping)
            .flat_map(|folder| folder.image_ids().iter().map(move |id| (folder, id.as_str())))
    }

    /// Fails when a folder references an image missing from the Master Image
    /// List, which means the library is inconsistent.
    pub fn image_record(&self, id: &str) -> Result<&ImageRecord, LibraryError> {
        self.images
            .get(id)
            .ok_or_else(|| LibraryError::ImageNotFound { id: id.to_string() })
    }

    pub fn keyword_name(&self, id: &str) -> Result<&str, LibraryError> {
        self.keywords
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| LibraryError::KeywordNotFound { id: id.to_string() })
    }

    pub fn face_name(&self, id: &str) -> Result<&str, LibraryError> {
        self.faces
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| LibraryError::FaceNotFound { id: id.to_string() })
    }

    /// Keyword names of an image. Unknown keyword ids are common in real
    /// libraries and become a placeholder instead of an error.
    pub fn keyword_names(&self, record: &ImageRecord) -> BTreeSet<String> {
        record
            .keyword_ids()
            .map(|id| match self.keyword_name(&id) {
                Ok(name) => name.to_string(),
                Err(err) => {
                    warn!("{err}");
                    format!("Unknown keyword {id}")
                }
            })
            .collect()
    }

    /// Names of the faces tagged in an image, with the same placeholder rule
    /// as [`LibraryIndex::keyword_names`].
    pub fn face_names(&self, record: &ImageRecord) -> BTreeSet<String> {
        record
            .face_ids()
            .map(|id| match self.face_name(&id) {
                Ok(name) => name.to_string(),
                Err(err) => {
                    warn!("{err}");
                    format!("Unknown face {id}")
                }
            })
            .collect()
    }
}
