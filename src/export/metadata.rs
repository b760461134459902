use crate::error::ExifToolError;
use crate::library::{ImageRecord, LibraryIndex};
use std::collections::BTreeSet;
use std::path::Path;

/// Library metadata to store in an exported file.
///
/// Empty strings and a zero rating mean "not set" in iPhoto and are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRequest {
    /// Written as the IPTC headline.
    pub caption: Option<String>,
    /// Written as the XMP rating (1 to 5).
    pub rating: Option<i64>,
    /// Written as the IPTC caption.
    pub comment: Option<String>,
    /// Merged into the IPTC keywords already in the file.
    pub keywords: BTreeSet<String>,
}

impl MetadataRequest {
    pub fn for_image(library: &LibraryIndex, record: &ImageRecord, with_faces: bool) -> Self {
        let mut keywords = library.keyword_names(record);
        if with_faces {
            keywords.extend(library.face_names(record));
        }
        keywords.retain(|keyword| !keyword.is_empty());

        Self {
            caption: non_empty(record.caption()),
            rating: record.rating().filter(|rating| *rating != 0),
            comment: non_empty(record.comment()),
            keywords,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.caption.is_none() && self.rating.is_none() && self.comment.is_none() && self.keywords.is_empty()
    }
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.filter(|text| !text.trim().is_empty()).map(str::to_string)
}

/// Stores a [`MetadataRequest`] in a file, keeping the file's timestamps.
pub trait MetadataWriter {
    fn write_metadata(&mut self, path: &Path, request: &MetadataRequest) -> Result<(), ExifToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Grouping;
    use crate::utils::test_helpers::{album_data, image};

    fn library() -> LibraryIndex {
        let xml = album_data(&format!(
            "<key>List of Keywords</key><dict><key>1</key><string>Beach</string><key>2</key><string></string></dict>
             <key>List of Faces</key><dict><key>4</key><dict><key>name</key><string>Ann</string></dict></dict>
             <key>Master Image List</key><dict>{}{}</dict>",
            image(
                "1",
                "<key>Caption</key><string>Dunes</string><key>Comment</key><string> </string>
                 <key>Rating</key><integer>0</integer>
                 <key>Keywords</key><array><string>1</string><string>2</string></array>
                 <key>Faces</key><array><dict><key>face key</key><integer>4</integer></dict></array>"
            ),
            image("2", "<key>Caption</key><string></string>"),
        ));
        LibraryIndex::from_reader(xml.as_bytes(), Grouping::Events).unwrap()
    }

    #[test]
    fn test_request_drops_unset_values() {
        let library = library();
        let record = library.image_record("1").unwrap();
        let request = MetadataRequest::for_image(&library, record, false);
        assert_eq!(request.caption.as_deref(), Some("Dunes"));
        assert_eq!(request.comment, None);
        assert_eq!(request.rating, None);
        assert_eq!(request.keywords, BTreeSet::from(["Beach".to_string()]));
    }

    #[test]
    fn test_faces_become_keywords() {
        let library = library();
        let record = library.image_record("1").unwrap();
        let request = MetadataRequest::for_image(&library, record, true);
        assert_eq!(request.keywords, BTreeSet::from(["Ann".to_string(), "Beach".to_string()]));
    }

    #[test]
    fn test_empty_request() {
        let library = library();
        let record = library.image_record("2").unwrap();
        assert!(MetadataRequest::for_image(&library, record, true).is_empty());
        assert!(!MetadataRequest {
            rating: Some(3),
            ..MetadataRequest::default()
        }
        .is_empty());
    }
}
