use super::Grouping;
use crate::error::Corruption;
use crate::value::{Mapping, Value};
use chrono::{DateTime, Utc};

/// Image fields kept from the Master Image List; everything else is dropped
/// while decoding. `face key` is the one field read from inside `Faces`.
pub const IMAGE_FIELDS: &[&str] = &[
    "OriginalPath",
    "ImagePath",
    "Rating",
    "Keywords",
    "Caption",
    "Comment",
    "Faces",
    "face key",
];

/// `Album Type` of user albums, the only kind exported in album mode.
pub const REGULAR_ALBUM: &str = "Regular";

/// An event ("roll") or album.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderRecord {
    name: String,
    date: Option<DateTime<Utc>>,
    image_ids: Vec<String>,
    kind: Option<String>,
}

impl FolderRecord {
    pub fn new(name: impl Into<String>, date: Option<DateTime<Utc>>, image_ids: Vec<String>, kind: Option<String>) -> Self {
        Self {
            name: name.into(),
            date,
            image_ids,
            kind,
        }
    }

    pub(crate) fn from_value(grouping: Grouping, value: Value) -> Result<Self, Corruption> {
        let (name_key, date_key, kind_key) = match grouping {
            Grouping::Events => ("RollName", Some("RollDateAsTimerInterval"), None),
            Grouping::Albums => ("AlbumName", None, Some("Album Type")),
        };
        let fields = match value {
            Value::Mapping(fields) => fields,
            other => {
                return Err(Corruption::WrongType {
                    key: grouping.list_key().to_string(),
                    expected: "dict",
                    found: other.kind().to_string(),
                })
            }
        };

        let name = match fields.get(name_key) {
            Some(value) => value.to_id().ok_or_else(|| wrong_type(name_key, "string", value))?,
            None => {
                return Err(Corruption::MissingKey {
                    key: name_key.to_string(),
                })
            }
        };

        let date = match date_key.and_then(|key| fields.get(key).map(|v| (key, v))) {
            Some((key, value)) => Some(value.as_timestamp().ok_or_else(|| wrong_type(key, "real", value))?),
            None => None,
        };

        let kind = match kind_key.and_then(|key| fields.get(key).map(|v| (key, v))) {
            Some((key, value)) => Some(value.as_str().ok_or_else(|| wrong_type(key, "string", value))?.to_string()),
            None => None,
        };

        let image_ids = match fields.get("KeyList") {
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|item| item.to_id().ok_or_else(|| wrong_type("KeyList", "string", item)))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => return Err(wrong_type("KeyList", "array", other)),
            None => Vec::new(),
        };

        Ok(Self {
            name,
            date,
            image_ids,
            kind,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation date; events have one, albums don't.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    /// Image ids in display order.
    pub fn image_ids(&self) -> &[String] {
        &self.image_ids
    }

    /// `Album Type` for albums, `None` for events.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &Value) -> Corruption {
    Corruption::WrongType {
        key: key.to_string(),
        expected,
        found: found.kind().to_string(),
    }
}

/// The projected fields of one Master Image List entry.
///
/// A missing field and an empty one are different things: `caption()` is
/// `None` when the library has no caption and `Some("")` when it has an empty
/// one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageRecord {
    fields: Mapping,
}

impl ImageRecord {
    pub fn new(fields: Mapping) -> Self {
        Self { fields }
    }

    pub(crate) fn from_value(id: &str, value: Value) -> Result<Self, Corruption> {
        match value {
            Value::Mapping(fields) => Ok(Self { fields }),
            other => Err(Corruption::WrongType {
                key: id.to_string(),
                expected: "dict",
                found: other.kind().to_string(),
            }),
        }
    }

    pub fn fields(&self) -> &Mapping {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Current (possibly edited) image.
    pub fn image_path(&self) -> Option<&str> {
        self.text("ImagePath")
    }

    /// Unedited original; only present for edited images.
    pub fn original_path(&self) -> Option<&str> {
        self.text("OriginalPath")
    }

    /// The file to export. Either path is used when the preferred one is
    /// missing, which happens in damaged libraries.
    pub fn source_path(&self, prefer_original: bool) -> Option<&str> {
        if prefer_original {
            self.original_path().or_else(|| self.image_path())
        } else {
            self.image_path().or_else(|| self.original_path())
        }
    }

    pub fn rating(&self) -> Option<i64> {
        self.get("Rating").and_then(Value::as_i64)
    }

    pub fn caption(&self) -> Option<&str> {
        self.text("Caption")
    }

    pub fn comment(&self) -> Option<&str> {
        self.text("Comment")
    }

    pub fn keyword_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.get("Keywords")
            .and_then(Value::as_sequence)
            .unwrap_or_default()
            .iter()
            .filter_map(Value::to_id)
    }

    /// Face ids from the `face key` of each `Faces` entry.
    pub fn face_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.get("Faces")
            .and_then(Value::as_sequence)
            .unwrap_or_default()
            .iter()
            .filter_map(|face| face.get("face key"))
            .filter_map(Value::to_id)
    }
}
