//! Single-pass projection of an AlbumData.xml stream into a [`LibraryIndex`].
//!
//! The walker never builds a document tree. It tracks the element depth
//! (`<plist>` is 1, the top `<dict>` 2) and the last top-level `<key>`, and
//! only hands small subtrees to the recursive decoder: one image record, one
//! folder record, or one of the name tables. Everything else, the folder list
//! of the other grouping included, is skipped structurally.

use super::decode::{decode, decode_empty, read_text};
use super::events::{Events, Node, Tag};
use super::filter::FieldFilter;
use crate::error::Corruption;
use crate::library::{FolderRecord, Grouping, ImageRecord, LibraryIndex, IMAGE_FIELDS};
use crate::value::Value;
use log::{debug, warn};
use std::io::BufRead;

/// The only major version whose layout is understood.
pub const SUPPORTED_MAJOR_VERSION: i64 = 2;
/// Newer minor versions are read anyway, with a warning.
pub const SUPPORTED_MINOR_VERSION: i64 = 0;

const MAJOR_VERSION: &str = "Major Version";
const MINOR_VERSION: &str = "Minor Version";
const KEYWORDS: &str = "List of Keywords";
const FACES: &str = "List of Faces";
const MASTER_IMAGE_LIST: &str = "Master Image List";

const FACE_FIELDS: &[&str] = &["name"];

/// Top-level containers that are walked entry by entry instead of decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bulk {
    Images,
    Folders(Grouping),
}

impl Bulk {
    fn for_key(key: &str, grouping: Grouping) -> Option<Bulk> {
        match key {
            MASTER_IMAGE_LIST => Some(Bulk::Images),
            k if k == grouping.list_key() => Some(Bulk::Folders(grouping)),
            _ => None,
        }
    }

    fn container(self) -> Tag {
        match self {
            Bulk::Images => Tag::Dict,
            Bulk::Folders(_) => Tag::Array,
        }
    }

    fn container_name(self) -> &'static str {
        match self {
            Bulk::Images => "dict",
            Bulk::Folders(_) => "array",
        }
    }
}

struct Projector<R> {
    events: Events<R>,
    grouping: Grouping,
    depth: usize,
    top_key: Option<String>,
    bulk: Option<Bulk>,
    image_id: Option<String>,
    saw_major_version: bool,
    saw_images: bool,
    index: LibraryIndex,
}

/// Reads the whole stream, keeping the folders of `grouping` only. Any
/// malformed element, bad literal or unsupported version aborts the
/// projection and nothing is returned.
pub(crate) fn project<R: BufRead>(source: R, grouping: Grouping) -> Result<LibraryIndex, Corruption> {
    let mut projector = Projector {
        events: Events::new(source),
        grouping,
        depth: 0,
        top_key: None,
        bulk: None,
        image_id: None,
        saw_major_version: false,
        saw_images: false,
        index: LibraryIndex::empty(grouping),
    };
    projector.run()?;
    projector.finish()
}

impl<R: BufRead> Projector<R> {
    fn run(&mut self) -> Result<(), Corruption> {
        loop {
            match self.events.next_node()? {
                Node::Open(tag) => {
                    self.depth += 1;
                    self.enter(tag, false)?;
                }
                Node::Leaf(tag) => {
                    self.depth += 1;
                    self.enter(tag, true)?;
                    self.depth -= 1;
                }
                Node::Close(_) => {
                    if self.depth == 3 {
                        self.bulk = None;
                    }
                    self.depth = self.depth.saturating_sub(1);
                }
                Node::Text(_) => {}
                Node::Eof => return Ok(()),
            }
        }
    }

    /// Handles an element that was just opened at `self.depth`. Unless it is
    /// a bulk container, the element is consumed completely, closing tag
    /// included, so for a non-empty element the depth is lowered again here.
    fn enter(&mut self, tag: Tag, empty: bool) -> Result<(), Corruption> {
        match self.depth {
            1 => expect_tag(tag, Tag::Plist, "at the document root"),
            2 => expect_tag(tag, Tag::Dict, "inside <plist>"),
            3 => self.enter_top_level(tag, empty),
            4 => match self.bulk {
                Some(Bulk::Images) => self.enter_image(tag, empty),
                Some(Bulk::Folders(grouping)) => self.enter_folder(grouping, tag, empty),
                None => Err(Corruption::Unexpected {
                    found: tag.to_string(),
                    context: "below a skipped top-level value",
                }),
            },
            _ => Err(Corruption::Unexpected {
                found: tag.to_string(),
                context: "nested inside a bulk container entry",
            }),
        }
    }

    fn enter_top_level(&mut self, tag: Tag, empty: bool) -> Result<(), Corruption> {
        if tag == Tag::Key {
            self.top_key = Some(self.text_of(&tag, empty)?);
            return Ok(());
        }
        let Some(key) = self.top_key.take() else {
            return Err(Corruption::ValueWithoutKey { tag: tag.to_string() });
        };

        if let Some(bulk) = Bulk::for_key(&key, self.grouping) {
            if tag != bulk.container() {
                return Err(Corruption::WrongType {
                    key,
                    expected: bulk.container_name(),
                    found: tag.to_string(),
                });
            }
            if bulk == Bulk::Images {
                self.saw_images = true;
            }
            debug!("Reading {key}");
            if empty {
                return Ok(());
            }
            self.bulk = Some(bulk);
            return Ok(());
        }

        let filter = match key.as_str() {
            MAJOR_VERSION | MINOR_VERSION | KEYWORDS => FieldFilter::all(),
            FACES => FieldFilter::only(FACE_FIELDS),
            _ => {
                if !empty {
                    self.events.skip(&tag)?;
                    self.depth -= 1;
                }
                return Ok(());
            }
        };
        let value = self.value_of(tag, empty, filter)?;
        match key.as_str() {
            MAJOR_VERSION => self.major_version(value),
            MINOR_VERSION => self.minor_version(value),
            KEYWORDS => self.keywords(value),
            _ => self.faces(value),
        }
    }

    fn enter_image(&mut self, tag: Tag, empty: bool) -> Result<(), Corruption> {
        if tag == Tag::Key {
            self.image_id = Some(self.text_of(&tag, empty)?);
            return Ok(());
        }
        let Some(id) = self.image_id.take() else {
            return Err(Corruption::ValueWithoutKey { tag: tag.to_string() });
        };
        let value = self.value_of(tag, empty, FieldFilter::only(IMAGE_FIELDS))?;
        let record = ImageRecord::from_value(&id, value)?;
        self.index.images.insert(id, record);
        Ok(())
    }

    fn enter_folder(&mut self, grouping: Grouping, tag: Tag, empty: bool) -> Result<(), Corruption> {
        let value = self.value_of(tag, empty, FieldFilter::all())?;
        self.index.folders.push(FolderRecord::from_value(grouping, value)?);
        Ok(())
    }

    fn text_of(&mut self, tag: &Tag, empty: bool) -> Result<String, Corruption> {
        if empty {
            return Ok(String::new());
        }
        let text = read_text(&mut self.events, tag)?;
        self.depth -= 1;
        Ok(text)
    }

    fn value_of(&mut self, tag: Tag, empty: bool, filter: FieldFilter<'_>) -> Result<Value, Corruption> {
        if empty {
            return decode_empty(tag);
        }
        let value = decode(&mut self.events, tag, filter)?;
        self.depth -= 1;
        Ok(value)
    }

    fn major_version(&mut self, value: Value) -> Result<(), Corruption> {
        let major = version_number(MAJOR_VERSION, &value)?;
        if major != SUPPORTED_MAJOR_VERSION {
            return Err(Corruption::UnsupportedVersion {
                found: major,
                expected: SUPPORTED_MAJOR_VERSION,
            });
        }
        self.index.version.major = major;
        self.saw_major_version = true;
        Ok(())
    }

    fn minor_version(&mut self, value: Value) -> Result<(), Corruption> {
        let minor = version_number(MINOR_VERSION, &value)?;
        if minor > SUPPORTED_MINOR_VERSION {
            warn!("I don't recognise iPhoto libraries when the minor version is {minor}, but let's try anyway.");
        }
        self.index.version.minor = minor;
        Ok(())
    }

    fn keywords(&mut self, value: Value) -> Result<(), Corruption> {
        let table = match value {
            Value::Mapping(table) => table,
            other => return Err(wrong_type(KEYWORDS, "dict", &other)),
        };
        for (id, name) in table {
            match name {
                Value::Text(name) => {
                    self.index.keywords.insert(id, name);
                }
                other => return Err(wrong_type(&id, "string", &other)),
            }
        }
        debug!("Read {} keywords", self.index.keywords.len());
        Ok(())
    }

    fn faces(&mut self, value: Value) -> Result<(), Corruption> {
        let table = match value {
            Value::Mapping(table) => table,
            other => return Err(wrong_type(FACES, "dict", &other)),
        };
        for (id, face) in table {
            match face.get("name").and_then(Value::as_str) {
                Some(name) => {
                    self.index.faces.insert(id, name.to_string());
                }
                None => debug!("Face #{id} has no name"),
            }
        }
        debug!("Read {} faces", self.index.faces.len());
        Ok(())
    }

    fn finish(self) -> Result<LibraryIndex, Corruption> {
        if self.depth != 0 {
            return Err(Corruption::UnexpectedEof {
                tag: match self.depth {
                    1 => Tag::Plist,
                    _ => Tag::Dict,
                }
                .to_string(),
            });
        }
        if !self.saw_major_version {
            return Err(Corruption::MissingKey {
                key: MAJOR_VERSION.to_string(),
            });
        }
        if !self.saw_images {
            return Err(Corruption::MissingKey {
                key: MASTER_IMAGE_LIST.to_string(),
            });
        }
        Ok(self.index)
    }
}

fn expect_tag(found: Tag, expected: Tag, context: &'static str) -> Result<(), Corruption> {
    if found == expected {
        Ok(())
    } else {
        Err(Corruption::Unexpected {
            found: found.to_string(),
            context,
        })
    }
}

fn version_number(key: &str, value: &Value) -> Result<i64, Corruption> {
    match value {
        Value::Integer(n) => Ok(*n),
        other => Err(wrong_type(key, "integer", other)),
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &Value) -> Corruption {
    Corruption::WrongType {
        key: key.to_string(),
        expected,
        found: found.kind().to_string(),
    }
}
