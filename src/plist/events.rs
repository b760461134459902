use crate::error::Corruption;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use std::fmt;
use std::io::BufRead;

/// Element names of the plist dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tag {
    Plist,
    Dict,
    Array,
    Key,
    String,
    Integer,
    Real,
    True,
    False,
    Date,
    Data,
    Other(String),
}

impl Tag {
    fn from_name(name: &[u8]) -> Tag {
        match name {
            b"plist" => Tag::Plist,
            b"dict" => Tag::Dict,
            b"array" => Tag::Array,
            b"key" => Tag::Key,
            b"string" => Tag::String,
            b"integer" => Tag::Integer,
            b"real" => Tag::Real,
            b"true" => Tag::True,
            b"false" => Tag::False,
            b"date" => Tag::Date,
            b"data" => Tag::Data,
            other => Tag::Other(String::from_utf8_lossy(other).into_owned()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        match self {
            Tag::Plist => "plist",
            Tag::Dict => "dict",
            Tag::Array => "array",
            Tag::Key => "key",
            Tag::String => "string",
            Tag::Integer => "integer",
            Tag::Real => "real",
            Tag::True => "true",
            Tag::False => "false",
            Tag::Date => "date",
            Tag::Data => "data",
            Tag::Other(name) => name,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One structural step through the document, detached from the read buffer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    /// `<tag>`
    Open(Tag),
    /// `<tag/>`, which has no matching `Close`.
    Leaf(Tag),
    /// `</tag>`
    Close(Tag),
    /// Character data, unescaped.
    Text(String),
    Eof,
}

/// Forward-only stream of [`Node`]s over an XML document.
pub(crate) struct Events<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> Events<R> {
    pub(crate) fn new(source: R) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::with_capacity(4096),
        }
    }

    pub(crate) fn next_node(&mut self) -> Result<Node, Corruption> {
        loop {
            self.buf.clear();
            let node = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => Node::Open(Tag::from_name(e.name().as_ref())),
                Event::Empty(e) => Node::Leaf(Tag::from_name(e.name().as_ref())),
                Event::End(e) => Node::Close(Tag::from_name(e.name().as_ref())),
                Event::Text(e) => Node::Text(e.unescape()?.into_owned()),
                Event::CData(e) => Node::Text(String::from_utf8(e.into_inner().into_owned())?),
                Event::Eof => Node::Eof,
                // Declaration, doctype, comments and processing instructions.
                _ => continue,
            };
            return Ok(node);
        }
    }

    /// Consumes everything up to and including the `</tag>` closing an element
    /// whose `<tag>` was just read, without decoding any of it.
    pub(crate) fn skip(&mut self, tag: &Tag) -> Result<(), Corruption> {
        self.buf.clear();
        self.reader
            .read_to_end_into(QName(tag.name().as_bytes()), &mut self.buf)?;
        Ok(())
    }
}
