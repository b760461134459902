//! Recursive-descent decoding of an isolated plist subtree into a [`Value`].

use super::events::{Events, Node, Tag};
use super::filter::FieldFilter;
use crate::error::Corruption;
use crate::value::{apple_date, Mapping, Value};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use std::io::BufRead;

/// Decodes the element whose opening `<tag>` has just been read, consuming
/// events up to and including its closing tag.
pub(crate) fn decode<R: BufRead>(
    events: &mut Events<R>,
    tag: Tag,
    filter: FieldFilter<'_>,
) -> Result<Value, Corruption> {
    match tag {
        Tag::Array => decode_array(events, filter),
        Tag::Dict => decode_dict(events, filter),
        Tag::String
        | Tag::Integer
        | Tag::Real
        | Tag::True
        | Tag::False
        | Tag::Date
        | Tag::Data => {
            let text = read_text(events, &tag)?;
            scalar(tag, text)
        }
        other => Err(not_a_value(other)),
    }
}

/// Decodes a self-closing `<tag/>`.
pub(crate) fn decode_empty(tag: Tag) -> Result<Value, Corruption> {
    match tag {
        Tag::Array => Ok(Value::Sequence(Vec::new())),
        Tag::Dict => Ok(Value::Mapping(Mapping::new())),
        Tag::String
        | Tag::Integer
        | Tag::Real
        | Tag::True
        | Tag::False
        | Tag::Date
        | Tag::Data => scalar(tag, String::new()),
        other => Err(not_a_value(other)),
    }
}

/// Collects the character data of a scalar element up to its closing tag.
pub(crate) fn read_text<R: BufRead>(events: &mut Events<R>, tag: &Tag) -> Result<String, Corruption> {
    let mut text = String::new();
    loop {
        match events.next_node()? {
            Node::Text(chunk) => text.push_str(&chunk),
            Node::Close(_) => return Ok(text),
            Node::Open(child) | Node::Leaf(child) => {
                return Err(Corruption::Unexpected {
                    found: child.to_string(),
                    context: "inside a scalar element",
                })
            }
            Node::Eof => return Err(Corruption::UnexpectedEof { tag: tag.to_string() }),
        }
    }
}

fn not_a_value(tag: Tag) -> Corruption {
    match tag {
        Tag::Key | Tag::Plist => Corruption::Unexpected {
            found: tag.to_string(),
            context: "where a value was expected",
        },
        other => Corruption::UnknownTag {
            tag: other.to_string(),
        },
    }
}

fn scalar(tag: Tag, text: String) -> Result<Value, Corruption> {
    match tag {
        Tag::String => Ok(Value::Text(text)),
        Tag::Integer => {
            let parsed = text.trim().parse::<i64>();
            parsed.map(Value::Integer).map_err(|_| Corruption::BadInteger { raw: text })
        }
        Tag::Real => {
            let parsed = text.trim().parse::<f64>();
            parsed.map(Value::Real).map_err(|_| Corruption::BadReal { raw: text })
        }
        Tag::True => Ok(Value::Boolean(true)),
        Tag::False => Ok(Value::Boolean(false)),
        Tag::Date => {
            let parsed = parse_date(&text);
            parsed.map(Value::Timestamp).ok_or(Corruption::BadDate { raw: text })
        }
        Tag::Data => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD
                .decode(compact)
                .map(Value::Blob)
                .map_err(|source| Corruption::BadData { source })
        }
        other => Err(not_a_value(other)),
    }
}

/// iPhoto writes dates as seconds since 2001-01-01; standard plists use
/// ISO 8601. Both are accepted.
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    match text.parse::<f64>() {
        Ok(seconds) => apple_date(seconds),
        Err(_) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|date| date.with_timezone(&Utc)),
    }
}

fn decode_array<R: BufRead>(events: &mut Events<R>, filter: FieldFilter<'_>) -> Result<Value, Corruption> {
    let mut items = Vec::new();
    loop {
        match events.next_node()? {
            Node::Text(_) => {}
            Node::Open(child) => items.push(decode(events, child, filter)?),
            Node::Leaf(child) => items.push(decode_empty(child)?),
            Node::Close(_) => return Ok(Value::Sequence(items)),
            Node::Eof => {
                return Err(Corruption::UnexpectedEof {
                    tag: Tag::Array.to_string(),
                })
            }
        }
    }
}

fn decode_dict<R: BufRead>(events: &mut Events<R>, filter: FieldFilter<'_>) -> Result<Value, Corruption> {
    let mut map = Mapping::new();
    let mut key: Option<String> = None;
    loop {
        let (tag, empty) = match events.next_node()? {
            Node::Text(_) => continue,
            Node::Open(Tag::Key) => {
                key = Some(read_text(events, &Tag::Key)?);
                continue;
            }
            Node::Leaf(Tag::Key) => {
                key = Some(String::new());
                continue;
            }
            Node::Open(tag) => (tag, false),
            Node::Leaf(tag) => (tag, true),
            Node::Close(_) => return Ok(Value::Mapping(map)),
            Node::Eof => {
                return Err(Corruption::UnexpectedEof {
                    tag: Tag::Dict.to_string(),
                })
            }
        };

        let Some(name) = key.take() else {
            return Err(Corruption::ValueWithoutKey { tag: tag.to_string() });
        };
        if !filter.admits(&name) {
            if !empty {
                events.skip(&tag)?;
            }
            continue;
        }
        let value = if empty {
            decode_empty(tag)?
        } else {
            decode(events, tag, filter)?
        };
        map.insert(name, value);
    }
}

/// Decodes a standalone plist fragment such as `<dict>…</dict>`, or a whole
/// document, returning its first value.
pub fn decode_fragment(xml: &str, filter: FieldFilter<'_>) -> Result<Value, Corruption> {
    let mut events = Events::new(xml.as_bytes());
    loop {
        match events.next_node()? {
            Node::Text(_) | Node::Open(Tag::Plist) => {}
            Node::Open(tag) => return decode(&mut events, tag, filter),
            Node::Leaf(tag) => return decode_empty(tag),
            Node::Close(tag) => {
                return Err(Corruption::Unexpected {
                    found: tag.to_string(),
                    context: "before any value",
                })
            }
            Node::Eof => {
                return Err(Corruption::UnexpectedEof {
                    tag: Tag::Plist.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn decode_all(xml: &str) -> Result<Value, Corruption> {
        decode_fragment(xml, FieldFilter::all())
    }

    #[test]
    fn test_scalars() {
        assert_eq!(decode_all("<string>Beach &amp; Sun</string>").unwrap(), Value::Text("Beach & Sun".into()));
        assert_eq!(decode_all("<string/>").unwrap(), Value::Text(String::new()));
        assert_eq!(decode_all("<integer>-12</integer>").unwrap(), Value::Integer(-12));
        assert_eq!(decode_all("<real>2.5</real>").unwrap(), Value::Real(2.5));
        assert_eq!(decode_all("<true/>").unwrap(), Value::Boolean(true));
        assert_eq!(decode_all("<false/>").unwrap(), Value::Boolean(false));
        assert_eq!(decode_all("<data>aGVs\n\tbG8=</data>").unwrap(), Value::Blob(b"hello".to_vec()));
    }

    #[test]
    fn test_string_keeps_surrounding_whitespace() {
        assert_eq!(decode_all("<string>  two  words </string>").unwrap(), Value::Text("  two  words ".into()));
    }

    #[test]
    fn test_dates() {
        assert_eq!(
            decode_all("<date>0</date>").unwrap(),
            Value::Timestamp(Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            decode_all("<date>86400</date>").unwrap(),
            Value::Timestamp(Utc.with_ymd_and_hms(2001, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(
            decode_all("<date>2009-06-20T12:30:00Z</date>").unwrap(),
            Value::Timestamp(Utc.with_ymd_and_hms(2009, 6, 20, 12, 30, 0).unwrap())
        );
        assert_matches!(decode_all("<date>yesterday</date>"), Err(Corruption::BadDate { raw }) if raw == "yesterday");
    }

    #[test]
    fn test_bad_literals() {
        assert_matches!(decode_all("<integer>abc</integer>"), Err(Corruption::BadInteger { raw }) if raw == "abc");
        assert_matches!(decode_all("<integer/>"), Err(Corruption::BadInteger { .. }));
        assert_matches!(decode_all("<real>1.2.3</real>"), Err(Corruption::BadReal { raw }) if raw == "1.2.3");
        assert_matches!(decode_all("<data>!!!</data>"), Err(Corruption::BadData { .. }));
    }

    #[test]
    fn test_unknown_tag() {
        assert_matches!(decode_all("<uid>3</uid>"), Err(Corruption::UnknownTag { tag }) if tag == "uid");
        assert_matches!(
            decode_all("<array><string>a</string><set/></array>"),
            Err(Corruption::UnknownTag { tag }) if tag == "set"
        );
    }

    #[test]
    fn test_array_keeps_order_and_ignores_text() {
        let value = decode_all(
            "<array>\n  <string>3</string>\n  <integer>1</integer>\n  <array/>\n  <string>2</string>\n</array>",
        )
        .unwrap();
        assert_eq!(
            value,
            Value::Sequence(vec![
                Value::Text("3".into()),
                Value::Integer(1),
                Value::Sequence(vec![]),
                Value::Text("2".into()),
            ])
        );
    }

    #[test]
    fn test_dict() {
        let value = decode_all(
            "<dict>
                <key>Name</key><string>Trip</string>
                <key>Count</key><integer>2</integer>
                <key>Nested</key><dict><key>Flag</key><true/></dict>
            </dict>",
        )
        .unwrap();
        assert_eq!(value.keys().collect::<Vec<_>>(), vec!["Name", "Count", "Nested"]);
        assert_eq!(value.get("Count"), Some(&Value::Integer(2)));
        assert_eq!(value.get("Nested").and_then(|n| n.get("Flag")), Some(&Value::Boolean(true)));
    }

    #[test]
    fn test_filter_drops_uninteresting_fields() {
        let value = decode_fragment(
            "<dict><key>Caption</key><string>Sunset</string><key>GUID</key><string>ABC-123</string></dict>",
            FieldFilter::only(&["Caption"]),
        )
        .unwrap();
        assert_eq!(value.get("Caption").and_then(Value::as_str), Some("Sunset"));
        assert_eq!(value.get("GUID"), None);
    }

    #[test]
    fn test_filter_keeps_numeric_keys() {
        let value = decode_fragment(
            "<dict>
                <key>101</key><dict><key>Caption</key><string>a</string><key>GUID</key><string>x</string></dict>
                <key>102</key><dict><key>Rating</key><integer>3</integer></dict>
                <key>Other</key><string>dropped</string>
            </dict>",
            FieldFilter::only(&["Caption"]),
        )
        .unwrap();
        assert_eq!(value.keys().collect::<Vec<_>>(), vec!["101", "102"]);
        assert_eq!(value.get("101").and_then(|v| v.get("Caption")), Some(&Value::Text("a".into())));
        assert_eq!(value.get("101").and_then(|v| v.get("GUID")), None);
        assert_eq!(value.get("102").map(|v| v.keys().count()), Some(0));
    }

    #[test]
    fn test_filter_applies_to_nested_dicts() {
        let value = decode_fragment(
            "<dict><key>Faces</key><array>
                <dict><key>face key</key><integer>7</integer><key>rectangle</key><string>{0,0}</string></dict>
            </array></dict>",
            FieldFilter::only(&["Faces", "face key"]),
        )
        .unwrap();
        let face = &value.get("Faces").and_then(Value::as_sequence).unwrap()[0];
        assert_eq!(face.keys().collect::<Vec<_>>(), vec!["face key"]);
    }

    #[test]
    fn test_filtered_out_subtree_is_not_decoded() {
        let value = decode_fragment(
            "<dict><key>Junk</key><array><integer>bad</integer></array><key>Caption</key><string>ok</string></dict>",
            FieldFilter::only(&["Caption"]),
        )
        .unwrap();
        assert_eq!(value.get("Caption").and_then(Value::as_str), Some("ok"));
    }

    #[test]
    fn test_value_without_key() {
        assert_matches!(
            decode_all("<dict><string>orphan</string></dict>"),
            Err(Corruption::ValueWithoutKey { tag }) if tag == "string"
        );
    }

    #[test]
    fn test_whole_document() {
        let value = decode_all(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict><key>Major Version</key><integer>2</integer></dict></plist>"#,
        )
        .unwrap();
        assert_eq!(value.get("Major Version"), Some(&Value::Integer(2)));
    }
}
