//! ESTree JSON to [`Tree`] conversion
//!
//! External JavaScript/TypeScript parsers emit ESTree-shaped JSON. Objects
//! with a `type` become nodes, arrays become sequences and scalars are kept
//! as attribute values. `loc`, `parent` and plain objects without a `type`
//! (such as a regex literal's `{pattern, flags}`) are not carried over.

use crate::parser::{ParseError, Parsed};
use crate::source::{SourceText, TextRange};
use crate::tree::{NodeId, Tree, TreeBuilder, TreeError, Value};
use crate::visitor_keys::KeyTable;
use serde_json::{Map, Value as Json};

const SKIPPED_FIELDS: [&str; 6] = ["type", "range", "start", "end", "loc", "parent"];

/// How the JSON's offsets count positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetEncoding {
    /// UTF-8 byte offsets
    #[default]
    Utf8,
    /// UTF-16 code units, as JavaScript-hosted parsers report them
    Utf16,
}

/// Build a tree from ESTree JSON whose offsets are UTF-8 bytes
pub fn from_json(source: impl Into<SourceText>, json: &Json) -> Result<Tree, TreeError> {
    from_json_with(source, json, OffsetEncoding::Utf8)
}

/// Build a tree from ESTree JSON with the given offset encoding
pub fn from_json_with(
    source: impl Into<SourceText>,
    json: &Json,
    encoding: OffsetEncoding,
) -> Result<Tree, TreeError> {
    let source = source.into();
    let offsets = match encoding {
        OffsetEncoding::Utf8 => None,
        OffsetEncoding::Utf16 => Some(utf16_to_byte_offsets(source.as_str())),
    };
    let mut converter = Converter {
        builder: TreeBuilder::new(source),
        offsets,
    };
    let root = converter.node(json)?;
    converter.builder.finish(root)
}

/// Parse ESTree JSON text for `source`, attaching visitor key extensions
pub fn parse_json(
    source: &str,
    json: &str,
    encoding: OffsetEncoding,
    visitor_keys: KeyTable,
) -> Result<Parsed, ParseError> {
    let value: Json = serde_json::from_str(json).map_err(ParseError::other)?;
    let tree = from_json_with(source, &value, encoding)?;
    Ok(Parsed::new(tree).with_visitor_keys(visitor_keys))
}

struct Converter {
    builder: TreeBuilder,
    /// UTF-16 index -> byte offset, when converting
    offsets: Option<Vec<usize>>,
}

impl Converter {
    fn node(&mut self, json: &Json) -> Result<NodeId, TreeError> {
        let object = json
            .as_object()
            .ok_or_else(|| TreeError::Invalid(format!("expected a node object, found {}", json)))?;
        let kind = object
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| TreeError::Invalid("node object has no string `type`".to_string()))?;
        let range = self.range(kind, object)?;
        let id = self.builder.node(kind, range);

        for (name, field) in object {
            if SKIPPED_FIELDS.contains(&name.as_str()) {
                continue;
            }
            if let Some(value) = self.value(field)? {
                self.builder.set(id, name, value)?;
            }
        }
        Ok(id)
    }

    fn value(&mut self, json: &Json) -> Result<Option<Value>, TreeError> {
        let value = match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_f64() {
                Some(n) => Value::Number(n),
                None => return Ok(None),
            },
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                // Only one level of sequence holds children
                for item in items.iter().filter(|item| !item.is_array()) {
                    if let Some(value) = self.value(item)? {
                        list.push(value);
                    }
                }
                Value::List(list)
            }
            Json::Object(object) if object.contains_key("type") => Value::Node(self.node(json)?),
            Json::Object(_) => return Ok(None),
        };
        Ok(Some(value))
    }

    fn range(&self, kind: &str, object: &Map<String, Json>) -> Result<TextRange, TreeError> {
        let pair = match object.get("range").and_then(Json::as_array) {
            Some(range) if range.len() == 2 => (range[0].as_u64(), range[1].as_u64()),
            _ => (
                object.get("start").and_then(Json::as_u64),
                object.get("end").and_then(Json::as_u64),
            ),
        };
        let (Some(start), Some(end)) = pair else {
            return Err(TreeError::Invalid(format!("{} node has no range", kind)));
        };
        Ok(TextRange::new(
            self.offset(kind, start as usize)?,
            self.offset(kind, end as usize)?,
        ))
    }

    fn offset(&self, kind: &str, offset: usize) -> Result<usize, TreeError> {
        match &self.offsets {
            None => Ok(offset),
            Some(map) => map.get(offset).copied().ok_or_else(|| {
                TreeError::Invalid(format!(
                    "{} node offset {} is past the end of the source",
                    kind, offset
                ))
            }),
        }
    }
}

/// Byte offset for every UTF-16 index, including one-past-the-end. The
/// second half of a surrogate pair maps to the start of its character.
fn utf16_to_byte_offsets(text: &str) -> Vec<usize> {
    let mut map = Vec::with_capacity(text.len() + 1);
    for (byte, c) in text.char_indices() {
        for _ in 0..c.len_utf16() {
            map.push(byte);
        }
    }
    map.push(text.len());
    map
}
