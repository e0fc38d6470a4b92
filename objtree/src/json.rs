//! Mapping between object trees and JSON documents.
//!
//! A file renders as a JSON string whose code points carry the byte values
//! (or, in base64 mode, as a one-element array of padded urlsafe Base64); a
//! dictionary renders as a JSON object; a link entry renders as a one-element
//! array of the compact fingerprint form. On the way back in, a one-element
//! array in entry position is a link exactly when its string starts with
//! `fp:`, and a base64 file otherwise.

use std::collections::BTreeMap;

use data_encoding::BASE64URL;
use fingerprint::{validate_name, Entry, Fingerprint, Visit, Visitor};
use serde_json::{Map, Value};

use crate::{Error, Tree};

/// How file content is rendered into JSON.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum Encoding {
    /// File bytes become same-valued code points in a JSON string.
    #[default]
    Text,

    /// Every file becomes a one-element array of padded urlsafe Base64.
    Base64,
}

/// Interpret a JSON document as an object tree.
pub fn from_value(value: &Value) -> Result<Tree, Error> {
    match value {
        Value::String(text) => Ok(Tree::File(codepoint_bytes(text)?)),
        Value::Object(map) => {
            let mut entries = BTreeMap::new();
            for (name, child) in map {
                validate_name(name).map_err(fingerprint::Error::from)?;
                let node = match child {
                    Value::Array(items) if items.len() == 1 => entry_array(&items[0])?,
                    nested => from_value(nested)?,
                };
                entries.insert(name.clone(), node);
            }
            Ok(Tree::Dict(entries))
        }
        // In root position a one-element array is always base64 content;
        // links exist only as dictionary entries.
        Value::Array(items) if items.len() == 1 => match &items[0] {
            Value::String(body) => Ok(Tree::File(BASE64URL.decode(body.as_bytes())?)),
            other => Err(unsupported(other)),
        },
        other => Err(unsupported(other)),
    }
}

/// Render an object tree as a JSON document.
pub fn to_value(object: &dyn Visit, encoding: Encoding) -> Result<Value, Error> {
    let mut builder = ValueBuilder::new(encoding);
    object.visit(&mut builder)?;
    Ok(builder.finish())
}

/// A one-element array in dictionary entry position: link or base64 file.
fn entry_array(item: &Value) -> Result<Tree, Error> {
    let Value::String(body) = item else {
        return Err(unsupported(item));
    };
    let bytes = body.as_bytes();
    if bytes.len() >= 3 && bytes[..3].eq_ignore_ascii_case(b"fp:") {
        let (target, _) = Fingerprint::parse(body)?;
        Ok(Tree::Link(target))
    } else {
        Ok(Tree::File(BASE64URL.decode(bytes)?))
    }
}

fn unsupported(value: &Value) -> Error {
    let found = match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Object(_) => "object".to_string(),
    };
    Error::UnsupportedValue { found }
}

/// Decode a text-mode JSON string into file bytes.
fn codepoint_bytes(text: &str) -> Result<Vec<u8>, Error> {
    text.chars()
        .map(|c| u8::try_from(c as u32).map_err(|_| Error::WideCodePoint { code: c as u32 }))
        .collect()
}

/// Render file bytes as a text-mode JSON string.
fn codepoint_string(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}

enum Node {
    File { declared: u64, data: Vec<u8> },
    Dict(Map<String, Value>),
}

/// A consumer that renders the event stream into a [`Value`].
struct ValueBuilder {
    encoding: Encoding,
    node: Option<Node>,
    built: Option<Value>,
}

impl ValueBuilder {
    fn new(encoding: Encoding) -> Self {
        ValueBuilder {
            encoding,
            node: None,
            built: None,
        }
    }

    fn finish(self) -> Value {
        self.built.expect("value requested before the walk completed")
    }
}

impl Visitor for ValueBuilder {
    fn enter_file(&mut self, size: u64) -> Result<(), fingerprint::Error> {
        assert!(self.node.is_none(), "enter_file on a builder that already has a node");
        self.node = Some(Node::File {
            declared: size,
            data: Vec::with_capacity(size as usize),
        });
        Ok(())
    }

    fn visit_data(&mut self, chunk: &[u8]) -> Result<(), fingerprint::Error> {
        match &mut self.node {
            Some(Node::File { data, .. }) => {
                data.extend_from_slice(chunk);
                Ok(())
            }
            _ => panic!("visit_data outside of a file"),
        }
    }

    fn leave_file(&mut self) -> Result<(), fingerprint::Error> {
        match self.node.take() {
            Some(Node::File { declared, data }) => {
                if data.len() as u64 != declared {
                    return Err(fingerprint::ProtocolError::SizeMismatch {
                        declared,
                        emitted: data.len() as u64,
                    }
                    .into());
                }
                self.built = Some(match self.encoding {
                    Encoding::Text => Value::String(codepoint_string(&data)),
                    Encoding::Base64 => {
                        Value::Array(vec![Value::String(BASE64URL.encode(&data))])
                    }
                });
                Ok(())
            }
            _ => panic!("leave_file outside of a file"),
        }
    }

    fn enter_dict(&mut self) -> Result<(), fingerprint::Error> {
        assert!(self.node.is_none(), "enter_dict on a builder that already has a node");
        self.node = Some(Node::Dict(Map::new()));
        Ok(())
    }

    fn visit_entry(&mut self, name: &str, entry: Entry<'_>) -> Result<(), fingerprint::Error> {
        validate_name(name)?;

        let value = match entry {
            Entry::Link(target) => Value::Array(vec![Value::String(target.compact())]),
            Entry::File(object) | Entry::Dict(object) => {
                let mut sub = ValueBuilder::new(self.encoding);
                object.visit(&mut sub)?;
                sub.finish()
            }
        };

        let Some(Node::Dict(map)) = &mut self.node else {
            panic!("visit_entry outside of a dictionary");
        };
        if map.insert(name.to_string(), value).is_some() {
            return Err(fingerprint::ProtocolError::DuplicateName {
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn leave_dict(&mut self) -> Result<(), fingerprint::Error> {
        match self.node.take() {
            Some(Node::Dict(map)) => {
                self.built = Some(Value::Object(map));
                Ok(())
            }
            _ => panic!("leave_dict outside of a dictionary"),
        }
    }
}
