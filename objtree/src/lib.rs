//! Concrete representations of Structured Commons object trees.
//!
//! The `fingerprint` crate defines the abstract tree and the visitor contract
//! over it; this crate provides the concrete forms a tree actually takes in
//! the tools:
//!
//! - [`Tree`], an owned in-memory tree, producing and consuming the canonical
//!   event sequence.
//! - [`fs`], mapping trees to directory hierarchies and back, with
//!   percent-quoted entry names.
//! - [`json`], mapping trees to JSON documents and back.
//!
//! All three speak only through the visitor contract, so any producer can be
//! fingerprinted, written to disk, or rendered to JSON without caring where
//! it came from.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

use std::collections::BTreeMap;

use fingerprint::{validate_name, Entry, Fingerprint, Visit, Visitor};
use thiserror::Error;

pub mod fs;
pub mod json;

/// Errors raised while converting between tree representations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A walk over an object tree failed.
    #[error(transparent)]
    Walk(#[from] fingerprint::Error),

    /// A JSON string held a code point that cannot stand for a file byte.
    #[error("code point U+{code:04X} cannot represent a file byte")]
    WideCodePoint {
        /// The offending code point value.
        code: u32,
    },

    /// A base64-coded file body failed to decode.
    #[error("invalid base64 file body: {0}")]
    Base64(#[from] data_encoding::DecodeError),

    /// A fingerprint reference failed to parse.
    #[error("invalid fingerprint reference: {0}")]
    Reference(#[from] fingerprint::ParseError),

    /// A JSON value has no object-tree interpretation.
    #[error("no object interpretation for JSON {found}")]
    UnsupportedValue {
        /// A short description of the value that was found.
        found: String,
    },
}

/// An owned object tree.
///
/// Files are byte buffers, dictionaries are name-keyed maps, links are
/// fingerprints. A link is only meaningful as a dictionary entry; walking a
/// bare `Tree::Link` panics, since the event contract has no root-link shape.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Tree {
    /// A leaf holding file content.
    File(Vec<u8>),

    /// An interior node of named children.
    Dict(BTreeMap<String, Tree>),

    /// A reference to another object by digest.
    Link(Fingerprint),
}

impl Tree {
    /// A file leaf from anything byte-like.
    pub fn file(data: impl AsRef<[u8]>) -> Tree {
        Tree::File(data.as_ref().to_vec())
    }

    /// A dictionary from an entry list.
    pub fn dict(entries: impl IntoIterator<Item = (String, Tree)>) -> Tree {
        Tree::Dict(entries.into_iter().collect())
    }
}

impl Visit for Tree {
    fn visit(&self, v: &mut dyn Visitor) -> Result<(), fingerprint::Error> {
        match self {
            Tree::File(data) => {
                v.enter_file(data.len() as u64)?;
                v.visit_data(data)?;
                v.leave_file()
            }
            Tree::Dict(entries) => {
                v.enter_dict()?;
                for (name, child) in entries {
                    let entry = match child {
                        Tree::File(_) => Entry::File(child),
                        Tree::Dict(_) => Entry::Dict(child),
                        Tree::Link(fp) => Entry::Link(*fp),
                    };
                    v.visit_entry(name, entry)?;
                }
                v.leave_dict()
            }
            Tree::Link(_) => panic!("a bare link has no event sequence"),
        }
    }
}

/// Internal state of a [`TreeBuilder`] node.
enum Node {
    File { declared: u64, data: Vec<u8> },
    Dict(BTreeMap<String, Tree>),
}

/// A visitor that materializes the events it consumes into a [`Tree`].
///
/// The builder validates names and rejects duplicates but does not sort
/// beyond map semantics; entry ordering is a hashing concern, not a
/// representation concern.
#[derive(Default)]
pub struct TreeBuilder {
    node: Option<Node>,
    built: Option<Tree>,
}

impl TreeBuilder {
    /// Create a builder ready to consume one node.
    pub fn new() -> Self {
        TreeBuilder::default()
    }

    /// Return the materialized tree.
    ///
    /// Panics if the walk did not run to completion.
    pub fn finish(self) -> Tree {
        self.built.expect("tree requested before the walk completed")
    }
}

impl Visitor for TreeBuilder {
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
                self.built = Some(Tree::File(data));
                Ok(())
            }
            _ => panic!("leave_file outside of a file"),
        }
    }

    fn enter_dict(&mut self) -> Result<(), fingerprint::Error> {
        assert!(self.node.is_none(), "enter_dict on a builder that already has a node");
        self.node = Some(Node::Dict(BTreeMap::new()));
        Ok(())
    }

    fn visit_entry(&mut self, name: &str, entry: Entry<'_>) -> Result<(), fingerprint::Error> {
        validate_name(name)?;

        let child = match entry {
            Entry::Link(fp) => Tree::Link(fp),
            Entry::File(object) | Entry::Dict(object) => {
                let mut sub = TreeBuilder::new();
                object.visit(&mut sub)?;
                sub.finish()
            }
        };

        let Some(Node::Dict(entries)) = &mut self.node else {
            panic!("visit_entry outside of a dictionary");
        };
        if entries.insert(name.to_string(), child).is_some() {
            return Err(fingerprint::ProtocolError::DuplicateName {
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn leave_dict(&mut self) -> Result<(), fingerprint::Error> {
        match self.node.take() {
            Some(Node::Dict(entries)) => {
                self.built = Some(Tree::Dict(entries));
                Ok(())
            }
            _ => panic!("leave_dict outside of a dictionary"),
        }
    }
}
