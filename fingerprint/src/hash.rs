use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::{Entry, Error, Fingerprint, Kind, ProtocolError, Visit, Visitor};

/// Compute the canonical fingerprint of an object tree.
///
/// This is the one-call entry point; to drive the protocol manually (or to
/// feed it from a hand-written producer), use [`Hasher`] directly.
pub fn fingerprint(object: &dyn Visit) -> Result<Fingerprint, Error> {
    let mut hasher = Hasher::new();
    object.visit(&mut hasher)?;
    Ok(hasher.finish())
}

/// Ensure a dictionary entry name is valid.
///
/// A valid name is non-empty and contains no code point with value 31 or
/// below.
pub fn validate_name(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() {
        return Err(ProtocolError::EmptyName);
    }
    match name.chars().find(|c| (*c as u32) <= 31) {
        Some(c) => Err(ProtocolError::InvalidName {
            name: name.to_string(),
            code: c as u32,
        }),
        None => Ok(()),
    }
}

/// The fingerprint of the empty file.
pub fn empty_file() -> Fingerprint {
    let mut hasher = Hasher::new();
    hasher.enter_file(0).expect("empty file has no data");
    hasher.leave_file().expect("empty file matches its size");
    hasher.finish()
}

/// The fingerprint of the empty dictionary.
pub fn empty_dict() -> Fingerprint {
    let mut hasher = Hasher::new();
    hasher.enter_dict().expect("entering a dictionary is infallible");
    hasher.leave_dict().expect("empty dictionary has no entries");
    hasher.finish()
}

/// Per-node hashing state.
///
/// A file accumulates its digest incrementally and only needs a byte
/// counter; a dictionary must buffer its entry table, since the canonical
/// encoding sorts entries by name before framing.
enum State {
    Ready,
    File {
        declared: u64,
        emitted: u64,
        digest: Sha256,
    },
    // String ordering is byte ordering over UTF-8, which is exactly the
    // canonical entry order.
    Dict {
        entries: BTreeMap<String, (Kind, Fingerprint)>,
    },
    Done {
        shape: Kind,
        fingerprint: Fingerprint,
    },
}

/// A [`Visitor`] that folds one node's event sequence into a fingerprint.
///
/// Files are framed `'s' || decimal-size || NUL || data`; dictionaries sort
/// their entry records by name and frame the concatenation
/// `'t' || decimal-length || NUL || records`, each record being
/// `kind || ':' || name || NUL || child-fingerprint`. The frame ties every
/// digest to its node kind and size, so no file can collide with a
/// dictionary or with a prefix of a larger file.
///
/// Nested file and dictionary entries are hashed by a fresh `Hasher` per
/// entry; link entries contribute their referenced fingerprint as-is.
pub struct Hasher {
    state: State,
}

impl Hasher {
    /// Create a visitor ready to consume one node.
    pub fn new() -> Self {
        Hasher { state: State::Ready }
    }

    /// Return the computed fingerprint.
    ///
    /// Panics if the walk did not run to completion; an incomplete event
    /// sequence is a producer bug.
    pub fn finish(self) -> Fingerprint {
        match self.state {
            State::Done { fingerprint, .. } => fingerprint,
            _ => panic!("fingerprint requested before the walk completed"),
        }
    }

    /// The computed fingerprint along with the shape the node turned out to
    /// have, for entry kind verification.
    fn finish_shaped(self) -> (Kind, Fingerprint) {
        match self.state {
            State::Done { shape, fingerprint } => (shape, fingerprint),
            _ => panic!("fingerprint requested before the walk completed"),
        }
    }

    fn finalize(&mut self, shape: Kind, digest: Sha256) {
        let raw = digest.finalize();
        let fingerprint =
            Fingerprint::from_bytes(&raw[..]).expect("sha-256 digests are 32 bytes");
        self.state = State::Done { shape, fingerprint };
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Hasher::new()
    }
}

impl Visitor for Hasher {
    fn enter_file(&mut self, size: u64) -> Result<(), Error> {
        match self.state {
            State::Ready => {
                let mut digest = Sha256::new();
                digest.update(b"s");
                digest.update(size.to_string().as_bytes());
                digest.update([0u8]);
                self.state = State::File {
                    declared: size,
                    emitted: 0,
                    digest,
                };
                Ok(())
            }
            _ => panic!("enter_file on a visitor that already has a node"),
        }
    }

    fn visit_data(&mut self, chunk: &[u8]) -> Result<(), Error> {
        match &mut self.state {
            State::File { emitted, digest, .. } => {
                *emitted += chunk.len() as u64;
                digest.update(chunk);
                Ok(())
            }
            _ => panic!("visit_data outside of a file"),
        }
    }

    fn leave_file(&mut self) -> Result<(), Error> {
        match std::mem::replace(&mut self.state, State::Ready) {
            State::File {
                declared,
                emitted,
                digest,
            } => {
                if emitted != declared {
                    return Err(ProtocolError::SizeMismatch { declared, emitted }.into());
                }
                self.finalize(Kind::File, digest);
                Ok(())
            }
            _ => panic!("leave_file outside of a file"),
        }
    }

    fn enter_dict(&mut self) -> Result<(), Error> {
        match self.state {
            State::Ready => {
                self.state = State::Dict {
                    entries: BTreeMap::new(),
                };
                Ok(())
            }
            _ => panic!("enter_dict on a visitor that already has a node"),
        }
    }

    fn visit_entry(&mut self, name: &str, entry: Entry<'_>) -> Result<(), Error> {
        let State::Dict { entries } = &mut self.state else {
            panic!("visit_entry outside of a dictionary");
        };

        validate_name(name)?;
        if entries.contains_key(name) {
            return Err(ProtocolError::DuplicateName {
                name: name.to_string(),
            }
            .into());
        }

        let declared = entry.kind();
        let child = match entry {
            Entry::Link(fingerprint) => fingerprint,
            Entry::File(object) | Entry::Dict(object) => {
                let mut sub = Hasher::new();
                object.visit(&mut sub)?;
                let (found, fingerprint) = sub.finish_shaped();
                if found != declared {
                    return Err(ProtocolError::WrongKind {
                        name: name.to_string(),
                        declared,
                        found,
                    }
                    .into());
                }
                fingerprint
            }
        };

        entries.insert(name.to_string(), (declared, child));
        Ok(())
    }

    fn leave_dict(&mut self) -> Result<(), Error> {
        match std::mem::replace(&mut self.state, State::Ready) {
            State::Dict { entries } => {
                let mut records = Vec::new();
                for (name, (kind, fingerprint)) in &entries {
                    records.push(kind.tag());
                    records.push(b':');
                    records.extend_from_slice(name.as_bytes());
                    records.push(0);
                    records.extend_from_slice(fingerprint.as_bytes());
                }

                let mut digest = Sha256::new();
                digest.update(b"t");
                digest.update(records.len().to_string().as_bytes());
                digest.update([0u8]);
                digest.update(&records);
                self.finalize(Kind::Dict, digest);
                Ok(())
            }
            _ => panic!("leave_dict outside of a dictionary"),
        }
    }
}
