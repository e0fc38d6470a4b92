use strum::Display;

use crate::{Error, Fingerprint};

/// The kind tag carried by a dictionary entry.
///
/// The single ASCII rendering (`s`, `t`, `l`) is the byte that enters the
/// canonical per-entry record.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum Kind {
    /// The child is a file: an opaque byte sequence.
    #[strum(serialize = "s")]
    File,

    /// The child is a dictionary.
    #[strum(serialize = "t")]
    Dict,

    /// The child is a fingerprint reference to some other object.
    #[strum(serialize = "l")]
    Link,
}

impl Kind {
    /// The ASCII byte used for this kind in the canonical encoding.
    pub fn tag(self) -> u8 {
        match self {
            Kind::File => b's',
            Kind::Dict => b't',
            Kind::Link => b'l',
        }
    }
}

/// A dictionary entry as handed to [`Visitor::visit_entry`].
///
/// File and dictionary children are producers in their own right; the
/// consumer drives each with a fresh sub-visitor. A link child is an opaque
/// reference and is never recursed into.
pub enum Entry<'a> {
    /// A file child (kind `s`).
    File(&'a dyn Visit),

    /// A dictionary child (kind `t`).
    Dict(&'a dyn Visit),

    /// A fingerprint reference (kind `l`).
    Link(Fingerprint),
}

impl Entry<'_> {
    /// The kind tag this entry declares.
    pub fn kind(&self) -> Kind {
        match self {
            Entry::File(_) => Kind::File,
            Entry::Dict(_) => Kind::Dict,
            Entry::Link(_) => Kind::Link,
        }
    }
}

/// An object that can produce the canonical event sequence for its tree.
///
/// Implementations must drive the visitor with exactly one of two shapes:
///
/// - `enter_file(sz)`, then `visit_data(chunk)` zero or more times with
///   chunks totalling `sz` bytes, then `leave_file()`; or
/// - `enter_dict()`, then `visit_entry(name, entry)` zero or more times with
///   pairwise-distinct names, then `leave_dict()`.
///
/// Consumers may assume this shape. Emitting events out of sequence is a bug
/// in the producer, not bad data, and consumers are free to panic on it.
pub trait Visit {
    /// Walk this object, emitting its event sequence into `v`.
    fn visit(&self, v: &mut dyn Visitor) -> Result<(), Error>;
}

/// A consumer of the canonical event sequence.
///
/// One walk is a synchronous depth-first traversal; a visitor only ever sees
/// one node's events, with nested dictionary entries delegated to fresh
/// sub-visitors constructed by the consumer itself.
pub trait Visitor {
    /// Start a file node of the declared size.
    fn enter_file(&mut self, size: u64) -> Result<(), Error>;

    /// Consume a chunk of the current file's data, in emission order.
    fn visit_data(&mut self, chunk: &[u8]) -> Result<(), Error>;

    /// Finish the current file node.
    fn leave_file(&mut self) -> Result<(), Error>;

    /// Start a dictionary node.
    fn enter_dict(&mut self) -> Result<(), Error>;

    /// Consume one named entry of the current dictionary.
    fn visit_entry(&mut self, name: &str, entry: Entry<'_>) -> Result<(), Error>;

    /// Finish the current dictionary node.
    fn leave_dict(&mut self) -> Result<(), Error>;
}
