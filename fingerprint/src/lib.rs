//! Content fingerprints for Structured Commons objects.
//!
//! A fingerprint is a 256-bit digest over an abstract object tree made of
//! *files* (opaque byte sequences of declared length) and *dictionaries*
//! (uniquely named, typed children). The digest is canonical: two producers
//! emitting the same abstract tree obtain the same fingerprint regardless of
//! emission order or concrete representation.
//!
//! The hashing rule MUST maintain exact implementation compatibility; the
//! framing fed to SHA-256 is fixed and fingerprints computed by older tools
//! must keep verifying. If a change is ever needed, that has to be a new
//! scheme with new textual prefixes, not an edit to this one.
//!
//! The crate has three coupled pieces:
//!
//! - [`Fingerprint`], the immutable 32-byte value with its textual encodings
//!   (compact Base64, long Base32, hex, C array, big-endian integer) and the
//!   parser that recognizes them.
//! - The visitor contract ([`Visit`], [`Visitor`], [`Entry`]) through which
//!   arbitrary representations produce the canonical event stream for a tree.
//! - [`Hasher`], the consumer that folds that event stream into a
//!   fingerprint, enforcing the protocol invariants along the way.
//!
//! A walk is synchronous and single-threaded; fingerprinting independent
//! trees from different threads is safe as long as each walk owns its inputs.

use std::io;

use thiserror::Error;

mod fingerprint;
mod hash;
mod visitor;

pub use crate::fingerprint::{Fingerprint, Format};
pub use crate::hash::{empty_dict, empty_file, fingerprint, validate_name, Hasher};
pub use crate::visitor::{Entry, Kind, Visit, Visitor};

/// Errors that may be encountered while fingerprinting an object tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A generic IO error occurred while a producer was reading the content
    /// to be hashed. This error may be retried, but if it fails multiple
    /// times it's generally not recoverable.
    #[error("i/o error: {0}")]
    IO(#[from] io::Error),

    /// A textual representation failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A producer emitted data that violates the hashing protocol.
    /// The walk is aborted; no partial fingerprint is returned.
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Errors encountered when parsing a fingerprint from a string.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// The input matched none of the recognized representations.
    #[error("unrecognized fingerprint format: {input}")]
    UnknownFormat {
        /// The input originally provided to the parser.
        input: String,
    },

    /// The input did not carry the prefix required by its representation.
    #[error("invalid prefix (expected {expected:?}, got {input:?})")]
    BadPrefix {
        /// The input originally provided to the parser.
        input: String,

        /// The prefix the representation requires.
        expected: &'static str,
    },

    /// The representation body (or byte sequence) had the wrong length.
    #[error("invalid length (expected {expected}, got {found})")]
    BadLength {
        /// The length the representation requires.
        expected: usize,

        /// The length that was found.
        found: usize,
    },

    /// The representation body failed to decode.
    #[error("invalid encoding: {message}")]
    BadEncoding {
        /// Detail reported by the decoder.
        message: String,
    },

    /// The embedded Fletcher-16 checksum did not match the decoded bytes.
    #[error("invalid checksum (computed {computed:?}, embedded {embedded:?})")]
    BadChecksum {
        /// The checksum recomputed over the decoded fingerprint bytes.
        computed: [u8; 2],

        /// The checksum carried by the representation.
        embedded: [u8; 2],
    },

    /// An integer outside `[0, 2^256)` was given for the integer view.
    #[error("integer out of range for 256 bits")]
    BadValue,
}

/// Protocol violations raised by consumers while a tree is walked.
///
/// These indicate invalid *data* (as opposed to an out-of-sequence event,
/// which is a bug in the producer and panics). Any of these aborts the walk.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum ProtocolError {
    /// A dictionary entry name was empty.
    #[error("empty name in dictionary")]
    EmptyName,

    /// A dictionary entry name contained a forbidden code point.
    #[error("invalid character (code {code}) in name {name:?}")]
    InvalidName {
        /// The offending name.
        name: String,

        /// The code point that made it invalid (a C0 control).
        code: u32,
    },

    /// A name was emitted twice within the same dictionary.
    #[error("duplicate name {name:?} in dictionary")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// A file emitted a different number of bytes than it declared.
    #[error("file size mismatch (declared {declared}, emitted {emitted})")]
    SizeMismatch {
        /// The size declared at `enter_file`.
        declared: u64,

        /// The number of bytes actually emitted.
        emitted: u64,
    },

    /// A dictionary entry declared one kind but its child produced another.
    #[error("entry {name:?} declared kind '{declared}' but produced '{found}'")]
    WrongKind {
        /// The entry name.
        name: String,

        /// The kind declared at `visit_entry`.
        declared: Kind,

        /// The kind the child actually produced.
        found: Kind,
    },
}

#[cfg(test)]
mod tests;
