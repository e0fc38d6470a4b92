//! Mapping between object trees and directory hierarchies.
//!
//! A directory is a dictionary; each entry within it is named by the
//! percent-decoded form of its on-disk name. A decoded name beginning with a
//! NUL byte marks a link entry: the file holds the 32 raw bytes of the
//! referenced fingerprint and the logical name is the remainder. Any other
//! regular file is a file child and any other directory is a dictionary
//! child.
//!
//! When writing, names are percent-encoded with every reserved byte quoted,
//! and an encoded name that would start with `.` is rewritten to `%2E…` so
//! that no entry ever collides with `.`, `..`, or hidden-file conventions.

use std::{
    collections::HashSet,
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use fingerprint::{validate_name, Entry, Fingerprint, Visit, Visitor};
use glob::Pattern;
use log::debug;
use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::Error;

/// Read granularity for file content.
const CHUNK: usize = 8192;

/// Quote every byte outside the unreserved set (letters, digits, `_`, `.`,
/// `~`, `-`).
const QUOTED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'-');

/// Transform a logical entry name into a filesystem name.
pub fn quote_name(name: &str) -> String {
    let quoted = percent_encode(name.as_bytes(), QUOTED).to_string();
    match quoted.strip_prefix('.') {
        Some(rest) => format!("%2E{rest}"),
        None => quoted,
    }
}

/// Transform a filesystem name back into logical name bytes.
pub fn unquote_name(fs_name: &str) -> Vec<u8> {
    percent_decode_str(fs_name).collect()
}

/// The filesystem name of a link entry: a quoted NUL byte, then the name.
fn quote_link_name(name: &str) -> String {
    let mut raw = vec![0u8];
    raw.extend_from_slice(name.as_bytes());
    percent_encode(&raw, QUOTED).to_string()
}

/// Attach the offending path to an IO error before it enters a walk.
fn annotate(path: &Path, error: io::Error) -> io::Error {
    io::Error::new(error.kind(), format!("{}: {error}", path.display()))
}

/// A producer over a filesystem path.
///
/// A directory path walks as a dictionary, a regular file path as a file.
/// Entries whose on-disk name matches any ignore pattern are skipped; the
/// patterns apply to the quoted (on-disk) name, not the logical one.
#[derive(Clone, Debug)]
pub struct DirSource {
    path: PathBuf,
    ignore: Vec<Pattern>,
}

impl DirSource {
    /// A source over `path` that skips hidden (dot-named) entries.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let hidden = Pattern::new(".*").expect("dot pattern must compile");
        Self::with_ignore(path, vec![hidden])
    }

    /// A source over `path` with an explicit ignore pattern list.
    pub fn with_ignore(path: impl Into<PathBuf>, ignore: Vec<Pattern>) -> Self {
        DirSource {
            path: path.into(),
            ignore,
        }
    }

    fn child(&self, fs_name: &str) -> DirSource {
        DirSource {
            path: self.path.join(fs_name),
            ignore: self.ignore.clone(),
        }
    }
}

impl Visit for DirSource {
    fn visit(&self, v: &mut dyn Visitor) -> Result<(), fingerprint::Error> {
        let meta = fs::metadata(&self.path).map_err(|e| annotate(&self.path, e))?;
        if meta.is_dir() {
            debug!("dir {:?}", self.path);
            v.enter_dict()?;
            for entry in fs::read_dir(&self.path).map_err(|e| annotate(&self.path, e))? {
                let entry = entry.map_err(|e| annotate(&self.path, e))?;
                let fs_name = entry.file_name();
                let Some(fs_name) = fs_name.to_str() else {
                    return Err(annotate(
                        &entry.path(),
                        io::Error::new(io::ErrorKind::InvalidData, "non-unicode file name"),
                    )
                    .into());
                };
                if self.ignore.iter().any(|p| p.matches(fs_name)) {
                    debug!("ignoring {fs_name:?}");
                    continue;
                }

                let decoded = unquote_name(fs_name);
                if decoded.first() == Some(&0) {
                    // Reference entry: the file body is the raw fingerprint.
                    let name = logical_name(&entry.path(), decoded[1..].to_vec())?;
                    let raw =
                        fs::read(entry.path()).map_err(|e| annotate(&entry.path(), e))?;
                    let target = Fingerprint::from_bytes(raw)?;
                    debug!("entry {name:?}: reference ({target})");
                    v.visit_entry(&name, Entry::Link(target))?;
                } else {
                    let name = logical_name(&entry.path(), decoded)?;
                    let sub = self.child(fs_name);
                    let is_dir = fs::metadata(entry.path())
                        .map_err(|e| annotate(&entry.path(), e))?
                        .is_dir();
                    if is_dir {
                        v.visit_entry(&name, Entry::Dict(&sub))?;
                    } else {
                        v.visit_entry(&name, Entry::File(&sub))?;
                    }
                }
            }
            v.leave_dict()
        } else {
            debug!("file {:?}, sz {}", self.path, meta.len());
            v.enter_file(meta.len())?;
            let mut file = fs::File::open(&self.path).map_err(|e| annotate(&self.path, e))?;
            let mut buf = [0u8; CHUNK];
            loop {
                let n = file.read(&mut buf).map_err(|e| annotate(&self.path, e))?;
                if n == 0 {
                    break;
                }
                v.visit_data(&buf[..n])?;
            }
            v.leave_file()
        }
    }
}

/// Decode logical name bytes, surfacing undecodable names as data errors.
fn logical_name(path: &Path, bytes: Vec<u8>) -> Result<String, fingerprint::Error> {
    String::from_utf8(bytes).map_err(|_| {
        annotate(
            path,
            io::Error::new(io::ErrorKind::InvalidData, "name does not decode as utf-8"),
        )
        .into()
    })
}

/// Write an object tree below `path`, which must not yet exist.
///
/// A file object becomes a regular file, a dictionary a directory, and each
/// link entry a file holding the 32 raw fingerprint bytes under a
/// NUL-prefixed quoted name.
pub fn write_to(path: impl Into<PathBuf>, object: &dyn Visit) -> Result<(), Error> {
    let mut writer = DirWriter::new(path.into());
    object.visit(&mut writer)?;
    Ok(())
}

enum Output {
    Pending,
    File {
        declared: u64,
        written: u64,
        out: fs::File,
    },
    Dict,
}

/// A consumer that writes the event stream to disk.
struct DirWriter {
    path: PathBuf,
    output: Output,
    names: HashSet<String>,
}

impl DirWriter {
    fn new(path: PathBuf) -> Self {
        DirWriter {
            path,
            output: Output::Pending,
            names: HashSet::new(),
        }
    }
}

impl Visitor for DirWriter {
    fn enter_file(&mut self, size: u64) -> Result<(), fingerprint::Error> {
        debug!("write file {:?}, sz {size}", self.path);
        let out = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|e| annotate(&self.path, e))?;
        self.output = Output::File {
            declared: size,
            written: 0,
            out,
        };
        Ok(())
    }

    fn visit_data(&mut self, chunk: &[u8]) -> Result<(), fingerprint::Error> {
        match &mut self.output {
            Output::File { written, out, .. } => {
                out.write_all(chunk).map_err(|e| annotate(&self.path, e))?;
                *written += chunk.len() as u64;
                Ok(())
            }
            _ => panic!("visit_data outside of a file"),
        }
    }

    fn leave_file(&mut self) -> Result<(), fingerprint::Error> {
        match std::mem::replace(&mut self.output, Output::Pending) {
            Output::File {
                declared,
                written,
                out,
            } => {
                if written != declared {
                    return Err(fingerprint::ProtocolError::SizeMismatch {
                        declared,
                        emitted: written,
                    }
                    .into());
                }
                out.sync_all().map_err(|e| annotate(&self.path, e))?;
                Ok(())
            }
            _ => panic!("leave_file outside of a file"),
        }
    }

    fn enter_dict(&mut self) -> Result<(), fingerprint::Error> {
        debug!("write dir {:?}", self.path);
        fs::create_dir(&self.path).map_err(|e| annotate(&self.path, e))?;
        self.output = Output::Dict;
        Ok(())
    }

    fn visit_entry(&mut self, name: &str, entry: Entry<'_>) -> Result<(), fingerprint::Error> {
        assert!(
            matches!(self.output, Output::Dict),
            "visit_entry outside of a dictionary"
        );

        validate_name(name)?;
        if !self.names.insert(name.to_string()) {
            return Err(fingerprint::ProtocolError::DuplicateName {
                name: name.to_string(),
            }
            .into());
        }

        match entry {
            Entry::Link(target) => {
                let path = self.path.join(quote_link_name(name));
                debug!("write reference {path:?} ({target})");
                fs::write(&path, target.as_bytes()).map_err(|e| annotate(&path, e))?;
                Ok(())
            }
            Entry::File(object) | Entry::Dict(object) => {
                let path = self.path.join(quote_name(name));
                object.visit(&mut DirWriter::new(path))
            }
        }
    }

    fn leave_dict(&mut self) -> Result<(), fingerprint::Error> {
        match std::mem::replace(&mut self.output, Output::Pending) {
            Output::Dict => Ok(()),
            _ => panic!("leave_dict outside of a dictionary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_round_trips() {
        for name in ["plain", "with space", "a/b", "éclair", "trailing."] {
            let quoted = quote_name(name);
            assert!(
                quoted
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b"%_.~-".contains(&b)),
                "quoted form {quoted:?} must be unreserved"
            );
            assert_eq!(unquote_name(&quoted), name.as_bytes());
        }
    }

    #[test]
    fn quoting_escapes_separators() {
        assert_eq!(quote_name("a/b"), "a%2Fb");
        assert_eq!(quote_name("with space"), "with%20space");
        assert_eq!(quote_name("éclair"), "%C3%A9clair");
    }

    #[test]
    fn leading_dots_are_rewritten() {
        assert_eq!(quote_name(".hidden"), "%2Ehidden");
        assert_eq!(quote_name("."), "%2E");
        assert_eq!(quote_name(".."), "%2E.");
        // Only the leading position needs protection.
        assert_eq!(quote_name("a.b"), "a.b");
        // The rewrite is reversible: %2E decodes right back to a dot.
        assert_eq!(unquote_name("%2Ehidden"), b".hidden");
    }

    #[test]
    fn link_names_carry_a_quoted_nul() {
        assert_eq!(quote_link_name("ref"), "%00ref");
        let decoded = unquote_name("%00ref");
        assert_eq!(decoded.first(), Some(&0u8));
        assert_eq!(decoded[1..], *b"ref");
    }
}
