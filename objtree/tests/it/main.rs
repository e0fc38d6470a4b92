//! Integration tests: trees moving between memory, disk, and JSON.

use std::fs as stdfs;

use fingerprint::{empty_dict, fingerprint, Fingerprint};
use objtree::{
    fs::{quote_name, write_to, DirSource},
    json::{from_value, to_value, Encoding},
    Tree,
};
use sha2::{Digest, Sha256};

/// Hand-rolled frame for a single file, for cross-checking adapters.
fn file_digest(data: &[u8]) -> Fingerprint {
    let mut digest = Sha256::new();
    digest.update(format!("s{}\0", data.len()).as_bytes());
    digest.update(data);
    Fingerprint::from_bytes(&digest.finalize()[..]).expect("sha-256 digests are 32 bytes")
}

/// Hand-rolled frame for a dictionary of pre-sorted records.
fn dict_digest(records: &[(&str, u8, Fingerprint)]) -> Fingerprint {
    let mut buf = Vec::new();
    for (name, tag, fp) in records {
        buf.push(*tag);
        buf.push(b':');
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
        buf.extend_from_slice(fp.as_bytes());
    }
    let mut digest = Sha256::new();
    digest.update(format!("t{}\0", buf.len()).as_bytes());
    digest.update(&buf);
    Fingerprint::from_bytes(&digest.finalize()[..]).expect("sha-256 digests are 32 bytes")
}

#[test]
fn empty_directory_is_the_empty_dict() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let fp = fingerprint(&DirSource::new(dir.path())).expect("must hash");
    assert_eq!(fp, empty_dict());
}

#[test]
fn directory_with_one_empty_file() {
    let dir = tempfile::tempdir().expect("create tempdir");
    stdfs::write(dir.path().join("a"), b"").expect("write file");

    let fp = fingerprint(&DirSource::new(dir.path())).expect("must hash");
    assert_eq!(fp, dict_digest(&[("a", b's', file_digest(b""))]));
}

#[test]
fn json_and_filesystem_agree() {
    // The same abstract object through two representations.
    let value = serde_json::json!({"a": "hello"});
    let via_json = fingerprint(&from_value(&value).expect("must decode")).expect("must hash");

    let dir = tempfile::tempdir().expect("create tempdir");
    let root = dir.path().join("x");
    stdfs::create_dir(&root).expect("create dir");
    stdfs::write(root.join("a"), b"hello").expect("write file");
    let via_fs = fingerprint(&DirSource::new(&root)).expect("must hash");

    assert_eq!(via_json, via_fs);
    assert_eq!(
        via_json,
        dict_digest(&[("a", b's', file_digest(b"hello"))])
    );
}

#[test]
fn filesystem_round_trip_preserves_the_fingerprint() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let original = dir.path().join("original");
    stdfs::create_dir(&original).expect("create dir");
    stdfs::write(original.join("readme"), b"top-level content").expect("write file");
    stdfs::create_dir(original.join("nested")).expect("create dir");
    stdfs::write(original.join("nested").join("inner"), b"more").expect("write file");
    stdfs::write(original.join(quote_name("with space")), b"odd name").expect("write file");

    let before = fingerprint(&DirSource::new(&original)).expect("must hash");

    for encoding in [Encoding::Text, Encoding::Base64] {
        let value = to_value(&DirSource::new(&original), encoding).expect("must encode");
        let rebuilt = from_value(&value).expect("must decode");

        let copy = dir.path().join(format!("copy-{encoding:?}"));
        write_to(&copy, &rebuilt).expect("must write");
        let after = fingerprint(&DirSource::new(&copy)).expect("must hash");
        assert_eq!(before, after, "{encoding:?} round trip");
    }
}

#[test]
fn link_entries_survive_the_disk_form() {
    let target = Fingerprint::from_bytes([0xab; 32]).expect("32 bytes");
    let tree = Tree::dict([
        ("data".to_string(), Tree::file(b"payload")),
        ("ref".to_string(), Tree::Link(target)),
    ]);

    let dir = tempfile::tempdir().expect("create tempdir");
    let root = dir.path().join("out");
    write_to(&root, &tree).expect("must write");

    // The reference is a NUL-prefixed quoted name holding the raw bytes.
    let link_path = root.join("%00ref");
    let raw = stdfs::read(&link_path).expect("read link file");
    assert_eq!(raw.len(), 32);
    assert_eq!(Fingerprint::from_bytes(raw).expect("32 bytes"), target);

    let reread = fingerprint(&DirSource::new(&root)).expect("must hash");
    assert_eq!(reread, fingerprint(&tree).expect("must hash"));
}

#[test]
fn quoted_names_round_trip_through_disk() {
    let tree = Tree::dict([
        ("with space".to_string(), Tree::file(b"1")),
        ("slash/inside".to_string(), Tree::file(b"2")),
        (".hidden".to_string(), Tree::file(b"3")),
        ("caf\u{e9}".to_string(), Tree::file(b"4")),
    ]);

    let dir = tempfile::tempdir().expect("create tempdir");
    let root = dir.path().join("out");
    write_to(&root, &tree).expect("must write");

    // The dot-led name must not land as a hidden file.
    assert!(root.join("%2Ehidden").exists());

    // Hidden entries are only skipped when named so on disk; %2E is not a dot.
    let reread = fingerprint(&DirSource::new(&root)).expect("must hash");
    assert_eq!(reread, fingerprint(&tree).expect("must hash"));
}

#[test]
fn ignore_patterns_prune_entries() {
    let dir = tempfile::tempdir().expect("create tempdir");
    stdfs::write(dir.path().join("keep"), b"1").expect("write file");
    stdfs::write(dir.path().join("skip.tmp"), b"2").expect("write file");
    stdfs::write(dir.path().join(".hidden"), b"3").expect("write file");

    let patterns = vec![
        glob::Pattern::new(".*").expect("pattern"),
        glob::Pattern::new("*.tmp").expect("pattern"),
    ];
    let fp = fingerprint(&DirSource::with_ignore(dir.path(), patterns)).expect("must hash");
    assert_eq!(fp, dict_digest(&[("keep", b's', file_digest(b"1"))]));

    // Without patterns, everything is visible.
    let all = fingerprint(&DirSource::with_ignore(dir.path(), Vec::new())).expect("must hash");
    assert_eq!(
        all,
        dict_digest(&[
            (".hidden", b's', file_digest(b"3")),
            ("keep", b's', file_digest(b"1")),
            ("skip.tmp", b's', file_digest(b"2")),
        ])
    );
}

#[test]
fn single_file_sources_walk_as_files() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let path = dir.path().join("lone");
    stdfs::write(&path, b"just bytes").expect("write file");

    let fp = fingerprint(&DirSource::new(&path)).expect("must hash");
    assert_eq!(fp, file_digest(b"just bytes"));
}

#[test]
fn writing_refuses_an_existing_destination() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let tree = Tree::file(b"content");
    let path = dir.path().join("exists");
    stdfs::write(&path, b"already here").expect("write file");

    assert!(write_to(&path, &tree).is_err());
    assert_eq!(stdfs::read(&path).expect("read back"), b"already here");
}
