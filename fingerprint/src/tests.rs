//! Crate-level tests: golden vectors and protocol properties.

use assert_matches::assert_matches;
use num_bigint::BigUint;
use proptest::prelude::*;
use sha2::{Digest, Sha256};

use crate::{
    empty_dict, empty_file, fingerprint, Entry, Error, Fingerprint, Format, Hasher,
    ProtocolError, Visit, Visitor,
};

/// A throwaway concrete tree for driving the protocol from tests.
///
/// Unlike a real producer it happily emits entries in whatever order (and
/// with whatever duplicates) a test puts in the vector.
enum Node {
    File(Vec<u8>),
    Dict(Vec<(String, Node)>),
    Link(Fingerprint),
}

impl Node {
    fn file(data: impl AsRef<[u8]>) -> Node {
        Node::File(data.as_ref().to_vec())
    }

    fn dict(entries: Vec<(&str, Node)>) -> Node {
        Node::Dict(
            entries
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
        )
    }
}

impl Visit for Node {
    fn visit(&self, v: &mut dyn Visitor) -> Result<(), Error> {
        match self {
            Node::File(data) => {
                v.enter_file(data.len() as u64)?;
                v.visit_data(data)?;
                v.leave_file()
            }
            Node::Dict(entries) => {
                v.enter_dict()?;
                for (name, child) in entries {
                    let entry = match child {
                        Node::File(_) => Entry::File(child),
                        Node::Dict(_) => Entry::Dict(child),
                        Node::Link(fp) => Entry::Link(*fp),
                    };
                    v.visit_entry(name, entry)?;
                }
                v.leave_dict()
            }
            Node::Link(_) => unreachable!("links appear only as dictionary entries"),
        }
    }
}

/// The framed digest of a single file, computed longhand.
fn file_digest(data: &[u8]) -> Fingerprint {
    let mut digest = Sha256::new();
    digest.update(b"s");
    digest.update(data.len().to_string().as_bytes());
    digest.update([0u8]);
    digest.update(data);
    Fingerprint::from_bytes(&digest.finalize()[..]).expect("sha-256 digests are 32 bytes")
}

/// The framed digest of a dictionary, computed longhand from records that the
/// caller has already sorted by name bytes.
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
    digest.update(b"t");
    digest.update(buf.len().to_string().as_bytes());
    digest.update([0u8]);
    digest.update(&buf);
    Fingerprint::from_bytes(&digest.finalize()[..]).expect("sha-256 digests are 32 bytes")
}

#[test]
fn empty_file_vector() {
    let fp = empty_file();
    assert_eq!(fp, file_digest(b""));
    assert_eq!(fp.compact(), "fp:s5pIIHf32iiVNH_eBGBMXtlXhMa7dI3w9KBrvHZ-v1NRAA");
}

#[test]
fn empty_dict_vector() {
    let fp = empty_dict();
    assert_eq!(fp, dict_digest(&[]));
    assert_eq!(
        fp.long(None),
        "fp::WONE-QIDX-67NC-RFJU-P7PA-IYCM-L3MV-PBGG-XN2I-34HU-UBV3-Y5T6-X5JV-CAA"
    );

    // The long decoder tolerates missing separators and lowercase.
    for variant in [
        "fp::WONEQIDX67NCRFJUP7PAIYCML3MVPBGGXN2I34HUUBV3Y5T6X5JVCAA",
        "fp::woneqidx67ncrfjup7paiycml3mvpbggxn2i34huubv3y5t6x5jvcaa",
    ] {
        let (parsed, format) = Fingerprint::parse(variant).expect("variant must parse");
        assert_eq!(parsed, fp);
        assert_eq!(format, Format::Long);
    }
}

#[test]
fn integer_vector() {
    let n: BigUint = "81236592145469940157203126607178760648047830708351681206000552870365001334611"
        .parse()
        .expect("decimal digits");
    let fp = Fingerprint::from_int(&n).expect("in range");
    assert_eq!(fp.compact(), "fp:FvYPWVbnhezNY5vdtqyyef0wpvj149A7SquozxdVe3jigg");
    assert_eq!(
        fp.hex(None),
        "b39a4820-77f7da28-95347fde-04604c5e-d95784c6-bb748df0-f4a06bbc-767ebf53"
    );
    assert_eq!(fp.to_int(), n);

    let (from_hex, format) =
        Fingerprint::parse("B39A4820-77F7DA28-95347FDE-04604C5E-D95784C6-BB748DF0-F4A06BBC-767EBF53")
            .expect("hex vector");
    assert_eq!(from_hex, fp);
    assert_eq!(format, Format::Hex);
}

#[test]
fn representation_sizes_hold_for_well_known_values() {
    for fp in [empty_file(), empty_dict(), Fingerprint::ZERO, Fingerprint::ONES] {
        assert_eq!(fp.compact().len(), 49);
        assert_eq!(fp.hex(None).replace('-', "").len(), 64);
        assert_eq!(fp.long(None).replace('-', "").len(), 59);
        assert_eq!(fp.as_bytes().len(), 32);
        assert!(fp.to_int() < (BigUint::from(1u8) << 256));
    }
}

#[test]
fn file_framing() {
    let fp = fingerprint(&Node::file(b"hello")).expect("must hash");
    assert_eq!(fp, file_digest(b"hello"));

    // Also longhand: the frame is the ASCII size, a NUL, then the data.
    let mut digest = Sha256::new();
    digest.update(b"s5\0hello");
    assert_eq!(fp.as_bytes()[..], digest.finalize()[..]);
}

#[test]
fn chunking_does_not_affect_the_digest() {
    struct Chunked<'a>(&'a [&'a [u8]]);
    impl Visit for Chunked<'_> {
        fn visit(&self, v: &mut dyn Visitor) -> Result<(), Error> {
            let total: usize = self.0.iter().map(|c| c.len()).sum();
            v.enter_file(total as u64)?;
            for chunk in self.0 {
                v.visit_data(chunk)?;
            }
            v.leave_file()
        }
    }

    let whole = fingerprint(&Node::file(b"hello world")).expect("must hash");
    let split = fingerprint(&Chunked(&[b"hel", b"lo ", b"", b"world"])).expect("must hash");
    assert_eq!(whole, split);
}

#[test]
fn dict_framing() {
    let fp = fingerprint(&Node::dict(vec![("a", Node::file(b"hello"))])).expect("must hash");
    assert_eq!(fp, dict_digest(&[("a", b's', file_digest(b"hello"))]));
}

#[test]
fn link_entries_use_the_referenced_fingerprint() {
    let target = Fingerprint::from_bytes([0x11; 32]).expect("32 bytes");
    let fp = fingerprint(&Node::dict(vec![("ref", Node::Link(target))])).expect("must hash");
    assert_eq!(fp, dict_digest(&[("ref", b'l', target)]));
}

#[test]
fn nested_dicts() {
    let tree = Node::dict(vec![(
        "inner",
        Node::dict(vec![("leaf", Node::file(b""))]),
    )]);
    let inner = dict_digest(&[("leaf", b's', file_digest(b""))]);
    assert_eq!(
        fingerprint(&tree).expect("must hash"),
        dict_digest(&[("inner", b't', inner)])
    );
}

#[test]
fn entry_order_does_not_affect_the_digest() {
    let forward = Node::dict(vec![
        ("a", Node::file(b"1")),
        ("b", Node::file(b"2")),
        ("c", Node::dict(vec![])),
    ]);
    let backward = Node::dict(vec![
        ("c", Node::dict(vec![])),
        ("b", Node::file(b"2")),
        ("a", Node::file(b"1")),
    ]);
    assert_eq!(
        fingerprint(&forward).expect("must hash"),
        fingerprint(&backward).expect("must hash")
    );
}

#[test]
fn names_sort_by_utf8_bytes() {
    // 'z' (0x7a) precedes 'é' (0xc3 0xa9) in byte order, though a naive
    // locale sort would say otherwise.
    let tree = Node::dict(vec![
        ("é", Node::file(b"accent")),
        ("z", Node::file(b"plain")),
    ]);
    let expected = dict_digest(&[
        ("z", b's', file_digest(b"plain")),
        ("é", b's', file_digest(b"accent")),
    ]);
    assert_eq!(fingerprint(&tree).expect("must hash"), expected);
}

#[test]
fn duplicate_names_fail() {
    let tree = Node::dict(vec![
        ("same", Node::file(b"1")),
        ("same", Node::file(b"2")),
    ]);
    assert_matches!(
        fingerprint(&tree),
        Err(Error::Protocol(ProtocolError::DuplicateName { name })) if name == "same"
    );
}

#[test]
fn control_characters_in_names_fail() {
    let tree = Node::dict(vec![("a\u{1}b", Node::file(b""))]);
    assert_matches!(
        fingerprint(&tree),
        Err(Error::Protocol(ProtocolError::InvalidName { code: 1, .. }))
    );

    let empty = Node::dict(vec![("", Node::file(b""))]);
    assert_matches!(
        fingerprint(&empty),
        Err(Error::Protocol(ProtocolError::EmptyName))
    );
}

#[test]
fn size_mismatch_fails_at_leave_file() {
    struct Short;
    impl Visit for Short {
        fn visit(&self, v: &mut dyn Visitor) -> Result<(), Error> {
            v.enter_file(3)?;
            v.visit_data(b"ab")?;
            v.leave_file()
        }
    }
    assert_matches!(
        fingerprint(&Short),
        Err(Error::Protocol(ProtocolError::SizeMismatch {
            declared: 3,
            emitted: 2
        }))
    );
}

#[test]
fn mislabeled_entries_fail() {
    // Declares its child as a file, but the child walks as a dictionary.
    struct Mislabeled;
    impl Visit for Mislabeled {
        fn visit(&self, v: &mut dyn Visitor) -> Result<(), Error> {
            v.enter_dict()?;
            v.visit_entry("child", Entry::File(&Node::dict(vec![])))?;
            v.leave_dict()
        }
    }
    assert_matches!(
        fingerprint(&Mislabeled),
        Err(Error::Protocol(ProtocolError::WrongKind { .. }))
    );
}

#[test]
#[should_panic(expected = "before the walk completed")]
fn unfinished_walks_have_no_fingerprint() {
    let mut hasher = Hasher::new();
    hasher.enter_file(1).expect("must enter");
    hasher.finish();
}

proptest! {
    #[test]
    fn all_values_round_trip(bytes in prop::array::uniform32(any::<u8>())) {
        let fp = Fingerprint::from_bytes(bytes).expect("32 bytes");
        prop_assert_eq!(Fingerprint::parse(&fp.compact()).expect("compact"), (fp, Format::Compact));
        prop_assert_eq!(Fingerprint::parse(&fp.long(None)).expect("long"), (fp, Format::Long));
        prop_assert_eq!(Fingerprint::parse(&fp.hex(None)).expect("hex"), (fp, Format::Hex));
        prop_assert_eq!(Fingerprint::from_int(&fp.to_int()).expect("in range"), fp);
    }

    #[test]
    fn file_digests_match_the_frame(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let fp = fingerprint(&Node::File(data.clone())).expect("must hash");
        prop_assert_eq!(fp, file_digest(&data));
    }

    #[test]
    fn checksum_catches_single_byte_corruption(
        bytes in prop::array::uniform32(any::<u8>()),
        position in 0usize..34,
        flip in 1u8..=255,
    ) {
        let fp = Fingerprint::from_bytes(bytes).expect("32 bytes");
        let mut body = fp.checksummed();
        let old = body[position];
        body[position] ^= flip;
        // 0x00 and 0xff coincide modulo 255; that one aliasing pair is the
        // documented blind spot of the Fletcher sums.
        prop_assume!(!matches!((old, body[position]), (0x00, 0xff) | (0xff, 0x00)));
        let corrupted = format!("fp:{}", data_encoding::BASE64URL_NOPAD.encode(&body));
        prop_assert!(Fingerprint::parse(&corrupted).is_err());
    }
}
