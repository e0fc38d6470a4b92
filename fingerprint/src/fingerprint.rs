use std::{fmt, str::FromStr};

use data_encoding::{BASE32_NOPAD, BASE64URL_NOPAD};
use lazy_static::lazy_static;
use num_bigint::BigUint;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::ParseError;

/// Length of the body of a compact representation: 34 bytes in unpadded Base64.
const COMPACT_BODY: usize = 46;

/// Length of the body of a long representation: 34 bytes in unpadded Base32.
const LONG_BODY: usize = 55;

/// Length of the body of a hex representation.
const HEX_BODY: usize = 64;

/// Textual representations recognized by the parser.
///
/// Overlap between the shapes is resolved by testing in this order:
/// long, compact, hex. The long form must win over compact since both
/// share the `fp:` lead-in.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
#[non_exhaustive]
pub enum Format {
    /// `fp:` + urlsafe Base64 of the 34 checksummed bytes, unpadded.
    #[strum(serialize = "compact")]
    Compact,

    /// `fp::` + Base32 of the 34 checksummed bytes, unpadded, uppercase.
    #[strum(serialize = "long")]
    Long,

    /// 64 hexadecimal characters, no checksum.
    #[strum(serialize = "hex")]
    Hex,
}

/// A content fingerprint: an immutable 256-bit digest.
///
/// Equality and ordering are byte-wise. Values are only ever constructed by
/// the hashing protocol, by copying, or by decoding one of the recognized
/// representations; there is no way to observe a partially-built fingerprint.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// The fingerprint with all bits clear.
    pub const ZERO: Fingerprint = Fingerprint([0x00; 32]);

    /// The fingerprint with all bits set.
    pub const ONES: Fingerprint = Fingerprint([0xff; 32]);

    /// Interpret a 32-byte sequence as a fingerprint.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self, ParseError> {
        let bytes = bytes.as_ref();
        let fixed = bytes.try_into().map_err(|_| ParseError::BadLength {
            expected: 32,
            found: bytes.len(),
        })?;
        Ok(Fingerprint(fixed))
    }

    /// Interpret a big-endian unsigned integer as a fingerprint.
    ///
    /// Inverse of [`Fingerprint::to_int`] for values in `[0, 2^256)`;
    /// anything larger is [`ParseError::BadValue`].
    pub fn from_int(value: &BigUint) -> Result<Self, ParseError> {
        if value.bits() > 256 {
            return Err(ParseError::BadValue);
        }
        let digits = value.to_bytes_be();
        let mut fixed = [0u8; 32];
        fixed[32 - digits.len()..].copy_from_slice(&digits);
        Ok(Fingerprint(fixed))
    }

    /// The canonical 32-byte form.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The big-endian unsigned integer view of the canonical bytes.
    pub fn to_int(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// The canonical bytes followed by their Fletcher-16 sums, as carried by
    /// the checksum-bearing representations.
    pub(crate) fn checksummed(&self) -> [u8; 34] {
        let mut out = [0u8; 34];
        out[..32].copy_from_slice(&self.0);
        let [a, b] = fletcher16(&self.0);
        out[32] = a;
        out[33] = b;
        out
    }

    /// Render the hexadecimal representation, lowercase.
    ///
    /// `split` introduces a `-` every that many characters for readability;
    /// `None` defaults to 8 and `Some(0)` disables grouping.
    pub fn hex(&self, split: Option<usize>) -> String {
        group(&hex::encode(self.0), split.unwrap_or(8))
    }

    /// Render the compact representation: `fp:` followed by the unpadded
    /// urlsafe Base64 of the checksummed bytes. Always 49 characters.
    pub fn compact(&self) -> String {
        format!("fp:{}", BASE64URL_NOPAD.encode(&self.checksummed()))
    }

    /// Render the long representation: `fp::` followed by the unpadded
    /// uppercase Base32 of the checksummed bytes.
    ///
    /// `split` introduces a `-` every that many characters; `None` defaults
    /// to 4 and `Some(0)` disables grouping.
    pub fn long(&self, split: Option<usize>) -> String {
        let body = BASE32_NOPAD.encode(&self.checksummed());
        format!("fp::{}", group(&body, split.unwrap_or(4)))
    }

    /// Render a C array definition holding the canonical bytes.
    ///
    /// Bytes in the printable ASCII range are emitted literally, except for
    /// `\`, `"`, and `?` (the latter kept out of reach of trigraph
    /// interpretation); everything else becomes a `\xHH` escape.
    pub fn carray(&self) -> String {
        let mut out = String::from("char fp[32] = \"");
        for &c in &self.0 {
            match c {
                b'\\' => out.push_str("\\\\"),
                b'"' => out.push_str("\\\""),
                b'?' => out.push_str("\\x3f"),
                0x20..=0x7e => out.push(c as char),
                _ => out.push_str(&format!("\\x{c:02x}")),
            }
        }
        out.push_str("\";");
        out
    }

    /// Parse a string representation of a fingerprint.
    ///
    /// The input must be exactly one of the recognized forms; on success the
    /// detected [`Format`] is returned alongside the value. The long and hex
    /// forms are case-insensitive and tolerate `-` separators anywhere in the
    /// body; the compact form is exact.
    pub fn parse(input: &str) -> Result<(Self, Format), ParseError> {
        lazy_static! {
            static ref RE_LONG: Regex = Regex::new(r"^[fF][pP]::[A-Za-z2-7-]*$")
                .expect("long representation expression must compile");
            static ref RE_COMPACT: Regex = Regex::new(r"^fp:[A-Za-z0-9_-]*$")
                .expect("compact representation expression must compile");
            static ref RE_HEX: Regex = Regex::new(r"^[0-9a-fA-F-]*$")
                .expect("hex representation expression must compile");
        }

        if RE_LONG.is_match(input) {
            parse_long(input).map(|fp| (fp, Format::Long))
        } else if RE_COMPACT.is_match(input) {
            parse_compact(input).map(|fp| (fp, Format::Compact))
        } else if RE_HEX.is_match(input) {
            parse_hex(input).map(|fp| (fp, Format::Hex))
        } else {
            Err(ParseError::UnknownFormat {
                input: input.to_string(),
            })
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.compact())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.compact())
    }
}

impl FromStr for Fingerprint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fingerprint::parse(s).map(|(fp, _)| fp)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.compact().serialize(serializer)
    }
}

/// Return the two Fletcher-16 sums of a byte sequence, `[a, b]`.
pub(crate) fn fletcher16(bytes: &[u8]) -> [u8; 2] {
    let mut a = 0u32;
    let mut b = 0u32;
    for &c in bytes {
        a = (a + u32::from(c)) % 255;
        b = (a + b) % 255;
    }
    [a as u8, b as u8]
}

/// Insert a `-` every `every` characters; `0` leaves the input whole.
fn group(s: &str, every: usize) -> String {
    if every == 0 {
        return s.to_string();
    }
    s.as_bytes()
        .chunks(every)
        .map(|chunk| std::str::from_utf8(chunk).expect("grouping splits ascii"))
        .collect::<Vec<_>>()
        .join("-")
}

/// Validate the checksum trailer of a decoded 34-byte body.
fn verify_checksum(decoded: &[u8]) -> Result<Fingerprint, ParseError> {
    let (bytes, embedded) = decoded.split_at(decoded.len() - 2);
    let computed = fletcher16(bytes);
    if computed != [embedded[0], embedded[1]] {
        return Err(ParseError::BadChecksum {
            computed,
            embedded: [embedded[0], embedded[1]],
        });
    }
    Fingerprint::from_bytes(bytes)
}

fn parse_compact(input: &str) -> Result<Fingerprint, ParseError> {
    let body = input
        .strip_prefix("fp:")
        .ok_or_else(|| ParseError::BadPrefix {
            input: input.to_string(),
            expected: "fp:",
        })?;
    if body.len() != COMPACT_BODY {
        return Err(ParseError::BadLength {
            expected: COMPACT_BODY,
            found: body.len(),
        });
    }
    let decoded =
        BASE64URL_NOPAD
            .decode(body.as_bytes())
            .map_err(|error| ParseError::BadEncoding {
                message: error.to_string(),
            })?;
    verify_checksum(&decoded)
}

fn parse_long(input: &str) -> Result<Fingerprint, ParseError> {
    let upper = input.to_uppercase();
    let body = upper
        .strip_prefix("FP::")
        .ok_or_else(|| ParseError::BadPrefix {
            input: input.to_string(),
            expected: "fp::",
        })?
        .replace('-', "");
    if body.len() != LONG_BODY {
        return Err(ParseError::BadLength {
            expected: LONG_BODY,
            found: body.len(),
        });
    }
    let decoded = BASE32_NOPAD
        .decode(body.as_bytes())
        .map_err(|error| ParseError::BadEncoding {
            message: error.to_string(),
        })?;
    verify_checksum(&decoded)
}

fn parse_hex(input: &str) -> Result<Fingerprint, ParseError> {
    let body = input.replace('-', "");
    if body.len() != HEX_BODY {
        return Err(ParseError::BadLength {
            expected: HEX_BODY,
            found: body.len(),
        });
    }
    let decoded = hex::decode(&body).map_err(|error| ParseError::BadEncoding {
        message: error.to_string(),
    })?;
    Fingerprint::from_bytes(decoded)
}
