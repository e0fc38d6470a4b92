//! Inspect, convert, and compare content fingerprints.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(clippy::unwrap_used)]

use std::{
    io::{self, Write},
    process::ExitCode,
};

use clap::Parser;
use fingerprint::{Fingerprint, Format};
use stable_eyre::Result;

const EXAMPLES: &str = "\
Examples:
  fptool -a fp:s5pIIHf32iiVNH_eBGBMXtlXhMa7dI3w9KBrvHZ-v1NRAA
  fptool -f hex fp::WONEQIDX67NCRFJUP7PAIYCML3MVPBGGXN2I34HUUBV3Y5T6X5JVCAA
  fptool -f long -s 2 b39a4820-77f7da28-95347fde-04604c5e-d95784c6-bb748df0-f4a06bbc-767ebf53
  fptool -f binary ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff
  fptool -c fp:s5pIIHf32iiVNH_eBGBMXtlXhMa7dI3w9KBrvHZ-v1NRAA \\
         fp:FvYPWVbnhezNY5vdtqyyef0wpvj149A7SquozxdVe3jigg";

#[derive(Parser, Debug)]
#[clap(version, about, after_help = EXAMPLES)]
struct Cmd {
    /// Display every representation of each fingerprint.
    #[clap(short, long, conflicts_with = "compare")]
    all: bool,

    /// Compare the fingerprints; report positions differing from the first.
    #[clap(short, long)]
    compare: bool,

    /// Display one specific representation instead of the detected one.
    #[clap(short, long, value_enum, conflicts_with_all = ["all", "compare"])]
    format: Option<Output>,

    /// Split long and hex forms with hyphens every N characters (0 disables).
    #[clap(short, long, value_name = "N")]
    split: Option<usize>,

    /// The fingerprints to inspect, in any recognized form.
    #[clap(required = true, value_name = "FINGERPRINT")]
    fingerprints: Vec<String>,
}

/// Representations selectable with `--format`.
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Output {
    /// Base64-coded with checksum.
    Compact,

    /// Base32-coded with checksum.
    Long,

    /// Hexadecimal bytes without checksum.
    Hex,

    /// The raw 32 bytes.
    Binary,

    /// A C char array definition.
    Carray,

    /// Decimal, big endian.
    Dec,
}

fn main() -> Result<ExitCode> {
    stable_eyre::install()?;
    let cmd = Cmd::parse();

    // Collect every argument before deciding the outcome, so that one bad
    // input does not hide diagnostics for the rest.
    let mut parsed = Vec::new();
    let mut has_error = false;
    for input in &cmd.fingerprints {
        match Fingerprint::parse(input) {
            Ok((fp, format)) => parsed.push((fp, format, input.as_str())),
            Err(error) => {
                eprintln!("error: unable to recognize '{input}'");
                eprintln!("error: {error}");
                has_error = true;
            }
        }
    }
    if has_error {
        return Ok(ExitCode::FAILURE);
    }

    if cmd.compare {
        return Ok(compare(&parsed));
    }

    let mut stdout = io::stdout();
    for (fp, detected, input) in &parsed {
        if cmd.all {
            println!(
                "Argument: '{input}' ({detected})\n\
                 \x20 compact: {}\n\
                 \x20 long:    {}\n\
                 \x20 hex:     {}\n\
                 \x20 dec:     {}\n\
                 \x20 carray:  {}",
                fp.compact(),
                fp.long(cmd.split),
                fp.hex(cmd.split),
                fp.to_int(),
                fp.carray(),
            );
            continue;
        }

        let output = cmd.format.unwrap_or(match detected {
            Format::Long => Output::Long,
            Format::Hex => Output::Hex,
            _ => Output::Compact,
        });
        match output {
            Output::Compact => println!("{}", fp.compact()),
            Output::Long => println!("{}", fp.long(cmd.split)),
            Output::Hex => println!("{}", fp.hex(cmd.split)),
            Output::Binary => stdout.write_all(fp.as_bytes())?,
            Output::Carray => println!("{}", fp.carray()),
            Output::Dec => println!("{}", fp.to_int()),
        }
    }

    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}

/// Compare all fingerprints against the first; equal means success.
fn compare(parsed: &[(Fingerprint, Format, &str)]) -> ExitCode {
    let differing = differing_positions(parsed.iter().map(|(fp, _, _)| *fp));
    if differing.is_empty() {
        ExitCode::SUCCESS
    } else {
        let positions: Vec<String> = differing.iter().map(ToString::to_string).collect();
        eprintln!(
            "fingerprints at positions {} differ from the first",
            positions.join(", ")
        );
        ExitCode::FAILURE
    }
}

/// Positions of fingerprints that do not equal the first one.
fn differing_positions(fingerprints: impl IntoIterator<Item = Fingerprint>) -> Vec<usize> {
    let mut fingerprints = fingerprints.into_iter();
    let Some(first) = fingerprints.next() else {
        return Vec::new();
    };
    fingerprints
        .enumerate()
        .filter(|(_, fp)| *fp != first)
        .map(|(index, _)| index + 1)
        .collect()
}
