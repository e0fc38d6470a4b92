//! Translate Structured Commons objects between representations.
//!
//! Objects move between a source and a destination, each named as
//! `METHOD:PATH`. The interesting property is that every method meets the
//! others through the same visitor contract, so any source can feed any
//! destination; in particular `fp:` destinations fingerprint the source
//! without materializing it.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(clippy::unwrap_used)]

use std::{
    fs,
    io::{self, Read, Write},
};

use clap::Parser;
use fingerprint::{fingerprint, Visit, Visitor};
use glob::Pattern;
use log::{debug, Level};
use objtree::{
    fs::{write_to, DirSource},
    json::{from_value, to_value, Encoding},
    Tree, TreeBuilder,
};
use stable_eyre::{
    eyre::{bail, eyre, Context},
    Result,
};
use stderrlog::ColorChoice;

const EXAMPLES: &str = "\
Examples:
  objtool fs:. fp:compact
  objtool json:doc.json fs:out
  objtool str:hello fp:hex
  objtool -b fs:tree json:-";

#[derive(Parser, Debug)]
#[clap(version, about, after_help = EXAMPLES)]
struct Cmd {
    /// Include entries whose on-disk names start with a dot.
    #[clap(short, long)]
    all_names: bool,

    /// Skip filesystem entries matching this glob pattern (repeatable).
    #[clap(short, long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// Render JSON file content as base64 arrays instead of text strings.
    #[clap(short, long)]
    base64: bool,

    /// Log walk progress to stderr.
    #[clap(short, long)]
    verbose: bool,

    /// The object to read, as METHOD:PATH ('-' for stdin).
    ///
    /// Methods: fs (directory or file tree), json, raw (bytes),
    /// utf8 (bytes, checked), str (the path text itself is the content).
    #[clap(default_value = "raw:-", value_name = "SOURCE")]
    source: String,

    /// Where to write the object, as METHOD:PATH ('-' for stdout).
    ///
    /// Methods: fs, json, raw, utf8, and fp:FORMAT where FORMAT is one of
    /// compact, long, hex, binary, dec.
    #[clap(default_value = "fp:compact", value_name = "DESTINATION")]
    destination: String,
}

/// An opened source: either a streaming filesystem walk or an owned tree.
enum Source {
    Dir(DirSource),
    Tree(Tree),
}

impl Visit for Source {
    fn visit(&self, v: &mut dyn Visitor) -> Result<(), fingerprint::Error> {
        match self {
            Source::Dir(dir) => dir.visit(v),
            Source::Tree(tree) => tree.visit(v),
        }
    }
}

fn main() -> Result<()> {
    stable_eyre::install()?;
    let cmd = Cmd::parse();
    init_logging(cmd.verbose)?;

    let (src_method, src_name) = split_spec(&cmd.source)?;
    let (dst_method, dst_name) = split_spec(&cmd.destination)?;
    debug!("translating {src_method}:{src_name} into {dst_method}:{dst_name}");

    let source = open_source(src_method, src_name, &cmd)?;
    write_destination(dst_method, dst_name, &source, &cmd)
}

/// Split a `METHOD:PATH` operand.
fn split_spec(spec: &str) -> Result<(&str, &str)> {
    spec.split_once(':')
        .ok_or_else(|| eyre!("expected METHOD:PATH, got '{spec}'"))
}

fn open_source(method: &str, name: &str, cmd: &Cmd) -> Result<Source> {
    match method {
        "fs" => Ok(Source::Dir(DirSource::with_ignore(name, patterns(cmd)?))),
        "raw" => Ok(Source::Tree(Tree::File(read_input(name)?))),
        "utf8" => {
            let data = read_input(name)?;
            std::str::from_utf8(&data).context("source is not valid utf-8")?;
            Ok(Source::Tree(Tree::File(data)))
        }
        "str" => Ok(Source::Tree(Tree::file(name.as_bytes()))),
        "json" => {
            let data = read_input(name)?;
            let value = serde_json::from_slice(&data).context("parse json source")?;
            Ok(Source::Tree(from_value(&value)?))
        }
        other => bail!("unknown input method '{other}'"),
    }
}

fn write_destination(method: &str, name: &str, source: &Source, cmd: &Cmd) -> Result<()> {
    match method {
        "fs" => {
            write_to(name, source)?;
            Ok(())
        }
        "fp" => print_fingerprint(name, source),
        "json" => {
            let encoding = if cmd.base64 {
                Encoding::Base64
            } else {
                Encoding::Text
            };
            let value = to_value(source, encoding)?;
            let mut rendered = serde_json::to_string(&value).context("render json")?;
            rendered.push('\n');
            write_output(name, rendered.as_bytes())
        }
        "raw" => write_output(name, &materialize_file(source)?),
        "utf8" => {
            let data = materialize_file(source)?;
            std::str::from_utf8(&data).context("object content is not valid utf-8")?;
            write_output(name, &data)
        }
        other => bail!("unknown output method '{other}'"),
    }
}

/// Fingerprint the source and print the requested representation.
fn print_fingerprint(format: &str, source: &Source) -> Result<()> {
    let fp = fingerprint(source)?;
    match format {
        "compact" => println!("{}", fp.compact()),
        "long" => println!("{}", fp.long(None)),
        "hex" => println!("{}", fp.hex(None)),
        "dec" => println!("{}", fp.to_int()),
        "binary" => {
            let mut stdout = io::stdout();
            stdout.write_all(fp.as_bytes())?;
            stdout.flush()?;
        }
        other => bail!("unknown fingerprinting method '{other}'"),
    }
    Ok(())
}

/// Run the source through a builder and require a single-file object.
fn materialize_file(source: &Source) -> Result<Vec<u8>> {
    let mut builder = TreeBuilder::new();
    source.visit(&mut builder)?;
    match builder.finish() {
        Tree::File(data) => Ok(data),
        _ => bail!("this destination requires a single file object"),
    }
}

/// The ignore pattern list: dotfiles by default, plus user patterns.
fn patterns(cmd: &Cmd) -> Result<Vec<Pattern>> {
    let mut patterns = Vec::new();
    if !cmd.all_names {
        patterns.push(Pattern::new(".*").expect("dot pattern must compile"));
    }
    for raw in &cmd.ignore {
        patterns.push(Pattern::new(raw).wrap_err_with(|| format!("invalid pattern '{raw}'"))?);
    }
    Ok(patterns)
}

fn read_input(name: &str) -> Result<Vec<u8>> {
    if name == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf).context("read stdin")?;
        Ok(buf)
    } else {
        fs::read(name).wrap_err_with(|| format!("read {name}"))
    }
}

fn write_output(name: &str, data: &[u8]) -> Result<()> {
    if name == "-" {
        let mut stdout = io::stdout();
        stdout.write_all(data).context("write stdout")?;
        stdout.flush().context("flush stdout")?;
    } else {
        fs::write(name, data).wrap_err_with(|| format!("write {name}"))?;
    }
    Ok(())
}

/// Configures the global logger for the application.
fn init_logging(verbose: bool) -> Result<()> {
    stderrlog::new()
        .module(module_path!())
        .module("objtree")
        .color(ColorChoice::Never)
        .verbosity(if verbose { Level::Debug } else { Level::Info })
        .init()?;
    Ok(())
}
