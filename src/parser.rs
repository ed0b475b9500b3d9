//! Format sniffing and decoding of option files.
//!
//! An option file is tried as YAML, then JSON, then `;`-delimited text.
//! Each attempt either decodes the file, reports a miss so the next format
//! is tried, or fails the whole parse.

use crate::config::{GeneratorOpts, HasArgument, OptionDescriptor};
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error};

/// Keys a structured document must carry at its top level.
const REQUIRED_KEYS: [&str; 2] = ["generator_opts", "bash_opts"];
/// Bytes inspected before committing to the delimited reader.
const SNIFF_LEN: usize = 1024;
/// Fields expected on every delimited row.
const CSV_FIELDS: usize = 4;
/// serde_yaml errors raised on well-formed markup.
const YAML_STRUCTURAL_ERRORS: [&str; 2] = ["duplicate entry", "more than one document"];
/// YAML 1.1 spellings of `true` that YAML 1.2 reads as plain strings.
const YAML11_TRUE: [&str; 7] = ["y", "Y", "Yes", "YES", "on", "On", "ON"];

/// Supported option-file encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Csv,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Yaml => "YAML",
            Format::Json => "JSON",
            Format::Csv => "CSV",
        })
    }
}

/// Position of a syntax error, both one-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// Why a format was ruled out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Miss {
    pub format: Format,
    pub reason: String,
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.format, self.reason)
    }
}

/// Errors that can occur while reading an option file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{format} file found, but the format is incorrect{}: {message}", describe_location(.location))]
    Malformed {
        format: Format,
        message: String,
        location: Option<Location>,
    },

    #[error("[UNHANDLED] {format} decoder failed: {message}")]
    Unexpected { format: Format, message: String },

    #[error("no supported format matched ({})", describe_misses(.misses))]
    FormatUnrecognized { misses: Vec<Miss> },

    #[error("failed to read option file: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_location(location: &Option<Location>) -> String {
    match location {
        Some(location) => format!(" (line {}, column {})", location.line, location.column),
        None => String::new(),
    }
}

fn describe_misses(misses: &[Miss]) -> String {
    misses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A decoded option file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptsFile {
    pub format: Format,
    pub overrides: GeneratorOpts,
    pub descriptors: Vec<OptionDescriptor>,
}

/// Outcome of trying one format.
#[derive(Debug)]
enum Attempt {
    Parsed(OptsFile),
    Miss(String),
}

type Trial = fn(&str) -> Result<Attempt, ParseError>;

/// Formats in the order they are tried.
const TRIALS: [(Format, Trial); 3] = [
    (Format::Yaml, parse_as_yaml),
    (Format::Json, parse_as_json),
    (Format::Csv, parse_as_csv),
];

#[derive(Deserialize)]
struct OptsDocument {
    generator_opts: Option<GeneratorOpts>,
    bash_opts: Vec<OptionDescriptor>,
}

impl OptsDocument {
    fn into_opts_file(self, format: Format) -> OptsFile {
        OptsFile {
            format,
            overrides: self.generator_opts.unwrap_or_default(),
            descriptors: self.bash_opts,
        }
    }
}

/// Parse an option file from its path.
pub fn parse_opts_file(path: &Path) -> Result<OptsFile, ParseError> {
    let file = File::open(path)?;
    parse_opts(file)
}

/// Read a stream to its end and decode it.
pub fn parse_opts<R: Read>(mut reader: R) -> Result<OptsFile, ParseError> {
    let mut input = String::new();
    reader.read_to_string(&mut input)?;
    parse_opts_str(&input)
}

/// Decode an option file, trying each format in turn.
///
/// The first format that decodes wins. A YAML syntax error stops the
/// search; structural mismatches move on to the next format.
pub fn parse_opts_str(input: &str) -> Result<OptsFile, ParseError> {
    let mut misses = Vec::new();

    for (format, trial) in TRIALS {
        match trial(input)? {
            Attempt::Parsed(file) => {
                debug!(
                    %format,
                    descriptors = file.descriptors.len(),
                    "decoded option file"
                );
                return Ok(file);
            }
            Attempt::Miss(reason) => {
                debug!("option file is not a {}: {}", format, reason);
                misses.push(Miss { format, reason });
            }
        }
    }

    Err(ParseError::FormatUnrecognized { misses })
}

fn missing_key(has_key: impl Fn(&str) -> bool) -> Option<&'static str> {
    REQUIRED_KEYS.into_iter().find(|key| !has_key(key))
}

fn parse_as_yaml(input: &str) -> Result<Attempt, ParseError> {
    if input.trim().is_empty() {
        return Ok(Attempt::Miss("empty document".to_string()));
    }

    let mut value: serde_yaml::Value = match serde_yaml::from_str(input) {
        Ok(value) => value,
        // libyaml rejects some valid JSON, such as surrogate-pair escapes
        Err(err) if serde_json::from_str::<serde_json::Value>(input).is_ok() => {
            return Ok(Attempt::Miss(format!("{} (input is valid JSON)", err)));
        }
        Err(err) if !is_syntax_error(&err) => return Ok(Attempt::Miss(err.to_string())),
        Err(err) => {
            return Err(ParseError::Malformed {
                format: Format::Yaml,
                location: err.location().map(|location| Location {
                    line: location.line(),
                    column: location.column(),
                }),
                message: err.to_string(),
            })
        }
    };

    let serde_yaml::Value::Mapping(ref mapping) = value else {
        return Ok(Attempt::Miss("top level is not a mapping".to_string()));
    };
    if let Some(key) = missing_key(|key| mapping.contains_key(key)) {
        return Ok(Attempt::Miss(format!("missing key `{}`", key)));
    }

    promote_yaml11_booleans(&mut value);

    match serde_yaml::from_value::<OptsDocument>(value) {
        Ok(document) => Ok(Attempt::Parsed(document.into_opts_file(Format::Yaml))),
        Err(err) => Ok(Attempt::Miss(err.to_string())),
    }
}

/// Duplicate keys and multi-document streams decode fine as markup; only
/// scanner and parser failures count as syntax errors.
fn is_syntax_error(err: &serde_yaml::Error) -> bool {
    let message = err.to_string();
    !YAML_STRUCTURAL_ERRORS
        .iter()
        .any(|structural| message.contains(structural))
}

/// Rewrite `has_argument` scalars that YAML 1.1 reads as `true`.
///
/// serde_yaml follows YAML 1.2 and keeps `on`, `y` and friends as strings.
fn promote_yaml11_booleans(document: &mut serde_yaml::Value) {
    let Some(serde_yaml::Value::Sequence(entries)) = document.get_mut("bash_opts") else {
        return;
    };

    for entry in entries {
        if let Some(has_argument) = entry.get_mut("has_argument") {
            if has_argument
                .as_str()
                .is_some_and(|scalar| YAML11_TRUE.contains(&scalar))
            {
                *has_argument = serde_yaml::Value::Bool(true);
            }
        }
    }
}

fn parse_as_json(input: &str) -> Result<Attempt, ParseError> {
    let value: serde_json::Value = match serde_json::from_str(input) {
        Ok(value) => value,
        Err(err) if err.is_io() => return Err(unhandled(Format::Json, err)),
        Err(err) => return Ok(Attempt::Miss(err.to_string())),
    };

    let serde_json::Value::Object(ref object) = value else {
        return Ok(Attempt::Miss("top level is not an object".to_string()));
    };
    if let Some(key) = missing_key(|key| object.contains_key(key)) {
        return Ok(Attempt::Miss(format!("missing key `{}`", key)));
    }

    match serde_json::from_value::<OptsDocument>(value) {
        Ok(document) => Ok(Attempt::Parsed(document.into_opts_file(Format::Json))),
        Err(err) => Ok(Attempt::Miss(err.to_string())),
    }
}

fn parse_as_csv(input: &str) -> Result<Attempt, ParseError> {
    if !looks_delimited(sniff_prefix(input)) {
        return Ok(Attempt::Miss(format!(
            "no `;`-delimited line in the first {} bytes",
            SNIFF_LEN
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .quote(b'"')
        .comment(Some(b'#'))
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_bytes());

    let mut descriptors = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => {
                return Err(unhandled(Format::Csv, err));
            }
            Err(err) => return Ok(Attempt::Miss(err.to_string())),
        };

        if record.len() < CSV_FIELDS {
            return Ok(Attempt::Miss(format!(
                "row {} has {} fields, expected at least {}",
                row + 1,
                record.len(),
                CSV_FIELDS
            )));
        }

        descriptors.push(OptionDescriptor::flag(
            &record[0],
            &record[1],
            HasArgument::from(&record[2]),
            &record[3],
        ));
    }

    Ok(Attempt::Parsed(OptsFile {
        format: Format::Csv,
        overrides: GeneratorOpts::default(),
        descriptors,
    }))
}

/// Log and wrap a decoder failure that is not a format mismatch.
fn unhandled(format: Format, err: impl fmt::Display) -> ParseError {
    error!("[UNHANDLED] option file is not a {}: {}", format, err);
    ParseError::Unexpected {
        format,
        message: err.to_string(),
    }
}

/// Leading slice of the input, cut on a character boundary.
fn sniff_prefix(input: &str) -> &str {
    let mut end = input.len().min(SNIFF_LEN);
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

fn looks_delimited(sample: &str) -> bool {
    sample
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| line.contains(';'))
}
