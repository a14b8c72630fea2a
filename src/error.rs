//! Error taxonomy
//!
//! Errors are split by how far they reach:
//! - [`SetupError`] happens before any archive byte is looked at, the run aborts.
//! - [`FramingError`] means a length field can no longer be trusted, the walk aborts.
//! - [`EntryError`] only concerns one record, the walk carries on with the next one.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("failed to read config {path:?}: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to open input file {path:?}: {source}")]
    OpenInput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unsupported file format: {0:?}")]
    UnsupportedFormat(PathBuf),
    #[error("failed to create output directory {path:?}: {source}")]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to open log file {path:?}: {source}")]
    OpenLog {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to open report file {path:?}: {source}")]
    OpenReport {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read archive text: {0}")]
    Read(#[source] std::io::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FramingError {
    #[error("archive too small: {len} bytes")]
    TooSmall { len: usize },
    #[error("invalid magic number: {found:#010x}")]
    BadMagic { found: u32 },
    #[error("incomplete file entry header at offset {offset}")]
    TruncatedHeader { offset: usize },
    #[error("incomplete file entry at offset {offset}: name length {name_len}")]
    TruncatedEntry { offset: usize, name_len: u32 },
    #[error("processed data exceeds archive size at offset {offset}: {size} bytes")]
    PayloadOverrun { offset: usize, size: u64 },
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("failed to execute transform {program:?}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("transform failed with exit code {code:?}")]
    Failed { code: Option<i32> },
}

#[derive(Error, Debug)]
pub enum EntryError {
    #[error("unknown processing method {0:#04x}")]
    UnknownMethod(u8),
    #[error("file name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },
    #[error("unsafe file name {0:?}")]
    UnsafeName(String),
    #[error("payload of {size} bytes too short for key segment")]
    KeyTooShort { size: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Transform(#[from] TransformError),
}

// Line level errors from the text reassembler, these stop ingestion but are not fatal
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HexError {
    #[error("invalid hex line length {len} on line {line}")]
    OddLength { line: usize, len: usize },
    #[error("invalid hex digit on line {line}")]
    InvalidDigit { line: usize },
    #[error("missing address separator on line {line}")]
    MissingAddress { line: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Framing(#[from] FramingError),
}
