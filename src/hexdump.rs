//! Hex text to bytes
//!
//! Two dialects are understood:
//! - [`Dialect::Plain`]: every line is a run of hex digit pairs, `.hex` files.
//! - [`Dialect::Dump`]: `xxd` style `address: 4152 4348 ...  ARCH` lines, `.txt` files.
//!   Only the part after the first colon is read and parsing stops at the first
//!   token that isn't a hex pair, so the ascii column is ignored.
//!
//! A malformed line ends ingestion, whatever was decoded up to it is kept.
use std::io::BufRead;
use std::path::Path;

use log::debug;

use crate::error::{HexError, SetupError};
use crate::sink::Sink;

const INITIAL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Plain,
    Dump,
}

impl Dialect {
    pub fn from_path(path: &Path) -> Result<Dialect, SetupError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("hex") => Ok(Dialect::Plain),
            Some("txt") => Ok(Dialect::Dump),
            _ => Err(SetupError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn decode_line(self, line: &[u8], lineno: usize) -> Result<Vec<u8>, HexError> {
        match self {
            Dialect::Plain => decode_plain(line, lineno),
            Dialect::Dump => decode_dump(line, lineno),
        }
    }
}

pub fn reassemble<R: BufRead>(
    reader: R,
    dialect: Dialect,
    sink: &mut dyn Sink,
) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(INITIAL_CAPACITY);

    for (idx, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        let line = trim_end(&line);

        // Blank lines carry nothing in either dialect
        if line.is_empty() {
            continue;
        }

        match dialect.decode_line(line, idx + 1) {
            Ok(bytes) => append(&mut data, &bytes),
            Err(e) => {
                sink.write_error(&e.to_string());
                break;
            }
        }
    }

    debug!("reassembled {} bytes", data.len());
    Ok(data)
}

// Grow by doubling so accumulation stays amortized linear
fn append(data: &mut Vec<u8>, bytes: &[u8]) {
    let need = data.len() + bytes.len();
    if need > data.capacity() {
        let mut cap = data.capacity().max(INITIAL_CAPACITY);
        while cap < need {
            cap *= 2;
        }
        data.reserve_exact(cap - data.len());
    }
    data.extend_from_slice(bytes);
}

fn trim_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &line[..end]
}

fn decode_plain(line: &[u8], lineno: usize) -> Result<Vec<u8>, HexError> {
    hex::decode(line).map_err(|e| match e {
        hex::FromHexError::OddLength => HexError::OddLength {
            line: lineno,
            len: line.len(),
        },
        _ => HexError::InvalidDigit { line: lineno },
    })
}

fn decode_dump(line: &[u8], lineno: usize) -> Result<Vec<u8>, HexError> {
    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or(HexError::MissingAddress { line: lineno })?;

    let mut rest = &line[colon + 1..];
    while let [b' ', tail @ ..] = rest {
        rest = tail;
    }

    let mut out = Vec::with_capacity(16);
    let mut byte = [0u8; 1];
    while rest.len() >= 2 && hex::decode_to_slice(&rest[..2], &mut byte).is_ok() {
        out.push(byte[0]);
        rest = &rest[2..];
        if let [b' ', tail @ ..] = rest {
            rest = tail;
        }
    }
    Ok(out)
}
