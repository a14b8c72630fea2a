//! Entry records
//!
//! After the [container header](crate::header) the archive is a sequence of
//! records, integers in the byte order resolved from the magic:
//!
//! | Type              | Name           | Description |
//! | ----------------: | -------------- | ----------- |
//! | u32               | name_len       | Length of `name` |
//! | [u8; name_len]    | name           | Relative path of the file |
//! | u64               | original_size  | Size of the content once transformed |
//! | u64               | processed_size | Size of `payload` |
//! | u8                | method         | See [`Method`] |
//! | [u8; processed_size] | payload     | Content as stored |
//!
//! Every length is attacker controlled. A length that does not fit in the
//! remaining buffer ends the walk since the next record boundary can't be
//! trusted anymore. Anything else wrong with a record (unknown method, name
//! too long) only costs that record, the cursor still moves past its payload.
use thiserror::Error;

use crate::error::{EntryError, FramingError};
use crate::header::{ContainerHeader, Endian, HEADER_LEN};

/// Default upper bound on `name_len`, names at or above it are rejected
pub const MAX_NAME_LEN: usize = 256;

// name_len + original_size + the method byte
const MIN_ENTRY_LEN: usize = 13;

// original_size + processed_size + method
const FIXED_TAIL_LEN: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    None,
    Zlib,
    Lzma,
    Fernet,
}

impl Method {
    pub fn code(self) -> u8 {
        match self {
            Method::None => 0x00,
            Method::Zlib => 0x01,
            Method::Lzma => 0x02,
            Method::Fernet => 0x03,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::None => "none",
            Method::Zlib => "zlib",
            Method::Lzma => "lzma",
            Method::Fernet => "fernet",
        }
    }

    /// Payload starts with a key segment that is staged ahead of the content
    pub fn is_keyed(self) -> bool {
        self == Method::Fernet
    }
}

impl TryFrom<u8> for Method {
    type Error = EntryError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x00 => Ok(Method::None),
            0x01 => Ok(Method::Zlib),
            0x02 => Ok(Method::Lzma),
            0x03 => Ok(Method::Fernet),
            x => Err(EntryError::UnknownMethod(x)),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct EntryRecord<'a> {
    pub offset: usize,
    pub name: String,
    pub original_size: u64,
    pub processed_size: u64,
    pub method: Method,
    pub payload: &'a [u8],
}

#[derive(Error, Debug)]
pub enum WalkError {
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error("entry at offset {offset}: {error}")]
    Entry {
        offset: usize,
        #[source]
        error: EntryError,
    },
}

pub struct EntryWalker<'a> {
    buf: &'a [u8],
    cursor: usize,
    order: Endian,
    max_name_len: usize,
    done: bool,
}

impl<'a> EntryWalker<'a> {
    pub fn new(buf: &'a [u8], header: &ContainerHeader) -> Self {
        EntryWalker {
            buf,
            cursor: HEADER_LEN,
            order: header.order,
            max_name_len: MAX_NAME_LEN,
            done: false,
        }
    }

    pub fn with_max_name_len(mut self, max_name_len: usize) -> Self {
        self.max_name_len = max_name_len;
        self
    }

    pub fn offset(&self) -> usize {
        self.cursor
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.cursor)
    }

    fn read_entry(&mut self) -> Result<EntryRecord<'a>, WalkError> {
        let offset = self.cursor;

        if self.remaining() < MIN_ENTRY_LEN {
            return Err(FramingError::TruncatedHeader { offset }.into());
        }

        let name_len = self.order.read_u32(&self.buf[self.cursor..]);
        self.cursor += 4;

        let name_end = match (name_len as usize).checked_add(FIXED_TAIL_LEN) {
            Some(need) if need <= self.remaining() => self.cursor + name_len as usize,
            _ => return Err(FramingError::TruncatedEntry { offset, name_len }.into()),
        };
        let name = &self.buf[self.cursor..name_end];
        self.cursor = name_end;

        let original_size = self.order.read_u64(&self.buf[self.cursor..]);
        let processed_size = self.order.read_u64(&self.buf[self.cursor + 8..]);
        self.cursor += 16;

        let method = self.buf[self.cursor];
        self.cursor += 1;

        let size = match usize::try_from(processed_size) {
            Ok(size) if size <= self.remaining() => size,
            _ => {
                return Err(FramingError::PayloadOverrun {
                    offset,
                    size: processed_size,
                }
                .into())
            }
        };
        let payload = &self.buf[self.cursor..self.cursor + size];
        self.cursor += size;

        // Record is fully framed, errors past here only concern this entry
        let entry_err = |error| WalkError::Entry { offset, error };

        if name.len() >= self.max_name_len {
            return Err(entry_err(EntryError::NameTooLong {
                len: name.len(),
                max: self.max_name_len,
            }));
        }
        let method = Method::try_from(method).map_err(entry_err)?;

        Ok(EntryRecord {
            offset,
            name: decode_name(name),
            original_size,
            processed_size,
            method,
            payload,
        })
    }
}

// Names are C strings on the writing side, anything past a NUL is padding
fn decode_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl<'a> Iterator for EntryWalker<'a> {
    type Item = Result<EntryRecord<'a>, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor >= self.buf.len() {
            return None;
        }

        match self.read_entry() {
            Err(WalkError::Framing(e)) => {
                // Can't resync once a length is bogus
                self.done = true;
                Some(Err(WalkError::Framing(e)))
            }
            x => Some(x),
        }
    }
}
