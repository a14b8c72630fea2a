//! Container header
//!
//! Every archive starts with a 5 byte prefix:
//!
//! | Offset | Type | Name    | Description |
//! | -----: | ---- | ------- | ----------- |
//! | 0      | u32  | magic   | [`MAGIC`] in either byte order |
//! | 4      | u8   | version | Archive format version, informational only |
//!
//! The byte order the magic matched in is the byte order of every other
//! multi-byte integer in the archive. Big endian is tried first.
use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::FramingError;

/// `ARCH` when read big endian
pub const MAGIC: u32 = 0x4152_4348;

/// Magic + version, the first record starts right after
pub const HEADER_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Big => BigEndian::read_u32(buf),
            Endian::Little => LittleEndian::read_u32(buf),
        }
    }

    pub fn read_u64(self, buf: &[u8]) -> u64 {
        match self {
            Endian::Big => BigEndian::read_u64(buf),
            Endian::Little => LittleEndian::read_u64(buf),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub magic: u32,
    pub version: u8,
    pub order: Endian,
}

pub fn detect(buf: &[u8]) -> Result<ContainerHeader, FramingError> {
    if buf.len() < HEADER_LEN {
        return Err(FramingError::TooSmall { len: buf.len() });
    }

    let order = match Endian::Big.read_u32(&buf[..4]) {
        MAGIC => Endian::Big,
        found => {
            if Endian::Little.read_u32(&buf[..4]) != MAGIC {
                return Err(FramingError::BadMagic { found });
            }
            Endian::Little
        }
    };

    Ok(ContainerHeader {
        magic: MAGIC,
        version: buf[4],
        order,
    })
}
