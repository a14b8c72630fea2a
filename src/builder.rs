use std::io::{Error, Write};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use crate::header::{Endian, MAGIC};

// Bytes per line in the dump dialect
const DUMP_WIDTH: usize = 16;

pub struct ArchiveBuilder<W: Write> {
    inner: W,
    order: Endian,
}

// Writes the binary container, mostly useful for producing fixtures
impl<W: Write> ArchiveBuilder<W> {
    pub fn new(writer: W, order: Endian) -> Self {
        ArchiveBuilder {
            inner: writer,
            order,
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_u32(&mut self, n: u32) -> Result<usize, Error> {
        match self.order {
            Endian::Big => self.inner.write_u32::<BigEndian>(n)?,
            Endian::Little => self.inner.write_u32::<LittleEndian>(n)?,
        }
        Ok(4)
    }

    fn write_u64(&mut self, n: u64) -> Result<usize, Error> {
        match self.order {
            Endian::Big => self.inner.write_u64::<BigEndian>(n)?,
            Endian::Little => self.inner.write_u64::<LittleEndian>(n)?,
        }
        Ok(8)
    }

    pub fn write_header(&mut self, version: u8) -> Result<usize, Error> {
        let mut len = self.write_u32(MAGIC)?;
        self.inner.write_u8(version)?;
        len += 1;

        Ok(len)
    }

    // Method is a raw byte so that unknown methods can be written too
    pub fn write_entry(
        &mut self,
        name: &str,
        original_size: u64,
        method: u8,
        payload: &[u8],
    ) -> Result<usize, Error> {
        let mut len = 0;
        len += self.write_u32(name.len() as u32)?;
        self.inner.write_all(name.as_bytes())?;
        len += name.len();
        len += self.write_u64(original_size)?;
        len += self.write_u64(payload.len() as u64)?;
        self.inner.write_u8(method)?;
        len += 1;
        self.inner.write_all(payload)?;
        len += payload.len();

        Ok(len)
    }

    pub fn write_raw(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.inner.write_all(data)?;
        Ok(data.len())
    }
}

/// Plain dialect, `width` bytes of lowercase hex per line
pub fn to_plain_hex(data: &[u8], width: usize) -> String {
    let mut out = String::with_capacity(data.len() * 2 + data.len() / width.max(1) + 1);
    for line in data.chunks(width.max(1)) {
        out.push_str(&hex::encode(line));
        out.push('\n');
    }
    out
}

/// Dump dialect, same layout as `xxd`
///
/// `00000000: 4152 4348 0100 0000 0561 2e74 7874 0000  ARCH.....a.txt..`
pub fn to_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (idx, line) in data.chunks(DUMP_WIDTH).enumerate() {
        let groups: Vec<String> = line.chunks(2).map(hex::encode).collect();
        let ascii: String = line
            .iter()
            .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
            .collect();

        out.push_str(&format!(
            "{:08x}: {:<39}  {}\n",
            idx * DUMP_WIDTH,
            groups.join(" "),
            ascii
        ));
    }
    out
}
