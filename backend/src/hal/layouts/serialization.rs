use std::io::{Error, ErrorKind, Read, Result, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Serialize a layout type to a byte stream.
///
/// All multi-byte integers are written in little-endian order.
pub trait WriterTo {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()>;
}

/// Deserialize a layout type from a byte stream.
///
/// Metadata fields are only updated after the whole payload has been read,
/// so an I/O error leaves the receiver unchanged.
pub trait ReaderFrom {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()>;
}

/// Upper bound on any length prefix, guards allocations against corrupt headers.
pub(crate) const MAX_WORDS: u64 = 1 << 24;
/// Bound on opaque byte payloads; full rotation key sets reach tens of MiB.
pub(crate) const MAX_BYTES: u64 = 1 << 30;

pub(crate) fn write_words<W: Write>(writer: &mut W, words: &[u64]) -> Result<()> {
    writer.write_u64::<LittleEndian>(words.len() as u64)?;
    for w in words {
        writer.write_u64::<LittleEndian>(*w)?;
    }
    Ok(())
}

pub(crate) fn read_words<R: Read>(reader: &mut R) -> Result<Vec<u64>> {
    let len: u64 = reader.read_u64::<LittleEndian>()?;
    if len > MAX_WORDS {
        return Err(Error::new(ErrorKind::InvalidData, format!("length prefix {len} too large")));
    }
    let mut words: Vec<u64> = vec![0u64; len as usize];
    reader.read_u64_into::<LittleEndian>(&mut words)?;
    Ok(words)
}

pub(crate) fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer.write_u64::<LittleEndian>(bytes.len() as u64)?;
    writer.write_all(bytes)
}

pub(crate) fn read_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len: u64 = reader.read_u64::<LittleEndian>()?;
    if len > MAX_BYTES {
        return Err(Error::new(ErrorKind::InvalidData, format!("length prefix {len} too large")));
    }
    let mut bytes: Vec<u8> = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

pub(crate) fn expect_tag<R: Read>(reader: &mut R, want: u32, what: &str) -> Result<()> {
    let have: u32 = reader.read_u32::<LittleEndian>()?;
    if have != want {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("expected {what} tag {want:#x}, found {have:#x}"),
        ));
    }
    Ok(())
}
