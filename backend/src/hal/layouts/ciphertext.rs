use std::{
    fmt,
    io::{Error, ErrorKind, Read, Result, Write},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::hal::layouts::{
    ReaderFrom, WriterTo,
    serialization::{MAX_WORDS, expect_tag, read_bytes, write_bytes},
};

const CIPHERTEXT_TAG: u32 = 0x4354_5832;

/// Encrypted batch of `n` slots.
///
/// * `data`: backend-defined payload, opaque outside the backend that
///   produced it.
/// * `size`: number of ring elements; 2 when fresh or relinearized, 3 for
///   a product awaiting relinearization.
/// * `key_id`: identity of the key pair the ciphertext is bound to.
/// * `noise`: estimated invariant noise, in millibits (`log2 * 1000`).
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Ciphertext {
    pub(crate) n: usize,
    pub(crate) data: Vec<u8>,
    pub(crate) size: usize,
    pub(crate) key_id: u64,
    pub(crate) noise: u32,
}

impl Ciphertext {
    /// Empty receiver for [`ReaderFrom::read_from`].
    pub fn alloc(n: usize) -> Self {
        Self {
            n,
            data: Vec::new(),
            size: 2,
            key_id: 0,
            noise: 0,
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn key_id(&self) -> u64 {
        self.key_id
    }

    pub fn noise_mbits(&self) -> u32 {
        self.noise
    }

    /// Serialized payload as produced by the backend.
    pub fn payload(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ciphertext: n={} size={} key={:#018x} noise={}.{:03} bits payload={}B",
            self.n,
            self.size,
            self.key_id,
            self.noise / 1000,
            self.noise % 1000,
            self.data.len()
        )
    }
}

impl WriterTo for Ciphertext {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(CIPHERTEXT_TAG)?;
        writer.write_u64::<LittleEndian>(self.n as u64)?;
        writer.write_u32::<LittleEndian>(self.size as u32)?;
        writer.write_u64::<LittleEndian>(self.key_id)?;
        writer.write_u32::<LittleEndian>(self.noise)?;
        write_bytes(writer, &self.data)
    }
}

impl ReaderFrom for Ciphertext {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        expect_tag(reader, CIPHERTEXT_TAG, "ciphertext")?;
        let n: u64 = reader.read_u64::<LittleEndian>()?;
        let size: usize = reader.read_u32::<LittleEndian>()? as usize;
        let key_id: u64 = reader.read_u64::<LittleEndian>()?;
        let noise: u32 = reader.read_u32::<LittleEndian>()?;
        let data: Vec<u8> = read_bytes(reader)?;
        if n > MAX_WORDS {
            return Err(Error::new(ErrorKind::InvalidData, format!("ciphertext over {n} slots")));
        }
        if size < 2 {
            return Err(Error::new(ErrorKind::InvalidData, format!("ciphertext size {size} < 2")));
        }
        self.n = n as usize;
        self.data = data;
        self.size = size;
        self.key_id = key_id;
        self.noise = noise;
        Ok(())
    }
}
