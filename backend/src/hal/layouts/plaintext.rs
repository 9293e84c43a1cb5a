use std::{
    fmt,
    io::{Read, Result, Write},
};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::hal::layouts::{
    ReaderFrom, WriterTo,
    serialization::{expect_tag, read_words, write_words},
};

const PLAINTEXT_TAG: u32 = 0x504c_5431;

/// Encoded batch of `n` slots, each reduced modulo the plaintext modulus.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Plaintext {
    pub(crate) data: Vec<u64>,
}

impl Plaintext {
    pub fn alloc(n: usize) -> Self {
        Self { data: vec![0u64; n] }
    }

    pub fn n(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u64] {
        &self.data
    }
}

impl fmt::Display for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: Vec<u64> = self.data.iter().take(8).copied().collect();
        write!(f, "Plaintext: n={} head={:?}", self.n(), head)
    }
}

impl WriterTo for Plaintext {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(PLAINTEXT_TAG)?;
        write_words(writer, &self.data)
    }
}

impl ReaderFrom for Plaintext {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        expect_tag(reader, PLAINTEXT_TAG, "plaintext")?;
        self.data = read_words(reader)?;
        Ok(())
    }
}
