use std::{
    fmt,
    io::{Error, ErrorKind, Read, Result, Write},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::hal::{
    error::HeError,
    layouts::{
        ReaderFrom, WriterTo,
        serialization::{MAX_WORDS, expect_tag, read_bytes, write_bytes},
    },
};

const SECRET_KEY_TAG: u32 = 0x534b_4531;
const PUBLIC_KEY_TAG: u32 = 0x504b_4531;
const RELIN_KEY_TAG: u32 = 0x524b_4531;
const GALOIS_KEYS_TAG: u32 = 0x474b_4531;

/// Decryption key. Only the resolver role ever holds one.
#[derive(PartialEq, Eq, Clone, Default)]
pub struct SecretKey {
    pub(crate) key_id: u64,
    pub(crate) data: Vec<u8>,
}

/// Encryption key.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct PublicKey {
    pub(crate) key_id: u64,
    pub(crate) data: Vec<u8>,
}

/// Relinearization key: brings a size-3 product back to size 2.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct RelinKey {
    pub(crate) key_id: u64,
    pub(crate) data: Vec<u8>,
}

/// Row-rotation keys, one per rotation step in `steps`.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct GaloisKeys {
    pub(crate) key_id: u64,
    pub(crate) steps: Vec<i64>,
    pub(crate) data: Vec<u8>,
}

impl SecretKey {
    pub fn key_id(&self) -> u64 {
        self.key_id
    }
}

impl PublicKey {
    pub fn key_id(&self) -> u64 {
        self.key_id
    }
}

impl RelinKey {
    pub fn key_id(&self) -> u64 {
        self.key_id
    }
}

impl GaloisKeys {
    pub fn key_id(&self) -> u64 {
        self.key_id
    }

    pub fn steps(&self) -> &[i64] {
        &self.steps
    }

    /// True if a key exists for a step congruent to `step` modulo `row_size`.
    pub fn covers(&self, step: i64, row_size: usize) -> bool {
        let want: i64 = step.rem_euclid(row_size as i64);
        self.steps.iter().any(|s| s.rem_euclid(row_size as i64) == want)
    }

    /// The `±2^i` steps, `2^i < row_size`, from which every row rotation composes.
    pub fn power_of_two_steps(row_size: usize) -> Vec<i64> {
        let log_row: u32 = row_size.trailing_zeros();
        (0..log_row)
            .flat_map(|i| {
                let step: i64 = 1 << i;
                [step, -step]
            })
            .collect()
    }

    /// Steps whose composition rotates rows by `steps`: empty for the identity,
    /// the step itself if a key covers it, otherwise the non-adjacent form of
    /// the shorter of the two directions.
    pub fn rotation_digits(&self, steps: i64, row_size: usize) -> std::result::Result<Vec<i64>, HeError> {
        let rs: i64 = row_size as i64;
        let s: i64 = steps.rem_euclid(rs);
        if s == 0 {
            return Ok(Vec::new());
        }
        if self.covers(s, row_size) {
            return Ok(vec![s]);
        }
        let left: Vec<i64> = non_adjacent_form(s);
        let right: Vec<i64> = non_adjacent_form(s - rs);
        let digits: Vec<i64> = if right.len() < left.len() { right } else { left };
        if let Some(missing) = digits.iter().find(|d| !self.covers(**d, row_size)) {
            return Err(HeError::MissingGaloisKey { step: *missing });
        }
        Ok(digits)
    }
}

/// Signed power-of-two digits `d_i` with `sum(d_i) = k` and no two adjacent.
pub(crate) fn non_adjacent_form(mut k: i64) -> Vec<i64> {
    let mut digits: Vec<i64> = Vec::new();
    let mut pow: i64 = 1;
    while k != 0 {
        if k & 1 != 0 {
            let d: i64 = 2 - k.rem_euclid(4);
            digits.push(d * pow);
            k -= d;
        }
        k /= 2;
        pow <<= 1;
    }
    digits
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey {{ key_id: {:#018x}, .. }}", self.key_id)
    }
}

fn write_key<W: Write>(writer: &mut W, tag: u32, key_id: u64, data: &[u8]) -> Result<()> {
    writer.write_u32::<LittleEndian>(tag)?;
    writer.write_u64::<LittleEndian>(key_id)?;
    write_bytes(writer, data)
}

fn read_key<R: Read>(reader: &mut R, tag: u32, what: &str) -> Result<(u64, Vec<u8>)> {
    expect_tag(reader, tag, what)?;
    let key_id: u64 = reader.read_u64::<LittleEndian>()?;
    let data: Vec<u8> = read_bytes(reader)?;
    Ok((key_id, data))
}

impl WriterTo for SecretKey {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_key(writer, SECRET_KEY_TAG, self.key_id, &self.data)
    }
}

impl ReaderFrom for SecretKey {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        (self.key_id, self.data) = read_key(reader, SECRET_KEY_TAG, "secret key")?;
        Ok(())
    }
}

impl WriterTo for PublicKey {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_key(writer, PUBLIC_KEY_TAG, self.key_id, &self.data)
    }
}

impl ReaderFrom for PublicKey {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        (self.key_id, self.data) = read_key(reader, PUBLIC_KEY_TAG, "public key")?;
        Ok(())
    }
}

impl WriterTo for RelinKey {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_key(writer, RELIN_KEY_TAG, self.key_id, &self.data)
    }
}

impl ReaderFrom for RelinKey {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        (self.key_id, self.data) = read_key(reader, RELIN_KEY_TAG, "relinearization key")?;
        Ok(())
    }
}

impl WriterTo for GaloisKeys {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_key(writer, GALOIS_KEYS_TAG, self.key_id, &self.data)?;
        writer.write_u64::<LittleEndian>(self.steps.len() as u64)?;
        for step in &self.steps {
            writer.write_i64::<LittleEndian>(*step)?;
        }
        Ok(())
    }
}

impl ReaderFrom for GaloisKeys {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let (key_id, data) = read_key(reader, GALOIS_KEYS_TAG, "galois keys")?;
        let count: u64 = reader.read_u64::<LittleEndian>()?;
        if count > MAX_WORDS {
            return Err(Error::new(ErrorKind::InvalidData, format!("{count} rotation steps")));
        }
        let mut steps: Vec<i64> = vec![0i64; count as usize];
        reader.read_i64_into::<LittleEndian>(&mut steps)?;
        self.key_id = key_id;
        self.data = data;
        self.steps = steps;
        Ok(())
    }
}
