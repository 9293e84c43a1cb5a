use std::{
    fmt,
    io::{Read, Result, Write},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::hal::{
    error::HeError,
    layouts::{ReaderFrom, WriterTo, serialization::expect_tag},
};

const PARAMS_TAG: u32 = 0x5041_5231;
const MAX_PRIME_BITS: usize = 60;

/// Encryption parameters of a batched scheme over `Z_t[X]/(X^n + 1)`.
///
/// The `n` slots form a 2 x (n/2) matrix: row rotations act on each half
/// independently.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct BatchParams {
    pub log_n: u32,
    pub plain_modulus: u64,
    pub coeff_modulus_bits: u32,
}

impl Default for BatchParams {
    /// 8192 slots, `t = 786433`, 218-bit ciphertext modulus.
    fn default() -> Self {
        Self {
            log_n: 13,
            plain_modulus: 786433,
            coeff_modulus_bits: 218,
        }
    }
}

impl BatchParams {
    pub fn n(&self) -> usize {
        1 << self.log_n
    }

    pub fn slot_count(&self) -> usize {
        self.n()
    }

    pub fn row_size(&self) -> usize {
        self.n() >> 1
    }

    /// Bit length of `t - 1`.
    pub fn plain_bits(&self) -> u32 {
        u64::BITS - (self.plain_modulus - 1).leading_zeros()
    }

    /// Bit sizes of the primes whose product forms the coefficient modulus,
    /// split as evenly as possible under 60 bits each.
    pub fn moduli_sizes(&self) -> Vec<usize> {
        let bits: usize = self.coeff_modulus_bits as usize;
        let count: usize = bits.div_ceil(MAX_PRIME_BITS).max(1);
        (0..count)
            .map(|i| bits / count + usize::from(i >= count - bits % count))
            .collect()
    }

    /// Checks that the parameters admit batching: `t` prime, `t = 1 mod 2n`.
    pub fn validate(&self) -> std::result::Result<(), HeError> {
        if !(2..=16).contains(&self.log_n) {
            return Err(HeError::InvalidParams(format!("log_n={} not in [2, 16]", self.log_n)));
        }
        if self.plain_modulus < 3 || self.plain_modulus >= 1 << 31 {
            return Err(HeError::InvalidParams(format!(
                "plain modulus {} not in [3, 2^31)",
                self.plain_modulus
            )));
        }
        if !is_prime(self.plain_modulus) {
            return Err(HeError::InvalidParams(format!("plain modulus {} is not prime", self.plain_modulus)));
        }
        let two_n: u64 = (self.n() as u64) << 1;
        if self.plain_modulus % two_n != 1 {
            return Err(HeError::InvalidParams(format!(
                "plain modulus {} is not congruent to 1 mod {}",
                self.plain_modulus, two_n
            )));
        }
        if self.coeff_modulus_bits <= self.plain_bits() + self.log_n {
            return Err(HeError::InvalidParams(format!(
                "coefficient modulus of {} bits leaves no room above t and n",
                self.coeff_modulus_bits
            )));
        }
        Ok(())
    }
}

fn is_prime(x: u64) -> bool {
    if x < 2 {
        return false;
    }
    let mut d: u64 = 2;
    while d * d <= x {
        if x % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

impl fmt::Display for BatchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BatchParams: n={} row_size={} t={} log_q={}",
            self.n(),
            self.row_size(),
            self.plain_modulus,
            self.coeff_modulus_bits
        )
    }
}

impl WriterTo for BatchParams {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(PARAMS_TAG)?;
        writer.write_u32::<LittleEndian>(self.log_n)?;
        writer.write_u64::<LittleEndian>(self.plain_modulus)?;
        writer.write_u32::<LittleEndian>(self.coeff_modulus_bits)
    }
}

impl ReaderFrom for BatchParams {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        expect_tag(reader, PARAMS_TAG, "params")?;
        let log_n: u32 = reader.read_u32::<LittleEndian>()?;
        let plain_modulus: u64 = reader.read_u64::<LittleEndian>()?;
        let coeff_modulus_bits: u32 = reader.read_u32::<LittleEndian>()?;
        self.log_n = log_n;
        self.plain_modulus = plain_modulus;
        self.coeff_modulus_bits = coeff_modulus_bits;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BatchParams;

    #[test]
    fn default_is_valid() {
        let params: BatchParams = BatchParams::default();
        assert_eq!(params.validate(), Ok(()));
        assert_eq!(params.row_size(), 4096);
        assert_eq!(params.plain_bits(), 20);
        assert_eq!(params.moduli_sizes(), vec![54, 54, 55, 55]);
    }

    #[test]
    fn moduli_sizes_sum_to_modulus() {
        for bits in [40u32, 60, 61, 109, 218, 438] {
            let params: BatchParams = BatchParams {
                coeff_modulus_bits: bits,
                ..BatchParams::default()
            };
            let sizes: Vec<usize> = params.moduli_sizes();
            assert_eq!(sizes.iter().sum::<usize>(), bits as usize);
            assert!(sizes.iter().all(|s| *s <= 60), "{:?}", sizes);
        }
    }

    #[test]
    fn rejects_non_batching_modulus() {
        let params: BatchParams = BatchParams {
            plain_modulus: 65537,
            log_n: 16,
            coeff_modulus_bits: 438,
        };
        assert!(params.validate().is_err());
        let params: BatchParams = BatchParams {
            plain_modulus: 786431,
            ..BatchParams::default()
        };
        assert!(params.validate().is_err());
    }
}
