//! Reference backend.
//!
//! Slot values are kept in the clear as residues modulo the plaintext
//! modulus, so every operation is exact and cheap. Noise is not simulated by
//! sampling; instead each ciphertext carries an estimate that evolves through
//! [NoiseModel] and is checked before each operation completes.
//!
//! Provides no confidentiality: only compiled for tests and the `cpu-ref`
//! feature.

mod encoding;
mod encryption;
mod evaluation;
mod keys;
mod module;

#[cfg(test)]
mod tests;

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    hal::layouts::{Backend, Ciphertext},
    implementation::NoiseModel,
};

pub struct CpuRef {}

impl Backend for CpuRef {
    type Handle = NoiseModel;
}

/// Payload layout: one little-endian word per slot.
pub(crate) fn unpack(ct: &Ciphertext) -> Vec<u64> {
    let mut words: Vec<u64> = vec![0u64; ct.data.len() / 8];
    LittleEndian::read_u64_into(&ct.data[..words.len() * 8], &mut words);
    words
}

pub(crate) fn pack(words: &[u64]) -> Vec<u8> {
    let mut bytes: Vec<u8> = vec![0u8; words.len() * 8];
    LittleEndian::write_u64_into(words, &mut bytes);
    bytes
}
