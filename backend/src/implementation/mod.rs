//! Backends implementing the [crate::hal::oep] extension points.
//!
//! * [fhe_bfv::FheBfv]: BFV over the `fhe` crate, used by the protocol.
//! * `cpu_ref::CpuRef` (feature `cpu-ref`): cleartext slot arithmetic with
//!   the same noise accounting, for protocol tests only.

#[cfg(any(test, feature = "cpu-ref"))]
pub mod cpu_ref;
pub mod fhe_bfv;
mod noise;

pub use noise::NoiseModel;

use crate::hal::{
    error::HeError,
    layouts::{Backend, Ciphertext, Module, Plaintext},
};

pub(crate) fn check_key(expected: u64, found: u64) -> Result<(), HeError> {
    if expected != found {
        return Err(HeError::KeyMismatch { expected, found });
    }
    Ok(())
}

pub(crate) fn check_slots<B: Backend>(module: &Module<B>, found: usize) -> Result<(), HeError> {
    if module.n() != found {
        return Err(HeError::SlotMismatch {
            expected: module.n(),
            found,
        });
    }
    Ok(())
}

/// Binary operands must share slots and key, and have the same size.
pub(crate) fn check_operands<B: Backend>(
    module: &Module<B>,
    op: &'static str,
    res: &Ciphertext,
    a: &Ciphertext,
) -> Result<(), HeError> {
    check_slots(module, res.n())?;
    check_slots(module, a.n())?;
    check_key(res.key_id, a.key_id)?;
    if res.size != a.size {
        return Err(HeError::SizeMismatch {
            op,
            left: res.size,
            right: a.size,
        });
    }
    Ok(())
}

/// Slot residues in `[0, t)` of a batch of signed values, zero padded to `n`.
pub(crate) fn encode_residues<B: Backend>(module: &Module<B>, values: &[i64]) -> Result<Plaintext, HeError> {
    let n: usize = module.n();
    if values.len() > n {
        return Err(HeError::BatchTooLarge {
            len: values.len(),
            slots: n,
        });
    }
    let t: i64 = module.plain_modulus() as i64;
    let mut pt: Plaintext = Plaintext::alloc(n);
    pt.data
        .iter_mut()
        .zip(values.iter())
        .for_each(|(x, v)| *x = v.rem_euclid(t) as u64);
    Ok(pt)
}

/// Centered representatives in `(-t/2, t/2]`.
pub(crate) fn decode_residues<B: Backend>(module: &Module<B>, pt: &Plaintext) -> Vec<i64> {
    let t: u64 = module.plain_modulus();
    let half: u64 = t >> 1;
    pt.data
        .iter()
        .map(|x| {
            if *x > half {
                *x as i64 - t as i64
            } else {
                *x as i64
            }
        })
        .collect()
}

/// Deduplicated rotation steps; a step that is the identity on rows is an error.
pub(crate) fn distinct_rotation_steps(steps: &[i64], row_size: usize) -> Result<Vec<i64>, HeError> {
    let rs: i64 = row_size as i64;
    let mut kept: Vec<i64> = Vec::with_capacity(steps.len());
    for step in steps {
        if step.rem_euclid(rs) == 0 {
            return Err(HeError::InvalidParams(format!(
                "rotation step {step} is the identity on rows of {row_size} slots"
            )));
        }
        if !kept.contains(step) {
            kept.push(*step);
        }
    }
    Ok(kept)
}
