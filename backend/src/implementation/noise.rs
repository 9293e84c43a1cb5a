use crate::hal::{error::HeError, layouts::BatchParams};

/// Bits of the fresh budget consumed by encryption noise beyond `log t + log n`.
const FRESH_SLACK_BITS: u32 = 25;
/// Extra bits a single ciphertext-ciphertext product adds on top of `log t + log n`.
const MUL_SLACK_BITS: u32 = 2;
/// Key-switching noise beyond `log p + log n`, `p` the largest RNS prime.
const KEYSWITCH_SLACK_BITS: u32 = 4;

/// Invariant-noise estimate of a BFV-like scheme, tracked in millibits.
///
/// * capacity: `log q - log t`; the budget of a ciphertext is `capacity - noise`.
/// * addition: noises add in magnitude (`log2(2^a + 2^b)`).
/// * multiplication: `max(a, b) + log t + log n + 2`.
/// * key switching (relinearization, rotation): adds a noise floor set by the
///   RNS digit size of the coefficient modulus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoiseModel {
    capacity: u32,
    fresh: u32,
    mul_growth: u32,
    keyswitch: u32,
}

impl NoiseModel {
    pub fn new(params: &BatchParams) -> Result<Self, HeError> {
        let plain_bits: u32 = params.plain_bits();
        let log_n: u32 = params.log_n;
        let capacity_bits: u32 = params.coeff_modulus_bits.saturating_sub(plain_bits);
        let fresh_budget_bits: u32 = params
            .coeff_modulus_bits
            .saturating_sub(plain_bits + log_n + FRESH_SLACK_BITS);
        if fresh_budget_bits == 0 {
            return Err(HeError::InvalidParams(format!(
                "{}-bit coefficient modulus leaves no fresh noise budget",
                params.coeff_modulus_bits
            )));
        }
        let fresh: u32 = (capacity_bits - fresh_budget_bits) * 1000;
        let digit_bits: u32 = params.moduli_sizes().into_iter().max().unwrap_or(0) as u32;
        Ok(Self {
            capacity: capacity_bits * 1000,
            fresh,
            mul_growth: (plain_bits + log_n + MUL_SLACK_BITS) * 1000,
            keyswitch: (digit_bits + log_n + KEYSWITCH_SLACK_BITS) * 1000,
        })
    }

    pub fn fresh(&self) -> u32 {
        self.fresh
    }

    /// Largest noise a ciphertext can carry and still decrypt, in whole bits.
    pub fn capacity_bits(&self) -> u32 {
        self.capacity / 1000
    }

    /// Remaining budget in whole bits.
    pub fn budget(&self, noise: u32) -> u32 {
        self.capacity.saturating_sub(noise) / 1000
    }

    pub fn add(&self, a: u32, b: u32) -> u32 {
        let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
        let gap: f64 = (hi - lo) as f64 / 1000.0;
        hi + (1000.0 * (1.0 + (-gap).exp2()).log2()).round() as u32
    }

    pub fn mul(&self, a: u32, b: u32) -> u32 {
        a.max(b).saturating_add(self.mul_growth)
    }

    pub fn keyswitch(&self, a: u32, count: usize) -> u32 {
        (0..count).fold(a, |acc, _| self.add(acc, self.keyswitch))
    }

    /// Fails if `noise` leaves no budget; `input` is the noise the operation started from.
    pub fn check(&self, op: &'static str, input: u32, noise: u32) -> Result<u32, HeError> {
        if self.budget(noise) == 0 {
            return Err(HeError::NoiseBudgetExhausted {
                op,
                remaining: self.budget(input),
            });
        }
        Ok(noise)
    }
}
