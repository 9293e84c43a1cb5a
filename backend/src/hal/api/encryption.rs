use crate::hal::{
    error::HeError,
    layouts::{Ciphertext, Plaintext, PublicKey, SecretKey},
};

pub trait Encrypt {
    fn encrypt(&self, pt: &Plaintext, pk: &PublicKey) -> Result<Ciphertext, HeError>;
}

pub trait Decrypt {
    /// Fails with [HeError::NoiseBudgetExhausted] rather than returning a
    /// corrupted plaintext.
    fn decrypt(&self, ct: &Ciphertext, sk: &SecretKey) -> Result<Plaintext, HeError>;
}

pub trait NoiseBudget {
    /// Invariant noise budget in bits, measured with the secret key.
    fn noise_budget(&self, ct: &Ciphertext, sk: &SecretKey) -> Result<u32, HeError>;
}

pub trait NoiseBudgetEstimate {
    /// Noise budget in bits predicted from the public noise estimate.
    fn estimated_noise_budget(&self, ct: &Ciphertext) -> u32;
}
