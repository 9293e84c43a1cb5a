use crate::hal::{
    error::HeError,
    layouts::{Backend, Ciphertext, Module, Plaintext, PublicKey, SecretKey},
};

/// * See [crate::hal::api::Encrypt] for corresponding public API.
pub trait EncryptImpl<B: Backend> {
    fn encrypt_impl(module: &Module<B>, pt: &Plaintext, pk: &PublicKey) -> Result<Ciphertext, HeError>;
}

/// * See [crate::hal::api::Decrypt] for corresponding public API.
pub trait DecryptImpl<B: Backend> {
    fn decrypt_impl(module: &Module<B>, ct: &Ciphertext, sk: &SecretKey) -> Result<Plaintext, HeError>;
}

/// * See [crate::hal::api::NoiseBudget] for corresponding public API.
pub trait NoiseBudgetImpl<B: Backend> {
    fn noise_budget_impl(module: &Module<B>, ct: &Ciphertext, sk: &SecretKey) -> Result<u32, HeError>;
}

/// * See [crate::hal::api::NoiseBudgetEstimate] for corresponding public API.
pub trait NoiseBudgetEstimateImpl<B: Backend> {
    fn estimated_noise_budget_impl(module: &Module<B>, ct: &Ciphertext) -> u32;
}
