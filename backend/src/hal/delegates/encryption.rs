use crate::hal::{
    api::{Decrypt, Encrypt, NoiseBudget, NoiseBudgetEstimate},
    error::HeError,
    layouts::{Backend, Ciphertext, Module, Plaintext, PublicKey, SecretKey},
    oep::{DecryptImpl, EncryptImpl, NoiseBudgetEstimateImpl, NoiseBudgetImpl},
};

impl<B> Encrypt for Module<B>
where
    B: Backend + EncryptImpl<B>,
{
    fn encrypt(&self, pt: &Plaintext, pk: &PublicKey) -> Result<Ciphertext, HeError> {
        B::encrypt_impl(self, pt, pk)
    }
}

impl<B> Decrypt for Module<B>
where
    B: Backend + DecryptImpl<B>,
{
    fn decrypt(&self, ct: &Ciphertext, sk: &SecretKey) -> Result<Plaintext, HeError> {
        B::decrypt_impl(self, ct, sk)
    }
}

impl<B> NoiseBudget for Module<B>
where
    B: Backend + NoiseBudgetImpl<B>,
{
    fn noise_budget(&self, ct: &Ciphertext, sk: &SecretKey) -> Result<u32, HeError> {
        B::noise_budget_impl(self, ct, sk)
    }
}

impl<B> NoiseBudgetEstimate for Module<B>
where
    B: Backend + NoiseBudgetEstimateImpl<B>,
{
    fn estimated_noise_budget(&self, ct: &Ciphertext) -> u32 {
        B::estimated_noise_budget_impl(self, ct)
    }
}
