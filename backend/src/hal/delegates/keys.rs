use sampling::source::Source;

use crate::hal::{
    api::{GaloisKeysGenerate, PublicKeyGenerate, RelinKeyGenerate, SecretKeyGenerate},
    error::HeError,
    layouts::{Backend, GaloisKeys, Module, PublicKey, RelinKey, SecretKey},
    oep::{GaloisKeysGenerateImpl, PublicKeyGenerateImpl, RelinKeyGenerateImpl, SecretKeyGenerateImpl},
};

impl<B> SecretKeyGenerate for Module<B>
where
    B: Backend + SecretKeyGenerateImpl<B>,
{
    fn generate_secret_key(&self, source: &mut Source) -> SecretKey {
        B::generate_secret_key_impl(self, source)
    }
}

impl<B> PublicKeyGenerate for Module<B>
where
    B: Backend + PublicKeyGenerateImpl<B>,
{
    fn generate_public_key(&self, sk: &SecretKey, source: &mut Source) -> Result<PublicKey, HeError> {
        B::generate_public_key_impl(self, sk, source)
    }
}

impl<B> RelinKeyGenerate for Module<B>
where
    B: Backend + RelinKeyGenerateImpl<B>,
{
    fn generate_relin_key(&self, sk: &SecretKey, source: &mut Source) -> Result<RelinKey, HeError> {
        B::generate_relin_key_impl(self, sk, source)
    }
}

impl<B> GaloisKeysGenerate for Module<B>
where
    B: Backend + GaloisKeysGenerateImpl<B>,
{
    fn generate_galois_keys(&self, sk: &SecretKey, steps: &[i64], source: &mut Source) -> Result<GaloisKeys, HeError> {
        B::generate_galois_keys_impl(self, sk, steps, source)
    }
}
