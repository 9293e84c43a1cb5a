use sampling::source::Source;

use crate::hal::{
    error::HeError,
    layouts::{Backend, GaloisKeys, Module, PublicKey, RelinKey, SecretKey},
};

/// * See [crate::hal::api::SecretKeyGenerate] for corresponding public API.
pub trait SecretKeyGenerateImpl<B: Backend> {
    fn generate_secret_key_impl(module: &Module<B>, source: &mut Source) -> SecretKey;
}

/// * See [crate::hal::api::PublicKeyGenerate] for corresponding public API.
pub trait PublicKeyGenerateImpl<B: Backend> {
    fn generate_public_key_impl(module: &Module<B>, sk: &SecretKey, source: &mut Source) -> Result<PublicKey, HeError>;
}

/// * See [crate::hal::api::RelinKeyGenerate] for corresponding public API.
pub trait RelinKeyGenerateImpl<B: Backend> {
    fn generate_relin_key_impl(module: &Module<B>, sk: &SecretKey, source: &mut Source) -> Result<RelinKey, HeError>;
}

/// * See [crate::hal::api::GaloisKeysGenerate] for corresponding public API.
pub trait GaloisKeysGenerateImpl<B: Backend> {
    fn generate_galois_keys_impl(
        module: &Module<B>,
        sk: &SecretKey,
        steps: &[i64],
        source: &mut Source,
    ) -> Result<GaloisKeys, HeError>;
}
