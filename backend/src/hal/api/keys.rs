use sampling::source::Source;

use crate::hal::{
    error::HeError,
    layouts::{GaloisKeys, PublicKey, RelinKey, SecretKey},
};

pub trait SecretKeyGenerate {
    fn generate_secret_key(&self, source: &mut Source) -> SecretKey;
}

pub trait PublicKeyGenerate {
    fn generate_public_key(&self, sk: &SecretKey, source: &mut Source) -> Result<PublicKey, HeError>;
}

pub trait RelinKeyGenerate {
    fn generate_relin_key(&self, sk: &SecretKey, source: &mut Source) -> Result<RelinKey, HeError>;
}

pub trait GaloisKeysGenerate {
    /// Generates rotation keys for the given row-rotation steps.
    fn generate_galois_keys(&self, sk: &SecretKey, steps: &[i64], source: &mut Source) -> Result<GaloisKeys, HeError>;
}
