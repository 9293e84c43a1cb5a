//! BFV backend over the `fhe` crate.
//!
//! Layouts carry the crate's serialized ciphertexts and keys; a secret key is
//! stored as the seed it is sampled from. The module handle keeps the
//! deserialized keys it has seen, indexed by key identity.
//!
//! Every ciphertext still carries the [NoiseModel] estimate, which gates each
//! operation the same way as on any other backend. [NoiseBudget] measures
//! the actual noise with the secret key, and decryption refuses ciphertexts
//! whose measured noise leaves no budget.
//!
//! [NoiseBudget]: crate::hal::api::NoiseBudget

mod encoding;
mod encryption;
mod evaluation;
mod keys;
mod module;

#[cfg(test)]
mod tests;

use std::{
    hash::Hash,
    sync::{Arc, RwLock},
};

use fhe::bfv::{self, BfvParameters};
use fhe_rand::{SeedableRng, rngs::StdRng};
use fhe_traits::DeserializeParametrized;
use utils::map::Map;

use crate::{
    hal::{
        error::HeError,
        layouts::{Backend, Ciphertext, GaloisKeys, PublicKey, RelinKey, SecretKey},
    },
    implementation::NoiseModel,
};

pub struct FheBfv {}

impl Backend for FheBfv {
    type Handle = BfvHandle;
}

pub(crate) fn backend_err(err: fhe::Error) -> HeError {
    HeError::Backend(err.to_string())
}

fn poisoned<T>(_: T) -> HeError {
    HeError::Backend("key cache lock poisoned".into())
}

/// Deserialized keys indexed by identity.
struct KeyCache<K, V>(RwLock<Map<K, Arc<V>>>);

impl<K: Eq + Hash, V> KeyCache<K, V> {
    fn new() -> Self {
        Self(RwLock::new(Map::new()))
    }

    fn get_or_load(&self, key: K, load: impl FnOnce() -> Result<V, HeError>) -> Result<Arc<V>, HeError> {
        if let Some(value) = self.0.read().map_err(poisoned)?.get(&key) {
            return Ok(value.clone());
        }
        let value: Arc<V> = Arc::new(load()?);
        self.0
            .write()
            .map_err(poisoned)?
            .insert(key, value.clone());
        Ok(value)
    }
}

pub struct BfvHandle {
    params: Arc<BfvParameters>,
    noise: NoiseModel,
    secret: KeyCache<u64, bfv::SecretKey>,
    public: KeyCache<u64, bfv::PublicKey>,
    relin: KeyCache<u64, bfv::RelinearizationKey>,
    galois: KeyCache<(u64, Vec<i64>), bfv::EvaluationKey>,
}

impl BfvHandle {
    fn new(params: Arc<BfvParameters>, noise: NoiseModel) -> Self {
        Self {
            params,
            noise,
            secret: KeyCache::new(),
            public: KeyCache::new(),
            relin: KeyCache::new(),
            galois: KeyCache::new(),
        }
    }

    pub fn bfv_params(&self) -> &Arc<BfvParameters> {
        &self.params
    }

    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    pub(crate) fn load_ciphertext(&self, ct: &Ciphertext) -> Result<bfv::Ciphertext, HeError> {
        bfv::Ciphertext::from_bytes(&ct.data, &self.params).map_err(backend_err)
    }

    /// Secret key resampled from its seed.
    pub(crate) fn secret_key(&self, sk: &SecretKey) -> Result<Arc<bfv::SecretKey>, HeError> {
        self.secret.get_or_load(sk.key_id, || {
            let seed: [u8; 32] = sk
                .data
                .as_slice()
                .try_into()
                .map_err(|_| HeError::Backend(format!("secret key seed of {} bytes", sk.data.len())))?;
            Ok(bfv::SecretKey::random(&self.params, &mut StdRng::from_seed(seed)))
        })
    }

    pub(crate) fn public_key(&self, pk: &PublicKey) -> Result<Arc<bfv::PublicKey>, HeError> {
        self.public.get_or_load(pk.key_id, || {
            bfv::PublicKey::from_bytes(&pk.data, &self.params).map_err(backend_err)
        })
    }

    pub(crate) fn relin_key(&self, rk: &RelinKey) -> Result<Arc<bfv::RelinearizationKey>, HeError> {
        self.relin.get_or_load(rk.key_id, || {
            bfv::RelinearizationKey::from_bytes(&rk.data, &self.params).map_err(backend_err)
        })
    }

    pub(crate) fn galois_keys(&self, gk: &GaloisKeys) -> Result<Arc<bfv::EvaluationKey>, HeError> {
        self.galois.get_or_load((gk.key_id, gk.steps.clone()), || {
            bfv::EvaluationKey::from_bytes(&gk.data, &self.params).map_err(backend_err)
        })
    }
}
