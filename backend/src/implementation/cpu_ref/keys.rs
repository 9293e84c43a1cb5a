use sampling::source::Source;

use crate::{
    hal::{
        error::HeError,
        layouts::{GaloisKeys, Module, PublicKey, RelinKey, SecretKey},
        oep::{GaloisKeysGenerateImpl, PublicKeyGenerateImpl, RelinKeyGenerateImpl, SecretKeyGenerateImpl},
    },
    implementation::{cpu_ref::CpuRef, distinct_rotation_steps},
};

// The reference backend only needs key identities: derived keys carry the
// identity of their secret key and no material.

impl SecretKeyGenerateImpl<Self> for CpuRef {
    fn generate_secret_key_impl(_module: &Module<Self>, source: &mut Source) -> SecretKey {
        let seed: [u8; 32] = source.new_seed();
        let mut id: [u8; 8] = [0u8; 8];
        id.copy_from_slice(&seed[..8]);
        SecretKey {
            key_id: u64::from_le_bytes(id),
            data: seed.to_vec(),
        }
    }
}

impl PublicKeyGenerateImpl<Self> for CpuRef {
    fn generate_public_key_impl(_module: &Module<Self>, sk: &SecretKey, _source: &mut Source) -> Result<PublicKey, HeError> {
        Ok(PublicKey {
            key_id: sk.key_id,
            data: Vec::new(),
        })
    }
}

impl RelinKeyGenerateImpl<Self> for CpuRef {
    fn generate_relin_key_impl(_module: &Module<Self>, sk: &SecretKey, _source: &mut Source) -> Result<RelinKey, HeError> {
        Ok(RelinKey {
            key_id: sk.key_id,
            data: Vec::new(),
        })
    }
}

impl GaloisKeysGenerateImpl<Self> for CpuRef {
    fn generate_galois_keys_impl(
        module: &Module<Self>,
        sk: &SecretKey,
        steps: &[i64],
        _source: &mut Source,
    ) -> Result<GaloisKeys, HeError> {
        Ok(GaloisKeys {
            key_id: sk.key_id,
            steps: distinct_rotation_steps(steps, module.row_size())?,
            data: Vec::new(),
        })
    }
}
