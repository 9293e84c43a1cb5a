use fhe::bfv::{self, EvaluationKeyBuilder};
use fhe_rand::{SeedableRng, rngs::StdRng};
use fhe_traits::Serialize;
use itertools::Itertools;
use sampling::source::Source;

use crate::{
    hal::{
        error::HeError,
        layouts::{GaloisKeys, Module, PublicKey, RelinKey, SecretKey},
        oep::{GaloisKeysGenerateImpl, PublicKeyGenerateImpl, RelinKeyGenerateImpl, SecretKeyGenerateImpl},
    },
    implementation::{
        distinct_rotation_steps,
        fhe_bfv::{FheBfv, backend_err},
    },
};

/// Key-generation randomness drawn from `source`, in the RNG family `fhe` expects.
fn key_rng(source: &mut Source) -> StdRng {
    StdRng::from_seed(source.new_seed())
}

impl SecretKeyGenerateImpl<Self> for FheBfv {
    fn generate_secret_key_impl(_module: &Module<Self>, source: &mut Source) -> SecretKey {
        let seed: [u8; 32] = source.new_seed();
        SecretKey {
            key_id: source.next_i64() as u64,
            data: seed.to_vec(),
        }
    }
}

impl PublicKeyGenerateImpl<Self> for FheBfv {
    fn generate_public_key_impl(module: &Module<Self>, sk: &SecretKey, source: &mut Source) -> Result<PublicKey, HeError> {
        let key = module.handle().secret_key(sk)?;
        Ok(PublicKey {
            key_id: sk.key_id,
            data: bfv::PublicKey::new(&key, &mut key_rng(source)).to_bytes(),
        })
    }
}

impl RelinKeyGenerateImpl<Self> for FheBfv {
    fn generate_relin_key_impl(module: &Module<Self>, sk: &SecretKey, source: &mut Source) -> Result<RelinKey, HeError> {
        let key = module.handle().secret_key(sk)?;
        let rk: bfv::RelinearizationKey = bfv::RelinearizationKey::new(&key, &mut key_rng(source)).map_err(backend_err)?;
        Ok(RelinKey {
            key_id: sk.key_id,
            data: rk.to_bytes(),
        })
    }
}

impl GaloisKeysGenerateImpl<Self> for FheBfv {
    fn generate_galois_keys_impl(
        module: &Module<Self>,
        sk: &SecretKey,
        steps: &[i64],
        source: &mut Source,
    ) -> Result<GaloisKeys, HeError> {
        let row_size: usize = module.row_size();
        let steps: Vec<i64> = distinct_rotation_steps(steps, row_size)?;
        let key = module.handle().secret_key(sk)?;
        let mut builder: EvaluationKeyBuilder = EvaluationKeyBuilder::new(&key).map_err(backend_err)?;
        // rotations act on residues modulo the row size
        for residue in steps
            .iter()
            .map(|s| s.rem_euclid(row_size as i64) as usize)
            .unique()
        {
            builder
                .enable_column_rotation(residue)
                .map_err(backend_err)?;
        }
        let ek: bfv::EvaluationKey = builder.build(&mut key_rng(source)).map_err(backend_err)?;
        Ok(GaloisKeys {
            key_id: sk.key_id,
            steps,
            data: ek.to_bytes(),
        })
    }
}
