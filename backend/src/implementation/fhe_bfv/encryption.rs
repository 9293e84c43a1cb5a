use fhe::bfv::{self, Encoding};
use fhe_rand::thread_rng;
use fhe_traits::{FheDecoder, FheDecrypter, FheEncoder, FheEncrypter, Serialize};

use crate::{
    hal::{
        error::HeError,
        layouts::{Ciphertext, Module, Plaintext, PublicKey, SecretKey},
        oep::{DecryptImpl, EncryptImpl, NoiseBudgetEstimateImpl, NoiseBudgetImpl},
    },
    implementation::{
        check_key, check_slots,
        fhe_bfv::{FheBfv, backend_err},
    },
};

/// Budget left by the measured noise of `ct`: decryption holds while the
/// noise stays below `q / 2t`.
fn measured_budget(module: &Module<FheBfv>, sk: &bfv::SecretKey, ct: &bfv::Ciphertext) -> Result<u32, HeError> {
    // SAFETY: runs in time variable in the noise; only the secret-key holder measures.
    let noise: usize = unsafe { sk.measure_noise(ct) }.map_err(backend_err)?;
    let params = module.params();
    let decryptable: u32 = params
        .coeff_modulus_bits
        .saturating_sub(params.plain_bits() + 1);
    Ok(decryptable.saturating_sub(noise as u32))
}

impl EncryptImpl<Self> for FheBfv {
    fn encrypt_impl(module: &Module<Self>, pt: &Plaintext, pk: &PublicKey) -> Result<Ciphertext, HeError> {
        check_slots(module, pt.n())?;
        let handle = module.handle();
        let encoded = bfv::Plaintext::try_encode(pt.data(), Encoding::simd(), handle.bfv_params()).map_err(backend_err)?;
        let ct: bfv::Ciphertext = handle
            .public_key(pk)?
            .try_encrypt(&encoded, &mut thread_rng())
            .map_err(backend_err)?;
        Ok(Ciphertext {
            n: pt.n(),
            data: ct.to_bytes(),
            size: 2,
            key_id: pk.key_id,
            noise: handle.noise().fresh(),
        })
    }
}

impl DecryptImpl<Self> for FheBfv {
    fn decrypt_impl(module: &Module<Self>, ct: &Ciphertext, sk: &SecretKey) -> Result<Plaintext, HeError> {
        check_key(sk.key_id, ct.key_id)?;
        check_slots(module, ct.n())?;
        let handle = module.handle();
        handle.noise().check("decrypt", ct.noise, ct.noise)?;
        let key = handle.secret_key(sk)?;
        let inner: bfv::Ciphertext = handle.load_ciphertext(ct)?;
        if measured_budget(module, &key, &inner)? == 0 {
            return Err(HeError::NoiseBudgetExhausted {
                op: "decrypt",
                remaining: 0,
            });
        }
        let pt: bfv::Plaintext = key.try_decrypt(&inner).map_err(backend_err)?;
        let data: Vec<u64> = Vec::<u64>::try_decode(&pt, Encoding::simd()).map_err(backend_err)?;
        Ok(Plaintext { data })
    }
}

impl NoiseBudgetImpl<Self> for FheBfv {
    fn noise_budget_impl(module: &Module<Self>, ct: &Ciphertext, sk: &SecretKey) -> Result<u32, HeError> {
        check_key(sk.key_id, ct.key_id)?;
        let handle = module.handle();
        measured_budget(module, &*handle.secret_key(sk)?, &handle.load_ciphertext(ct)?)
    }
}

impl NoiseBudgetEstimateImpl<Self> for FheBfv {
    fn estimated_noise_budget_impl(module: &Module<Self>, ct: &Ciphertext) -> u32 {
        module.handle().noise().budget(ct.noise)
    }
}
