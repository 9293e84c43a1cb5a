use crate::{
    hal::{
        error::HeError,
        layouts::{Ciphertext, Module, Plaintext, PublicKey, SecretKey},
        oep::{DecryptImpl, EncryptImpl, NoiseBudgetEstimateImpl, NoiseBudgetImpl},
    },
    implementation::{
        check_key, check_slots,
        cpu_ref::{CpuRef, pack, unpack},
    },
};

impl EncryptImpl<Self> for CpuRef {
    fn encrypt_impl(module: &Module<Self>, pt: &Plaintext, pk: &PublicKey) -> Result<Ciphertext, HeError> {
        check_slots(module, pt.n())?;
        Ok(Ciphertext {
            n: pt.n(),
            data: pack(&pt.data),
            size: 2,
            key_id: pk.key_id,
            noise: module.handle().fresh(),
        })
    }
}

impl DecryptImpl<Self> for CpuRef {
    fn decrypt_impl(module: &Module<Self>, ct: &Ciphertext, sk: &SecretKey) -> Result<Plaintext, HeError> {
        check_key(sk.key_id, ct.key_id)?;
        check_slots(module, ct.n())?;
        module.handle().check("decrypt", ct.noise, ct.noise)?;
        Ok(Plaintext { data: unpack(ct) })
    }
}

impl NoiseBudgetImpl<Self> for CpuRef {
    fn noise_budget_impl(module: &Module<Self>, ct: &Ciphertext, sk: &SecretKey) -> Result<u32, HeError> {
        check_key(sk.key_id, ct.key_id)?;
        Ok(module.handle().budget(ct.noise))
    }
}

impl NoiseBudgetEstimateImpl<Self> for CpuRef {
    fn estimated_noise_budget_impl(module: &Module<Self>, ct: &Ciphertext) -> u32 {
        module.handle().budget(ct.noise)
    }
}
