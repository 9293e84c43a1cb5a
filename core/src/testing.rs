use backend::{
    CpuRef,
    hal::{
        api::{BatchDecode, BatchEncode, Decrypt, Encrypt, ModuleNew, ModuleParams},
        layouts::{BatchParams, Ciphertext, Module},
    },
};
use sampling::source::Source;

use crate::{
    config::{HeConfig, ProtocolConfig},
    keys::KeySet,
};

pub(crate) struct TestContext {
    pub module: Module<CpuRef>,
    pub keys: KeySet,
}

impl TestContext {
    /// Default parameters with `2^log_n` slots.
    pub fn new(log_n: u32) -> Self {
        Self::with_params(BatchParams {
            log_n,
            ..BatchParams::default()
        })
    }

    pub fn with_params(params: BatchParams) -> Self {
        let module: Module<CpuRef> = Module::<CpuRef>::new(params).unwrap();
        let keys: KeySet = KeySet::generate(&module, &mut Source::new([7u8; 32])).unwrap();
        Self { module, keys }
    }

    pub fn config(&self, meter_count: usize) -> ProtocolConfig {
        let params: &BatchParams = self.module.batch_params();
        ProtocolConfig {
            meter_count,
            threads: 2,
            he: HeConfig {
                log_n: params.log_n,
                plain_modulus: params.plain_modulus,
                coeff_modulus_bits: params.coeff_modulus_bits,
            },
            ..ProtocolConfig::default()
        }
    }

    pub fn encrypt_values(&self, values: &[i64]) -> Ciphertext {
        let pt = self.module.encode_batch(values).unwrap();
        self.module.encrypt(&pt, &self.keys.evaluation.pk).unwrap()
    }

    /// `value` in every slot of the first row.
    pub fn encrypt_scalar(&self, value: i64) -> Ciphertext {
        self.encrypt_values(&vec![value; self.module.row_size()])
    }

    pub fn decrypt(&self, ct: &Ciphertext) -> Vec<i64> {
        self.module
            .decode_batch(&self.module.decrypt(ct, &self.keys.sk).unwrap())
    }
}
