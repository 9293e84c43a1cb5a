use crate::{
    hal::{
        error::HeError,
        layouts::{Module, Plaintext},
        oep::{BatchDecodeImpl, BatchEncodeImpl},
    },
    implementation::{cpu_ref::CpuRef, decode_residues, encode_residues},
};

impl BatchEncodeImpl<Self> for CpuRef {
    fn encode_batch_impl(module: &Module<Self>, values: &[i64]) -> Result<Plaintext, HeError> {
        encode_residues(module, values)
    }
}

impl BatchDecodeImpl<Self> for CpuRef {
    fn decode_batch_impl(module: &Module<Self>, pt: &Plaintext) -> Vec<i64> {
        decode_residues(module, pt)
    }
}
