use crate::{
    hal::{
        error::HeError,
        layouts::{Module, Plaintext},
        oep::{BatchDecodeImpl, BatchEncodeImpl},
    },
    implementation::{decode_residues, encode_residues, fhe_bfv::FheBfv},
};

// Slot residues map one to one onto the SIMD encoding applied at encryption.

impl BatchEncodeImpl<Self> for FheBfv {
    fn encode_batch_impl(module: &Module<Self>, values: &[i64]) -> Result<Plaintext, HeError> {
        encode_residues(module, values)
    }
}

impl BatchDecodeImpl<Self> for FheBfv {
    fn decode_batch_impl(module: &Module<Self>, pt: &Plaintext) -> Vec<i64> {
        decode_residues(module, pt)
    }
}
