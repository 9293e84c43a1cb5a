use crate::hal::{
    api::{BatchDecode, BatchEncode},
    error::HeError,
    layouts::{Backend, Module, Plaintext},
    oep::{BatchDecodeImpl, BatchEncodeImpl},
};

impl<B> BatchEncode for Module<B>
where
    B: Backend + BatchEncodeImpl<B>,
{
    fn encode_batch(&self, values: &[i64]) -> Result<Plaintext, HeError> {
        B::encode_batch_impl(self, values)
    }
}

impl<B> BatchDecode for Module<B>
where
    B: Backend + BatchDecodeImpl<B>,
{
    fn decode_batch(&self, pt: &Plaintext) -> Vec<i64> {
        B::decode_batch_impl(self, pt)
    }
}
