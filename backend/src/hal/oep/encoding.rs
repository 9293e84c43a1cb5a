use crate::hal::{
    error::HeError,
    layouts::{Backend, Module, Plaintext},
};

/// * See [crate::hal::api::BatchEncode] for corresponding public API.
pub trait BatchEncodeImpl<B: Backend> {
    fn encode_batch_impl(module: &Module<B>, values: &[i64]) -> Result<Plaintext, HeError>;
}

/// * See [crate::hal::api::BatchDecode] for corresponding public API.
pub trait BatchDecodeImpl<B: Backend> {
    fn decode_batch_impl(module: &Module<B>, pt: &Plaintext) -> Vec<i64>;
}
