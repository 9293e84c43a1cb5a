use crate::hal::{error::HeError, layouts::Plaintext};

pub trait BatchEncode {
    /// Encodes `values` into the first `values.len()` slots, reducing each
    /// modulo the plaintext modulus; the remaining slots are zero.
    fn encode_batch(&self, values: &[i64]) -> Result<Plaintext, HeError>;
}

pub trait BatchDecode {
    /// Decodes every slot to its centered representative in `(-t/2, t/2]`.
    fn decode_batch(&self, pt: &Plaintext) -> Vec<i64>;
}
