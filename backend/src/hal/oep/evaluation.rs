use crate::hal::{
    error::HeError,
    layouts::{Backend, Ciphertext, GaloisKeys, Module, RelinKey},
};

/// * See [crate::hal::api::CiphertextAdd] for corresponding public API.
pub trait CiphertextAddImpl<B: Backend> {
    fn add_inplace_impl(module: &Module<B>, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError>;
}

/// * See [crate::hal::api::CiphertextSub] for corresponding public API.
pub trait CiphertextSubImpl<B: Backend> {
    fn sub_inplace_impl(module: &Module<B>, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError>;
}

/// * See [crate::hal::api::CiphertextMul] for corresponding public API.
pub trait CiphertextMulImpl<B: Backend> {
    fn multiply_inplace_impl(module: &Module<B>, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError>;
}

/// * See [crate::hal::api::Relinearize] for corresponding public API.
pub trait RelinearizeImpl<B: Backend> {
    fn relinearize_inplace_impl(module: &Module<B>, res: &mut Ciphertext, rk: &RelinKey) -> Result<(), HeError>;
}

/// * See [crate::hal::api::RotateRows] for corresponding public API.
pub trait RotateRowsImpl<B: Backend> {
    fn rotate_rows_inplace_impl(module: &Module<B>, res: &mut Ciphertext, steps: i64, gk: &GaloisKeys) -> Result<(), HeError>;
}
