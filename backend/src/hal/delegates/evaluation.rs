use crate::hal::{
    api::{CiphertextAdd, CiphertextMul, CiphertextSub, Relinearize, RotateRows},
    error::HeError,
    layouts::{Backend, Ciphertext, GaloisKeys, Module, RelinKey},
    oep::{CiphertextAddImpl, CiphertextMulImpl, CiphertextSubImpl, RelinearizeImpl, RotateRowsImpl},
};

impl<B> CiphertextAdd for Module<B>
where
    B: Backend + CiphertextAddImpl<B>,
{
    fn add_inplace(&self, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError> {
        B::add_inplace_impl(self, res, a)
    }
}

impl<B> CiphertextSub for Module<B>
where
    B: Backend + CiphertextSubImpl<B>,
{
    fn sub_inplace(&self, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError> {
        B::sub_inplace_impl(self, res, a)
    }
}

impl<B> CiphertextMul for Module<B>
where
    B: Backend + CiphertextMulImpl<B>,
{
    fn multiply_inplace(&self, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError> {
        B::multiply_inplace_impl(self, res, a)
    }
}

impl<B> Relinearize for Module<B>
where
    B: Backend + RelinearizeImpl<B>,
{
    fn relinearize_inplace(&self, res: &mut Ciphertext, rk: &RelinKey) -> Result<(), HeError> {
        B::relinearize_inplace_impl(self, res, rk)
    }
}

impl<B> RotateRows for Module<B>
where
    B: Backend + RotateRowsImpl<B>,
{
    fn rotate_rows_inplace(&self, res: &mut Ciphertext, steps: i64, gk: &GaloisKeys) -> Result<(), HeError> {
        B::rotate_rows_inplace_impl(self, res, steps, gk)
    }
}
