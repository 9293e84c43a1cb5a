use fhe::bfv;
use fhe_traits::Serialize;

use crate::{
    hal::{
        error::HeError,
        layouts::{Ciphertext, GaloisKeys, Module, RelinKey},
        oep::{CiphertextAddImpl, CiphertextMulImpl, CiphertextSubImpl, RelinearizeImpl, RotateRowsImpl},
    },
    implementation::{
        NoiseModel, check_key, check_operands, check_slots,
        fhe_bfv::{FheBfv, backend_err},
    },
};

impl CiphertextAddImpl<Self> for FheBfv {
    fn add_inplace_impl(module: &Module<Self>, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError> {
        check_operands(module, "add", res, a)?;
        let handle = module.handle();
        let model: &NoiseModel = handle.noise();
        let noise: u32 = model.check("add", res.noise.max(a.noise), model.add(res.noise, a.noise))?;
        let mut sum: bfv::Ciphertext = handle.load_ciphertext(res)?;
        sum += &handle.load_ciphertext(a)?;
        res.data = sum.to_bytes();
        res.noise = noise;
        Ok(())
    }
}

impl CiphertextSubImpl<Self> for FheBfv {
    fn sub_inplace_impl(module: &Module<Self>, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError> {
        check_operands(module, "sub", res, a)?;
        let handle = module.handle();
        let model: &NoiseModel = handle.noise();
        let noise: u32 = model.check("sub", res.noise.max(a.noise), model.add(res.noise, a.noise))?;
        let mut diff: bfv::Ciphertext = handle.load_ciphertext(res)?;
        diff -= &handle.load_ciphertext(a)?;
        res.data = diff.to_bytes();
        res.noise = noise;
        Ok(())
    }
}

impl CiphertextMulImpl<Self> for FheBfv {
    fn multiply_inplace_impl(module: &Module<Self>, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError> {
        check_operands(module, "multiply", res, a)?;
        if res.size != 2 {
            return Err(HeError::UnsupportedSize {
                op: "multiply",
                size: res.size,
            });
        }
        let handle = module.handle();
        let model: &NoiseModel = handle.noise();
        let noise: u32 = model.check("multiply", res.noise.max(a.noise), model.mul(res.noise, a.noise))?;
        let prod: bfv::Ciphertext = &handle.load_ciphertext(res)? * &handle.load_ciphertext(a)?;
        res.data = prod.to_bytes();
        res.size = 3;
        res.noise = noise;
        Ok(())
    }
}

impl RelinearizeImpl<Self> for FheBfv {
    fn relinearize_inplace_impl(module: &Module<Self>, res: &mut Ciphertext, rk: &RelinKey) -> Result<(), HeError> {
        check_key(rk.key_id, res.key_id)?;
        if res.size <= 2 {
            return Ok(());
        }
        let handle = module.handle();
        let model: &NoiseModel = handle.noise();
        let noise: u32 = model.check("relinearize", res.noise, model.keyswitch(res.noise, res.size - 2))?;
        let mut ct: bfv::Ciphertext = handle.load_ciphertext(res)?;
        handle
            .relin_key(rk)?
            .relinearizes(&mut ct)
            .map_err(backend_err)?;
        res.data = ct.to_bytes();
        res.size = 2;
        res.noise = noise;
        Ok(())
    }
}

impl RotateRowsImpl<Self> for FheBfv {
    fn rotate_rows_inplace_impl(module: &Module<Self>, res: &mut Ciphertext, steps: i64, gk: &GaloisKeys) -> Result<(), HeError> {
        check_key(gk.key_id, res.key_id)?;
        check_slots(module, res.n())?;
        if res.size != 2 {
            return Err(HeError::UnsupportedSize {
                op: "rotate_rows",
                size: res.size,
            });
        }
        let row_size: usize = module.row_size();
        let digits: Vec<i64> = gk.rotation_digits(steps, row_size)?;
        if digits.is_empty() {
            return Ok(());
        }
        let handle = module.handle();
        let model: &NoiseModel = handle.noise();
        let noise: u32 = model.check("rotate_rows", res.noise, model.keyswitch(res.noise, digits.len()))?;
        let ek = handle.galois_keys(gk)?;
        let mut ct: bfv::Ciphertext = handle.load_ciphertext(res)?;
        for digit in digits {
            ct = ek
                .rotates_columns_by(&ct, digit.rem_euclid(row_size as i64) as usize)
                .map_err(backend_err)?;
        }
        res.data = ct.to_bytes();
        res.noise = noise;
        Ok(())
    }
}
