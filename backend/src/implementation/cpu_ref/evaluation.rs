use itertools::izip;

use crate::{
    hal::{
        error::HeError,
        layouts::{Ciphertext, GaloisKeys, Module, RelinKey},
        oep::{CiphertextAddImpl, CiphertextMulImpl, CiphertextSubImpl, RelinearizeImpl, RotateRowsImpl},
    },
    implementation::{
        NoiseModel, check_key, check_operands, check_slots,
        cpu_ref::{CpuRef, pack, unpack},
    },
};

fn slotwise(res: &mut Ciphertext, a: &Ciphertext, f: impl Fn(u64, u64) -> u64) {
    let mut words: Vec<u64> = unpack(res);
    izip!(words.iter_mut(), unpack(a).iter()).for_each(|(r, x)| *r = f(*r, *x));
    res.data = pack(&words);
}

impl CiphertextAddImpl<Self> for CpuRef {
    fn add_inplace_impl(module: &Module<Self>, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError> {
        check_operands(module, "add", res, a)?;
        let model: &NoiseModel = module.handle();
        let noise: u32 = model.check("add", res.noise.max(a.noise), model.add(res.noise, a.noise))?;
        let t: u64 = module.plain_modulus();
        slotwise(res, a, |r, x| (r + x) % t);
        res.noise = noise;
        Ok(())
    }
}

impl CiphertextSubImpl<Self> for CpuRef {
    fn sub_inplace_impl(module: &Module<Self>, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError> {
        check_operands(module, "sub", res, a)?;
        let model: &NoiseModel = module.handle();
        let noise: u32 = model.check("sub", res.noise.max(a.noise), model.add(res.noise, a.noise))?;
        let t: u64 = module.plain_modulus();
        slotwise(res, a, |r, x| (r + t - x) % t);
        res.noise = noise;
        Ok(())
    }
}

impl CiphertextMulImpl<Self> for CpuRef {
    fn multiply_inplace_impl(module: &Module<Self>, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError> {
        check_operands(module, "multiply", res, a)?;
        if res.size != 2 {
            return Err(HeError::UnsupportedSize {
                op: "multiply",
                size: res.size,
            });
        }
        let model: &NoiseModel = module.handle();
        let noise: u32 = model.check("multiply", res.noise.max(a.noise), model.mul(res.noise, a.noise))?;
        let t: u64 = module.plain_modulus();
        slotwise(res, a, |r, x| (r * x) % t);
        res.size = 3;
        res.noise = noise;
        Ok(())
    }
}

impl RelinearizeImpl<Self> for CpuRef {
    fn relinearize_inplace_impl(module: &Module<Self>, res: &mut Ciphertext, rk: &RelinKey) -> Result<(), HeError> {
        check_key(rk.key_id, res.key_id)?;
        if res.size <= 2 {
            return Ok(());
        }
        let model: &NoiseModel = module.handle();
        res.noise = model.check("relinearize", res.noise, model.keyswitch(res.noise, res.size - 2))?;
        res.size = 2;
        Ok(())
    }
}

impl RotateRowsImpl<Self> for CpuRef {
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
        let switches: usize = gk.rotation_digits(steps, row_size)?.len();
        if switches == 0 {
            return Ok(());
        }
        let model: &NoiseModel = module.handle();
        let noise: u32 = model.check("rotate_rows", res.noise, model.keyswitch(res.noise, switches))?;
        let shift: usize = steps.rem_euclid(row_size as i64) as usize;
        let mut words: Vec<u64> = unpack(res);
        words
            .chunks_exact_mut(row_size)
            .for_each(|row| row.rotate_left(shift));
        res.data = pack(&words);
        res.noise = noise;
        Ok(())
    }
}
