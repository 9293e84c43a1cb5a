use backend::hal::{
    api::{CiphertextAdd, ModuleParams, Relinearize, RotateRows},
    layouts::{Ciphertext, GaloisKeys, RelinKey},
};

use crate::error::{Error, Result};

/// Homomorphic sum of a non-empty sequence.
pub fn sum_ciphertexts<M, I>(module: &M, cts: I) -> Result<Ciphertext>
where
    M: CiphertextAdd,
    I: IntoIterator<Item = Ciphertext>,
{
    let mut iter = cts.into_iter();
    let mut acc: Ciphertext = iter
        .next()
        .ok_or_else(|| Error::InvalidInput("sum of no ciphertexts".into()))?;
    for ct in iter {
        module.add_inplace(&mut acc, &ct)?;
    }
    Ok(acc)
}

/// Adds `ct` into the running sum `acc`, starting it if empty.
pub fn accumulate<M: CiphertextAdd>(module: &M, acc: &mut Option<Ciphertext>, ct: &Ciphertext) -> Result<()> {
    match acc {
        Some(sum) => module.add_inplace(sum, ct)?,
        None => *acc = Some(ct.clone()),
    }
    Ok(())
}

/// Replaces every slot of the first row by the sum of the row:
/// `log2(row_size)` rounds of `ct += rotate(ct, 2^i)`.
///
/// `ct` must be of size 2.
pub fn fold_row<M>(module: &M, ct: &mut Ciphertext, rk: &RelinKey, gk: &GaloisKeys) -> Result<()>
where
    M: ModuleParams + CiphertextAdd + Relinearize + RotateRows,
{
    let log_row: u32 = module.row_size().trailing_zeros();
    for i in 0..log_row {
        let mut rotated: Ciphertext = module.rotate_rows(ct, 1 << i, gk)?;
        module.relinearize_inplace(&mut rotated, rk)?;
        module.add_inplace(ct, &rotated)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use backend::hal::layouts::Ciphertext;

    use super::{accumulate, fold_row, sum_ciphertexts};
    use crate::{error::Error, testing::TestContext};

    #[test]
    fn fold_replicates_the_row_sum() {
        let ctx: TestContext = TestContext::new(10);
        let mut values: Vec<i64> = vec![0; 1024];
        values[3] = 5;
        values[100] = -2;
        values[511] = 7;
        // second row is left alone by row rotations
        values[600] = 1000;
        let mut ct: Ciphertext = ctx.encrypt_values(&values);
        fold_row(&ctx.module, &mut ct, &ctx.keys.evaluation.rk, &ctx.keys.evaluation.gk).unwrap();
        let have: Vec<i64> = ctx.decrypt(&ct);
        assert!(have[..512].iter().all(|x| *x == 10), "{:?}", &have[..8]);
        assert!(have[512..].iter().all(|x| *x == 1000));
    }

    #[test]
    fn sums() {
        let ctx: TestContext = TestContext::new(10);
        let cts: Vec<Ciphertext> = (1..=4).map(|v| ctx.encrypt_scalar(v)).collect();
        let sum: Ciphertext = sum_ciphertexts(&ctx.module, cts.clone()).unwrap();
        assert_eq!(ctx.decrypt(&sum)[0], 10);
        assert!(matches!(
            sum_ciphertexts(&ctx.module, Vec::new()),
            Err(Error::InvalidInput(_))
        ));

        let mut acc: Option<Ciphertext> = None;
        cts.iter().for_each(|ct| accumulate(&ctx.module, &mut acc, ct).unwrap());
        assert_eq!(ctx.decrypt(&acc.unwrap())[511], 10);
    }
}
