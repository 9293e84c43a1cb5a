use crate::hal::{
    error::HeError,
    layouts::{Ciphertext, GaloisKeys, RelinKey},
};

pub trait CiphertextAdd {
    /// Adds `a` to `res`.
    fn add_inplace(&self, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError>;

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, HeError> {
        let mut res: Ciphertext = a.clone();
        self.add_inplace(&mut res, b)?;
        Ok(res)
    }
}

pub trait CiphertextSub {
    /// Subtracts `a` from `res`.
    fn sub_inplace(&self, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError>;

    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, HeError> {
        let mut res: Ciphertext = a.clone();
        self.sub_inplace(&mut res, b)?;
        Ok(res)
    }
}

pub trait CiphertextMul {
    /// Multiplies `res` by `a` slot-wise. Both operands must be of size 2;
    /// the product is of size 3 until relinearized.
    fn multiply_inplace(&self, res: &mut Ciphertext, a: &Ciphertext) -> Result<(), HeError>;

    fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, HeError> {
        let mut res: Ciphertext = a.clone();
        self.multiply_inplace(&mut res, b)?;
        Ok(res)
    }
}

pub trait Relinearize {
    /// Reduces `res` to size 2. No-op on a size-2 ciphertext.
    fn relinearize_inplace(&self, res: &mut Ciphertext, rk: &RelinKey) -> Result<(), HeError>;

    fn relinearize(&self, a: &Ciphertext, rk: &RelinKey) -> Result<Ciphertext, HeError> {
        let mut res: Ciphertext = a.clone();
        self.relinearize_inplace(&mut res, rk)?;
        Ok(res)
    }
}

pub trait RotateRows {
    /// Cyclically rotates both rows left by `steps`:
    /// `res[i] <- res[(i + steps) mod row_size]`. Negative steps rotate right.
    /// Requires a size-2 ciphertext.
    fn rotate_rows_inplace(&self, res: &mut Ciphertext, steps: i64, gk: &GaloisKeys) -> Result<(), HeError>;

    fn rotate_rows(&self, a: &Ciphertext, steps: i64, gk: &GaloisKeys) -> Result<Ciphertext, HeError> {
        let mut res: Ciphertext = a.clone();
        self.rotate_rows_inplace(&mut res, steps, gk)?;
        Ok(res)
    }
}
