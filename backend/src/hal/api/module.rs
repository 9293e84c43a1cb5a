use crate::hal::{
    error::HeError,
    layouts::{Backend, BatchParams},
};

/// Instantiate a new [crate::hal::layouts::Module].
pub trait ModuleNew<B: Backend> {
    fn new(params: BatchParams) -> Result<Self, HeError>
    where
        Self: Sized;
}

/// Read-only view of the encryption parameters.
pub trait ModuleParams {
    fn batch_params(&self) -> &BatchParams;

    fn slot_count(&self) -> usize {
        self.batch_params().slot_count()
    }

    fn row_size(&self) -> usize {
        self.batch_params().row_size()
    }

    fn plain_modulus(&self) -> u64 {
        self.batch_params().plain_modulus
    }
}
