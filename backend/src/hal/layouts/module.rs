use std::marker::PhantomData;

use crate::hal::layouts::BatchParams;

/// A backend: selects the implementation of every `oep` trait and the
/// precomputed state (`Handle`) a [`Module`] carries.
pub trait Backend: Sized + Sync + Send {
    type Handle: Send + Sync + 'static;
}

/// Encryption context: parameters plus the backend handle.
///
/// A `Module` is immutable after construction and shared by reference across
/// worker threads.
pub struct Module<B: Backend> {
    params: BatchParams,
    handle: B::Handle,
    _marker: PhantomData<B>,
}

impl<B: Backend> Module<B> {
    /// # Panics
    /// Panics if `params.log_n` is zero.
    pub fn from_handle(params: BatchParams, handle: B::Handle) -> Self {
        assert!(params.log_n > 0, "log_n must be positive");
        Self {
            params,
            handle,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn handle(&self) -> &B::Handle {
        &self.handle
    }

    #[inline]
    pub fn params(&self) -> &BatchParams {
        &self.params
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.params.n()
    }

    #[inline]
    pub fn log_n(&self) -> usize {
        self.params.log_n as usize
    }

    #[inline]
    pub fn row_size(&self) -> usize {
        self.params.row_size()
    }

    #[inline]
    pub fn plain_modulus(&self) -> u64 {
        self.params.plain_modulus
    }
}
