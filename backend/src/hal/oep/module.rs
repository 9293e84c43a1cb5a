use crate::hal::{
    error::HeError,
    layouts::{Backend, BatchParams, Module},
};

/// * See [crate::implementation::cpu_ref] for the reference implementation.
/// * See [crate::hal::api::ModuleNew] for corresponding public API.
pub trait ModuleNewImpl<B: Backend> {
    fn new_impl(params: BatchParams) -> Result<Module<B>, HeError>;
}
