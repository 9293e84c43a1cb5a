use crate::hal::{
    api::{ModuleNew, ModuleParams},
    error::HeError,
    layouts::{Backend, BatchParams, Module},
    oep::ModuleNewImpl,
};

impl<B> ModuleNew<B> for Module<B>
where
    B: Backend + ModuleNewImpl<B>,
{
    fn new(params: BatchParams) -> Result<Self, HeError> {
        B::new_impl(params)
    }
}

impl<B> ModuleParams for Module<B>
where
    B: Backend,
{
    fn batch_params(&self) -> &BatchParams {
        self.params()
    }
}
