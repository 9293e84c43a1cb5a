use crate::{
    hal::{
        error::HeError,
        layouts::{BatchParams, Module},
        oep::ModuleNewImpl,
    },
    implementation::{NoiseModel, cpu_ref::CpuRef},
};

impl ModuleNewImpl<Self> for CpuRef {
    fn new_impl(params: BatchParams) -> Result<Module<Self>, HeError> {
        params.validate()?;
        let model: NoiseModel = NoiseModel::new(&params)?;
        Ok(Module::from_handle(params, model))
    }
}
