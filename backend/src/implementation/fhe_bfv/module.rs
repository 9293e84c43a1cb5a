use fhe::bfv::BfvParametersBuilder;

use crate::{
    hal::{
        error::HeError,
        layouts::{BatchParams, Module},
        oep::ModuleNewImpl,
    },
    implementation::{
        NoiseModel,
        fhe_bfv::{BfvHandle, FheBfv},
    },
};

/// Smallest ring degree the `fhe` crate accepts.
const MIN_LOG_N: u32 = 3;

impl ModuleNewImpl<Self> for FheBfv {
    fn new_impl(params: BatchParams) -> Result<Module<Self>, HeError> {
        params.validate()?;
        if params.log_n < MIN_LOG_N {
            return Err(HeError::InvalidParams(format!(
                "log_n={} below the minimum of {MIN_LOG_N}",
                params.log_n
            )));
        }
        let model: NoiseModel = NoiseModel::new(&params)?;
        let bfv = BfvParametersBuilder::new()
            .set_degree(params.n())
            .set_plaintext_modulus(params.plain_modulus)
            .set_moduli_sizes(&params.moduli_sizes())
            .build_arc()
            .map_err(|err| HeError::InvalidParams(err.to_string()))?;
        Ok(Module::from_handle(params, BfvHandle::new(bfv, model)))
    }
}
