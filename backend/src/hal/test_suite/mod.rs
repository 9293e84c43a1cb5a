//! Backend-parametric test functions.
//!
//! Backends instantiate them through [`crate::backend_test_suite!`].

pub mod encoding;
pub mod evaluation;
pub mod noise;
pub mod serialization;

use sampling::source::Source;

use crate::hal::{
    api::{GaloisKeysGenerate, ModuleParams, PublicKeyGenerate, RelinKeyGenerate, SecretKeyGenerate},
    layouts::{Backend, GaloisKeys, Module, PublicKey, RelinKey, SecretKey},
};

/// Full key material for one party, used by the test functions.
pub struct TestKeys {
    pub sk: SecretKey,
    pub pk: PublicKey,
    pub rk: RelinKey,
    pub gk: GaloisKeys,
}

impl TestKeys {
    pub fn generate<B: Backend>(module: &Module<B>, seed: [u8; 32]) -> Self
    where
        Module<B>: ModuleParams + SecretKeyGenerate + PublicKeyGenerate + RelinKeyGenerate + GaloisKeysGenerate,
    {
        let mut source: Source = Source::new(seed);
        let sk: SecretKey = module.generate_secret_key(&mut source);
        let pk: PublicKey = module
            .generate_public_key(&sk, &mut source)
            .expect("public key generation failed");
        let rk: RelinKey = module
            .generate_relin_key(&sk, &mut source)
            .expect("relinearization key generation failed");
        let gk: GaloisKeys = module
            .generate_galois_keys(&sk, &GaloisKeys::power_of_two_steps(module.row_size()), &mut source)
            .expect("power-of-two steps are valid rotation steps");
        Self { sk, pk, rk, gk }
    }
}

/// Centered residue of `x` modulo `t`.
pub fn centered(x: i64, t: u64) -> i64 {
    let t: i64 = t as i64;
    let r: i64 = x.rem_euclid(t);
    if r > t / 2 { r - t } else { r }
}

#[macro_export]
macro_rules! backend_test_suite {
    (
        mod $modname:ident,
        backend = $backend:ty,
        params = $params:expr,
        tests = {
            $( $(#[$attr:meta])* $test_name:ident => $impl:path ),+ $(,)?
        }
    ) => {
        mod $modname {
            use $crate::hal::{api::ModuleNew, layouts::Module};

            use once_cell::sync::Lazy;

            static MODULE: Lazy<Module<$backend>> =
                Lazy::new(|| Module::<$backend>::new($params).expect("invalid test parameters"));

            $(
                $(#[$attr])*
                #[test]
                fn $test_name() {
                    ($impl)(&*MODULE);
                }
            )+
        }
    };
}
