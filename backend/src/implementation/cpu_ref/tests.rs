use proptest::prelude::*;

use crate::{
    hal::{
        api::{BatchDecode, BatchEncode, ModuleNew},
        layouts::{BatchParams, Module},
    },
    implementation::cpu_ref::CpuRef,
};

crate::backend_test_suite! {
    mod cpu_ref_default,
    backend = crate::implementation::cpu_ref::CpuRef,
    params = crate::hal::layouts::BatchParams::default(),
    tests = {
        encode_decode => crate::hal::test_suite::encoding::test_encode_decode,
        encode_too_large => crate::hal::test_suite::encoding::test_encode_too_large,
        add_sub => crate::hal::test_suite::evaluation::test_add_sub,
        multiply_relinearize => crate::hal::test_suite::evaluation::test_multiply_relinearize,
        rotate_rows => crate::hal::test_suite::evaluation::test_rotate_rows,
        missing_galois_key => crate::hal::test_suite::evaluation::test_missing_galois_key,
        key_mismatch => crate::hal::test_suite::evaluation::test_key_mismatch,
        budget_decreases => crate::hal::test_suite::noise::test_budget_decreases,
        budget_exhaustion => crate::hal::test_suite::noise::test_budget_exhaustion,
        serialization => crate::hal::test_suite::serialization::test_serialization,
    }
}

crate::backend_test_suite! {
    mod cpu_ref_small,
    backend = crate::implementation::cpu_ref::CpuRef,
    params = crate::hal::layouts::BatchParams {
        log_n: 4,
        plain_modulus: 97,
        coeff_modulus_bits: 109,
    },
    tests = {
        encode_decode => crate::hal::test_suite::encoding::test_encode_decode,
        rotate_rows => crate::hal::test_suite::evaluation::test_rotate_rows,
        budget_exhaustion => crate::hal::test_suite::noise::test_budget_exhaustion,
    }
}

#[test]
fn rejects_invalid_params() {
    let params: BatchParams = BatchParams {
        plain_modulus: 786431,
        ..BatchParams::default()
    };
    assert!(Module::<CpuRef>::new(params).is_err());
}

proptest! {
    #[test]
    fn encode_decode_centered(values in proptest::collection::vec(-393216i64..=393216, 0..64)) {
        let module: Module<CpuRef> = Module::<CpuRef>::new(BatchParams::default()).unwrap();
        let decoded: Vec<i64> = module.decode_batch(&module.encode_batch(&values).unwrap());
        prop_assert_eq!(&decoded[..values.len()], &values[..]);
    }
}
