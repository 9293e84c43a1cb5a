use crate::{
    hal::{
        api::{BatchDecode, BatchEncode, Decrypt, Encrypt, ModuleNew},
        error::HeError,
        layouts::{BatchParams, Ciphertext, Module, ReaderFrom, SecretKey, WriterTo},
        test_suite::TestKeys,
    },
    implementation::fhe_bfv::FheBfv,
};

crate::backend_test_suite! {
    mod fhe_bfv_small,
    backend = crate::implementation::fhe_bfv::FheBfv,
    params = crate::hal::layouts::BatchParams {
        log_n: 5,
        plain_modulus: 193,
        coeff_modulus_bits: 109,
    },
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
    mod fhe_bfv_batched,
    backend = crate::implementation::fhe_bfv::FheBfv,
    params = crate::hal::layouts::BatchParams {
        log_n: 10,
        ..crate::hal::layouts::BatchParams::default()
    },
    tests = {
        encode_decode => crate::hal::test_suite::encoding::test_encode_decode,
        add_sub => crate::hal::test_suite::evaluation::test_add_sub,
        multiply_relinearize => crate::hal::test_suite::evaluation::test_multiply_relinearize,
        rotate_rows => crate::hal::test_suite::evaluation::test_rotate_rows,
        budget_decreases => crate::hal::test_suite::noise::test_budget_decreases,
        serialization => crate::hal::test_suite::serialization::test_serialization,
    }
}

fn batched() -> Module<FheBfv> {
    Module::<FheBfv>::new(BatchParams {
        log_n: 10,
        ..BatchParams::default()
    })
    .unwrap()
}

#[test]
fn serialized_ciphertext_hides_slot_values() {
    let module: Module<FheBfv> = batched();
    let keys: TestKeys = TestKeys::generate(&module, [21u8; 32]);
    let value: i64 = 123456;
    let ct: Ciphertext = module
        .encrypt(&module.encode_batch(&vec![value; module.row_size()]).unwrap(), &keys.pk)
        .unwrap();

    let mut bytes: Vec<u8> = Vec::new();
    ct.write_to(&mut bytes).unwrap();
    let needle: [u8; 8] = (value as u64).to_le_bytes();
    assert!(!bytes.windows(8).any(|w| w == needle));
    assert_eq!(module.decode_batch(&module.decrypt(&ct, &keys.sk).unwrap())[0], value);
}

#[test]
fn secret_key_round_trips_through_its_seed() {
    let keys: TestKeys = TestKeys::generate(&batched(), [22u8; 32]);
    let ct: Ciphertext = {
        let module: Module<FheBfv> = batched();
        module
            .encrypt(&module.encode_batch(&[5, -6, 7]).unwrap(), &keys.pk)
            .unwrap()
    };

    let mut bytes: Vec<u8> = Vec::new();
    keys.sk.write_to(&mut bytes).unwrap();
    let mut sk: SecretKey = SecretKey::default();
    sk.read_from(&mut bytes.as_slice()).unwrap();

    // a fresh module has no cached keys
    let module: Module<FheBfv> = batched();
    assert_eq!(&module.decode_batch(&module.decrypt(&ct, &sk).unwrap())[..3], &[5, -6, 7]);
}

#[test]
fn rejects_rings_below_eight_slots() {
    let params: BatchParams = BatchParams {
        log_n: 2,
        plain_modulus: 17,
        coeff_modulus_bits: 60,
    };
    assert_eq!(params.validate(), Ok(()));
    assert!(matches!(
        Module::<FheBfv>::new(params),
        Err(HeError::InvalidParams(_))
    ));
}
