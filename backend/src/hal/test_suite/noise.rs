use crate::hal::{
    api::{
        BatchDecode, BatchEncode, CiphertextAdd, CiphertextMul, Decrypt, Encrypt, GaloisKeysGenerate, ModuleParams,
        NoiseBudget, NoiseBudgetEstimate, PublicKeyGenerate, RelinKeyGenerate, Relinearize, SecretKeyGenerate,
    },
    error::HeError,
    layouts::{Backend, Ciphertext, Module},
    test_suite::TestKeys,
};

pub fn test_budget_decreases<B: Backend>(module: &Module<B>)
where
    Module<B>: ModuleParams
        + BatchEncode
        + Encrypt
        + CiphertextAdd
        + CiphertextMul
        + Relinearize
        + NoiseBudget
        + NoiseBudgetEstimate
        + SecretKeyGenerate
        + PublicKeyGenerate
        + RelinKeyGenerate
        + GaloisKeysGenerate,
{
    let keys: TestKeys = TestKeys::generate(module, [10u8; 32]);
    let ct: Ciphertext = module
        .encrypt(&module.encode_batch(&[3, 4, 5]).unwrap(), &keys.pk)
        .unwrap();

    let fresh: u32 = module.noise_budget(&ct, &keys.sk).unwrap();
    assert!(fresh > 0);
    // the estimate never promises more than a fresh encryption has
    let estimated_fresh: u32 = module.estimated_noise_budget(&ct);
    assert!(estimated_fresh > 0 && estimated_fresh <= fresh, "{} > {}", estimated_fresh, fresh);

    let sum: Ciphertext = module.add(&ct, &ct).unwrap();
    let after_add: u32 = module.noise_budget(&sum, &keys.sk).unwrap();
    assert!(after_add <= fresh);
    assert!(fresh - after_add <= 1, "addition consumed {} bits", fresh - after_add);

    let mut prod: Ciphertext = module.multiply(&ct, &ct).unwrap();
    module.relinearize_inplace(&mut prod, &keys.rk).unwrap();
    let after_mul: u32 = module.noise_budget(&prod, &keys.sk).unwrap();
    assert!(after_mul < after_add);
    assert!(module.estimated_noise_budget(&prod) < estimated_fresh);
}

pub fn test_budget_exhaustion<B: Backend>(module: &Module<B>)
where
    Module<B>: ModuleParams
        + BatchEncode
        + BatchDecode
        + Encrypt
        + Decrypt
        + CiphertextMul
        + Relinearize
        + NoiseBudgetEstimate
        + SecretKeyGenerate
        + PublicKeyGenerate
        + RelinKeyGenerate
        + GaloisKeysGenerate,
{
    let keys: TestKeys = TestKeys::generate(module, [11u8; 32]);
    let mut ct: Ciphertext = module
        .encrypt(&module.encode_batch(&[1, -1, 1]).unwrap(), &keys.pk)
        .unwrap();

    let mut squarings: usize = 0;
    let err: HeError = loop {
        let before: Ciphertext = ct.clone();
        match module.multiply(&before, &before) {
            Ok(mut prod) => {
                module.relinearize_inplace(&mut prod, &keys.rk).unwrap();
                ct = prod;
                squarings += 1;
                assert!(squarings < 64, "noise budget never ran out");
            }
            Err(err) => {
                // a failed operation leaves its input usable
                assert_eq!(ct, before);
                let pt = module.decrypt(&ct, &keys.sk).unwrap();
                assert_eq!(&module.decode_batch(&pt)[..3], &[1, 1, 1]);
                break err;
            }
        }
    };

    assert!(squarings >= 1);
    assert!(
        matches!(err, HeError::NoiseBudgetExhausted { op: "multiply", .. }),
        "{:?}",
        err
    );
}
