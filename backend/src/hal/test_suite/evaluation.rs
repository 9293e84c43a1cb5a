use sampling::source::Source;

use crate::hal::{
    api::{
        BatchDecode, BatchEncode, CiphertextAdd, CiphertextMul, CiphertextSub, Decrypt, Encrypt, GaloisKeysGenerate,
        ModuleParams, PublicKeyGenerate, RelinKeyGenerate, Relinearize, RotateRows, SecretKeyGenerate,
    },
    error::HeError,
    layouts::{Backend, Ciphertext, GaloisKeys, Module},
    test_suite::{TestKeys, centered},
};

fn encrypt_values<B: Backend>(module: &Module<B>, keys: &TestKeys, values: &[i64]) -> Ciphertext
where
    Module<B>: BatchEncode + Encrypt,
{
    module
        .encrypt(&module.encode_batch(values).unwrap(), &keys.pk)
        .unwrap()
}

fn decrypt_values<B: Backend>(module: &Module<B>, keys: &TestKeys, ct: &Ciphertext) -> Vec<i64>
where
    Module<B>: BatchDecode + Decrypt,
{
    module.decode_batch(&module.decrypt(ct, &keys.sk).unwrap())
}

fn random_values(source: &mut Source, n: usize, bound: u64) -> Vec<i64> {
    let mask: u64 = (2 * bound).next_power_of_two() - 1;
    (0..n)
        .map(|_| source.next_u64n(2 * bound, mask) as i64 - bound as i64)
        .collect()
}

pub fn test_add_sub<B: Backend>(module: &Module<B>)
where
    Module<B>: ModuleParams
        + BatchEncode
        + BatchDecode
        + Encrypt
        + Decrypt
        + CiphertextAdd
        + CiphertextSub
        + SecretKeyGenerate
        + PublicKeyGenerate
        + RelinKeyGenerate
        + GaloisKeysGenerate,
{
    let keys: TestKeys = TestKeys::generate(module, [1u8; 32]);
    let t: u64 = module.plain_modulus();
    let n: usize = module.slot_count();
    let mut source: Source = Source::new([2u8; 32]);

    let a: Vec<i64> = random_values(&mut source, n, t / 2);
    let b: Vec<i64> = random_values(&mut source, n, t / 2);
    let ct_a: Ciphertext = encrypt_values(module, &keys, &a);
    let ct_b: Ciphertext = encrypt_values(module, &keys, &b);

    let sum: Vec<i64> = decrypt_values(module, &keys, &module.add(&ct_a, &ct_b).unwrap());
    let diff: Vec<i64> = decrypt_values(module, &keys, &module.sub(&ct_a, &ct_b).unwrap());
    (0..n).for_each(|i| {
        assert_eq!(sum[i], centered(a[i] + b[i], t), "add slot {}", i);
        assert_eq!(diff[i], centered(a[i] - b[i], t), "sub slot {}", i);
    });
}

pub fn test_multiply_relinearize<B: Backend>(module: &Module<B>)
where
    Module<B>: ModuleParams
        + BatchEncode
        + BatchDecode
        + Encrypt
        + Decrypt
        + CiphertextMul
        + Relinearize
        + SecretKeyGenerate
        + PublicKeyGenerate
        + RelinKeyGenerate
        + GaloisKeysGenerate,
{
    let keys: TestKeys = TestKeys::generate(module, [3u8; 32]);
    let t: u64 = module.plain_modulus();
    let n: usize = module.slot_count();
    let mut source: Source = Source::new([4u8; 32]);

    let a: Vec<i64> = random_values(&mut source, n, 1 << 9);
    let b: Vec<i64> = random_values(&mut source, n, 1 << 9);
    let c: Vec<i64> = random_values(&mut source, n, 1 << 9);
    let ct_a: Ciphertext = encrypt_values(module, &keys, &a);
    let ct_b: Ciphertext = encrypt_values(module, &keys, &b);
    let ct_c: Ciphertext = encrypt_values(module, &keys, &c);

    let mut prod: Ciphertext = module.multiply(&ct_a, &ct_b).unwrap();
    assert_eq!(prod.size(), 3);
    module.relinearize_inplace(&mut prod, &keys.rk).unwrap();
    assert_eq!(prod.size(), 2);

    // depth 2
    module.multiply_inplace(&mut prod, &ct_c).unwrap();
    module.relinearize_inplace(&mut prod, &keys.rk).unwrap();

    let have: Vec<i64> = decrypt_values(module, &keys, &prod);
    (0..n).for_each(|i| assert_eq!(have[i], centered(a[i] * b[i] * c[i], t), "slot {}", i));
}

pub fn test_rotate_rows<B: Backend>(module: &Module<B>)
where
    Module<B>: ModuleParams
        + BatchEncode
        + BatchDecode
        + Encrypt
        + Decrypt
        + CiphertextMul
        + RotateRows
        + SecretKeyGenerate
        + PublicKeyGenerate
        + RelinKeyGenerate
        + GaloisKeysGenerate,
{
    let keys: TestKeys = TestKeys::generate(module, [5u8; 32]);
    let n: usize = module.slot_count();
    let row_size: usize = module.row_size();

    let values: Vec<i64> = (0..n as i64).collect();
    let ct: Ciphertext = encrypt_values(module, &keys, &values);

    for steps in [1i64, -1, 3, -5, row_size as i64 - 1, 2 * row_size as i64 + 7] {
        let have: Vec<i64> = decrypt_values(module, &keys, &module.rotate_rows(&ct, steps, &keys.gk).unwrap());
        let shift: usize = steps.rem_euclid(row_size as i64) as usize;
        (0..2).for_each(|row| {
            (0..row_size).for_each(|i| {
                let want: i64 = values[row * row_size + (i + shift) % row_size];
                assert_eq!(have[row * row_size + i], want, "steps={} row={} col={}", steps, row, i);
            })
        });
    }

    // rotations need a size-2 input
    let unrelinearized: Ciphertext = module.multiply(&ct, &ct).unwrap();
    assert_eq!(
        module.rotate_rows(&unrelinearized, 1, &keys.gk),
        Err(HeError::UnsupportedSize {
            op: "rotate_rows",
            size: 3
        })
    );
}

pub fn test_missing_galois_key<B: Backend>(module: &Module<B>)
where
    Module<B>: ModuleParams
        + BatchEncode
        + Encrypt
        + RotateRows
        + SecretKeyGenerate
        + PublicKeyGenerate
        + RelinKeyGenerate
        + GaloisKeysGenerate,
{
    let keys: TestKeys = TestKeys::generate(module, [6u8; 32]);
    let mut source: Source = Source::new([7u8; 32]);
    let gk: GaloisKeys = module.generate_galois_keys(&keys.sk, &[1], &mut source).unwrap();
    let ct: Ciphertext = encrypt_values(module, &keys, &[1, 2, 3]);
    assert!(module.rotate_rows(&ct, 1, &gk).is_ok());
    assert_eq!(
        module.rotate_rows(&ct, 2, &gk),
        Err(HeError::MissingGaloisKey { step: 2 })
    );
}

pub fn test_key_mismatch<B: Backend>(module: &Module<B>)
where
    Module<B>: ModuleParams
        + BatchEncode
        + Encrypt
        + Decrypt
        + CiphertextAdd
        + SecretKeyGenerate
        + PublicKeyGenerate
        + RelinKeyGenerate
        + GaloisKeysGenerate,
{
    let alice: TestKeys = TestKeys::generate(module, [8u8; 32]);
    let bob: TestKeys = TestKeys::generate(module, [9u8; 32]);
    let ct_a: Ciphertext = encrypt_values(module, &alice, &[1]);
    let ct_b: Ciphertext = encrypt_values(module, &bob, &[1]);
    assert!(matches!(module.add(&ct_a, &ct_b), Err(HeError::KeyMismatch { .. })));
    assert!(matches!(module.decrypt(&ct_a, &bob.sk), Err(HeError::KeyMismatch { .. })));
}
