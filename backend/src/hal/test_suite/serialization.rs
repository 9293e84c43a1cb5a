use std::fmt::Debug;

use crate::hal::{
    api::{
        BatchEncode, CiphertextMul, Encrypt, GaloisKeysGenerate, ModuleParams, PublicKeyGenerate, RelinKeyGenerate,
        SecretKeyGenerate,
    },
    layouts::{
        Backend, BatchParams, Ciphertext, GaloisKeys, Module, Plaintext, PublicKey, ReaderFrom, RelinKey, SecretKey,
        WriterTo,
    },
    test_suite::TestKeys,
};

/// Writes `original`, reads it back into `receiver` and compares.
pub fn test_reader_writer_interface<T>(original: &T, mut receiver: T)
where
    T: WriterTo + ReaderFrom + PartialEq + Eq + Debug,
{
    let mut buffer: Vec<u8> = Vec::new();
    original.write_to(&mut buffer).expect("write_to failed");

    let mut reader: &[u8] = &buffer;
    receiver.read_from(&mut reader).expect("read_from failed");
    assert!(reader.is_empty(), "{} trailing bytes", reader.len());
    assert_eq!(original, &receiver, "Deserialized object does not match the original");

    // any truncation is an error
    for cut in [0, 1, buffer.len() / 2, buffer.len() - 1] {
        let mut reader: &[u8] = &buffer[..cut];
        assert!(receiver.read_from(&mut reader).is_err(), "truncated at {}", cut);
    }
}

pub fn test_serialization<B: Backend>(module: &Module<B>)
where
    Module<B>: ModuleParams
        + BatchEncode
        + Encrypt
        + CiphertextMul
        + SecretKeyGenerate
        + PublicKeyGenerate
        + RelinKeyGenerate
        + GaloisKeysGenerate,
{
    let n: usize = module.slot_count();
    let keys: TestKeys = TestKeys::generate(module, [12u8; 32]);

    let pt: Plaintext = module.encode_batch(&[7, -7, 42]).unwrap();
    test_reader_writer_interface(&pt, Plaintext::alloc(n));

    let ct: Ciphertext = module.encrypt(&pt, &keys.pk).unwrap();
    test_reader_writer_interface(&ct, Ciphertext::alloc(n));
    let prod: Ciphertext = module.multiply(&ct, &ct).unwrap();
    test_reader_writer_interface(&prod, Ciphertext::alloc(n));

    test_reader_writer_interface(&keys.sk, SecretKey::default());
    test_reader_writer_interface(&keys.pk, PublicKey::default());
    test_reader_writer_interface(&keys.rk, RelinKey::default());
    test_reader_writer_interface(&keys.gk, GaloisKeys::default());
    test_reader_writer_interface(module.batch_params(), BatchParams::default());

    // a ciphertext does not read as a public key
    let mut buffer: Vec<u8> = Vec::new();
    ct.write_to(&mut buffer).unwrap();
    let mut reader: &[u8] = &buffer;
    assert!(PublicKey::default().read_from(&mut reader).is_err());
}
