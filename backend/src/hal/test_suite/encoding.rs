use sampling::source::Source;

use crate::hal::{
    api::{BatchDecode, BatchEncode, ModuleParams},
    error::HeError,
    layouts::{Backend, Module, Plaintext},
};

pub fn test_encode_decode<B: Backend>(module: &Module<B>)
where
    Module<B>: ModuleParams + BatchEncode + BatchDecode,
{
    let n: usize = module.slot_count();
    let t: u64 = module.plain_modulus();
    let half: u64 = t >> 1;
    let mask: u64 = t.next_power_of_two() - 1;
    let mut source: Source = Source::new([0u8; 32]);

    let values: Vec<i64> = (0..n)
        .map(|_| source.next_u64n(t, mask) as i64 - half as i64)
        .collect();
    let pt: Plaintext = module.encode_batch(&values).unwrap();
    assert_eq!(module.decode_batch(&pt), values);

    // short batches are zero padded
    let pt: Plaintext = module.encode_batch(&[1, -2, 3]).unwrap();
    let have: Vec<i64> = module.decode_batch(&pt);
    assert_eq!(&have[..3], &[1, -2, 3]);
    assert!(have[3..].iter().all(|x| *x == 0));

    // values are reduced modulo t
    let pt: Plaintext = module.encode_batch(&[t as i64, t as i64 + 5, -(t as i64)]).unwrap();
    assert_eq!(&module.decode_batch(&pt)[..3], &[0, 5, 0]);
}

pub fn test_encode_too_large<B: Backend>(module: &Module<B>)
where
    Module<B>: ModuleParams + BatchEncode,
{
    let n: usize = module.slot_count();
    let values: Vec<i64> = vec![1; n + 1];
    assert_eq!(
        module.encode_batch(&values),
        Err(HeError::BatchTooLarge { len: n + 1, slots: n })
    );
}
