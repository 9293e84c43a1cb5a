use backend::hal::api::{
    BatchDecode, BatchEncode, CiphertextAdd, CiphertextMul, CiphertextSub, Decrypt, Encrypt, GaloisKeysGenerate,
    ModuleParams, NoiseBudget, NoiseBudgetEstimate, PublicKeyGenerate, RelinKeyGenerate, Relinearize, RotateRows,
    SecretKeyGenerate,
};

/// Capabilities of the compute server: public-key encryption and evaluation.
pub trait EvaluateFamily:
    ModuleParams
    + BatchEncode
    + Encrypt
    + CiphertextAdd
    + CiphertextSub
    + CiphertextMul
    + Relinearize
    + RotateRows
    + NoiseBudgetEstimate
    + Sync
{
}

impl<M> EvaluateFamily for M where
    M: ModuleParams
        + BatchEncode
        + Encrypt
        + CiphertextAdd
        + CiphertextSub
        + CiphertextMul
        + Relinearize
        + RotateRows
        + NoiseBudgetEstimate
        + Sync
{
}

/// Capabilities of the key holder: decryption and query encryption.
pub trait ResolveFamily: ModuleParams + BatchEncode + BatchDecode + Encrypt + Decrypt + NoiseBudget + Sync {}

impl<M> ResolveFamily for M where M: ModuleParams + BatchEncode + BatchDecode + Encrypt + Decrypt + NoiseBudget + Sync {}

pub trait KeyGenFamily: ModuleParams + SecretKeyGenerate + PublicKeyGenerate + RelinKeyGenerate + GaloisKeysGenerate {}

impl<M> KeyGenFamily for M where M: ModuleParams + SecretKeyGenerate + PublicKeyGenerate + RelinKeyGenerate + GaloisKeysGenerate {}
