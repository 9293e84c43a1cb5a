//! # oblut backend
//!
//! Capability layer for batched (BFV-style) homomorphic encryption, consumed by
//! the lookup protocol in `oblut-core`.
//!
//! The [`hal`] module follows a four-layer stack:
//!
//! 1. [`hal::api`] -- user-facing traits implemented for [`hal::layouts::Module`]
//!    (encode/decode, key generation, encrypt/decrypt, add/sub/multiply,
//!    relinearize, row rotation, noise budget).
//! 2. [`hal::oep`] -- extension points with the `Impl` suffix that a backend
//!    implements.
//! 3. [`hal::delegates`] -- blanket glue from `api` to `oep`.
//! 4. [`hal::layouts`] -- backend-agnostic ciphertext, plaintext, key and
//!    parameter containers with little-endian serialization.
//!
//! [`implementation::fhe_bfv::FheBfv`] implements the extension points over
//! the `fhe` crate's BFV scheme.
//!
//! With the `cpu-ref` feature, `implementation::cpu_ref::CpuRef` is also
//! available: it reproduces slot arithmetic modulo the plaintext modulus, row
//! rotations, ciphertext sizes and the same noise estimate, but keeps slot
//! values in the clear. It provides no confidentiality and exists to test
//! protocols against the capability interface.

pub mod hal;
pub mod implementation;

#[cfg(any(test, feature = "cpu-ref"))]
pub use implementation::cpu_ref::CpuRef;
pub use implementation::fhe_bfv::FheBfv;
