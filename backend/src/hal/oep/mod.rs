//! Open Extension Points (OEP) for backends.
//!
//! Each trait mirrors a safe trait in [`crate::hal::api`] and carries the
//! `Impl` suffix (e.g. [`crate::hal::api::RotateRows`] is backed by
//! `RotateRowsImpl`). A backend `B` implements them for itself; the
//! [`crate::hal::delegates`] glue then exposes the API on `Module<B>`.

mod encoding;
mod encryption;
mod evaluation;
mod keys;
mod module;

pub use encoding::*;
pub use encryption::*;
pub use evaluation::*;
pub use keys::*;
pub use module::*;
