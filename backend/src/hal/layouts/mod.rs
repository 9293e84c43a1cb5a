mod ciphertext;
mod keys;
mod module;
mod params;
mod plaintext;
mod serialization;

pub use ciphertext::*;
pub use keys::*;
pub use module::*;
pub use params::*;
pub use plaintext::*;
pub use serialization::*;
