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
