pub mod api;
pub mod delegates;
pub mod error;
pub mod layouts;
pub mod oep;
pub mod test_suite;

pub use error::HeError;
