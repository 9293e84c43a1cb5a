pub mod readings;
pub mod source;
