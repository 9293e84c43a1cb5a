pub mod accumulate;
pub mod aggregation;
pub mod calibration;
pub mod config;
pub mod error;
pub mod keys;
pub mod lookup;
pub mod messages;
pub mod protocol;
pub mod readings;
pub mod resolver;
pub mod roles;
pub mod state;
pub mod table;
#[cfg(test)]
mod testing;
pub mod trait_families;

pub use accumulate::*;
pub use aggregation::*;
pub use config::*;
pub use error::{Error, Result};
pub use keys::*;
pub use lookup::*;
pub use messages::*;
pub use protocol::*;
pub use readings::*;
pub use resolver::*;
pub use roles::*;
pub use state::*;
pub use table::*;
pub use trait_families::*;
