#![warn(clippy::all)]

mod config;
mod error;
mod rule;
pub mod soup;
mod universe;

pub use num_bigint::BigInt;

pub use config::{UniverseConfig, DEFAULT_MEM_LIMIT_MIB};
pub use error::UniverseError;
pub use rule::Rule;
pub use universe::{Bounds, Universe};

pub const VERSION: &str = "0.1.0";
