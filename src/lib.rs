pub mod config;
pub mod error;
pub mod fetch;
pub mod fleet;
pub mod geo;
pub mod output;
pub mod risk;
pub mod weather;

pub use error::{Error, Result};
