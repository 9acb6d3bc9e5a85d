pub mod bootstrap;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod git;
pub mod inspect;
pub mod io;
pub mod links;
pub mod paths;
pub mod ports;
pub mod provision;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{GroveError, Result};
