pub mod api;
pub mod config;
pub mod confirm;
pub mod error;
pub mod eval;
pub mod ledger;
pub mod logging;
pub mod mempool;
pub mod node;
pub mod plutus;
pub mod primitives;
pub mod query;
pub mod rpc;
pub mod submit;

#[cfg(test)]
mod testing;

pub use error::{GatewayError, Result};
