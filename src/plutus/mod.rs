//! Projection of ledger structures into the data scripts see at evaluation time

mod context;
mod data;
mod order;
mod time;
mod value;

pub use context::*;
pub use data::*;
pub use order::*;
pub use time::*;
pub use value::*;
