pub use pallas::crypto::hash::Hash;

mod address;
mod era;
mod input;
mod network;
mod output;
mod redeemer;
mod reward;
mod script;
mod value;

pub use address::*;
pub use era::*;
pub use input::*;
pub use network::*;
pub use output::*;
pub use redeemer::*;
pub use reward::*;
pub use script::*;
pub use value::*;

pub type TxHash = Hash<32>;
pub type BlockHash = Hash<32>;
pub type DatumHash = Hash<32>;
pub type PolicyId = Hash<28>;
pub type ScriptHash = Hash<28>;
pub type KeyHash = Hash<28>;
