//! Block Forging Core
//!
//! Assembles candidate blocks from the pending pool, enforces staking-slot
//! admission, synthesizes the protocol-mandated reward, collapse and fee
//! transactions, validates the result and commits it atomically.
//!
//! One `forge_block` / `finalize_block` cycle is in flight at a time; the
//! registry alone is shared with concurrent read-only consumers and keeps
//! its own reader/writer discipline.

pub mod collapse;
pub mod config;
pub mod error;
pub mod forge;
pub mod registry;
pub mod synth;
pub mod validate;

pub use collapse::plan_collapse;
pub use config::ForgeConfig;
pub use error::{ForgeError, ForgeResult};
pub use forge::Forger;
pub use registry::{RegistryError, StakeRegistry};
pub use synth::{create_fee_tx, create_reward_tx, SynthError};
pub use validate::{BlockValidator, LedgerValidator, ValidationError};
