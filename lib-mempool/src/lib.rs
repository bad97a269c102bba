//! Transaction Pool
//!
//! Holding area for unconfirmed transactions. Admission filters out
//! structurally invalid submissions before they reach the forger; the
//! queue is strictly FIFO; prioritization is out of scope.

pub mod errors;
pub mod pool;

pub use errors::{PoolError, PoolResult};
pub use pool::{Pool, TxPool};
