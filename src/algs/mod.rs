//! Communication backends and the collective exchanges built on them.

pub mod communicator;
pub mod exchange;
pub mod wire;

pub use exchange::{all_gather, all_reduce_and, all_to_all, exchange_sizes};
