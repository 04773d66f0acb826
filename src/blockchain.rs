// Thin re-export module: the implementation lives in `blockchain/core.rs`, split into
// chain management and whole-chain validation.

pub mod core;
pub use core::*;
