//! powledger - a proof-of-work ledger reconciled across replicas by the
//! longest-valid-chain rule
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the ledger and whole-chain validation
//! - [`transaction`] - Transaction types and submission checks
//! - [`crypto`] - Canonical block serialization and SHA-256 digests
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work predicate and nonce search
//! - [`consensus`] - Longest-valid-chain resolution against peers
//!
//! ## Networking
//! - [`network`] - Peer set and the HTTP chain client
//! - [`sync`] - Periodic background resolution
//! - [`node`] - The node service tying the pieces together
//! - `api` - REST endpoints (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod crypto;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod node;
pub mod sync;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
