//! # royalty-module
//! The distribution orchestrator.
//!
//! - [`module`]: [`RoyaltyModule`] whitelists, limits, grant and link
//!   events, payment routing, read API
//! - [`propagation`]: write-time share propagation through the derivation graph
//! - [`handle`]: [`VaultHandle`] snapshot, claims and share transfers on one vault
//! - [`policies`]: standard [`DistributionPolicy`](royalty_core::policy::DistributionPolicy) implementations
//! - [`guard`] / [`journal`]: per-family reentrancy guards and the
//!   ledger-transfer journal behind all-or-nothing calls

pub mod guard;
pub mod handle;
pub mod host;
pub mod journal;
pub mod module;
pub mod policies;
pub mod propagation;
pub mod state;

#[cfg(test)]
mod fixtures;

pub use handle::VaultHandle;
pub use module::{Collaborators, RoyaltyModule};
pub use policies::{FixedRatePolicy, ScaledExternalPolicy};
pub use propagation::{LinkOutcome, ShareMove};
