//! # royalty-core
//! Foundation types and traits for royalty share accounting.
//!
//! - [`types`]: 32-byte identifiers for entities, tokens, policies and holders
//! - [`traits`]: collaborator seams (ancestor graph, registry, disputes, ledger, clock)
//! - [`policy`]: the pluggable [`DistributionPolicy`](policy::DistributionPolicy) surface
//! - [`config`]: file-loadable settings and the versioned runtime configuration
//! - [`memory`]: in-memory collaborators for tests and simulation

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod memory;
pub mod policy;
pub mod traits;
pub mod types;
