//! # royalty-vault
//! Per-entity revenue vaults.
//!
//! All calculations use integer arithmetic only, with `u128` intermediates
//! for pro-rata products.
//!
//! A vault is a pure ledger: it never moves revenue tokens itself. Callers
//! read token balances, hand them in, and perform the transfers a settled
//! claim asks for.
//! - **Share ledger**: fixed supply, per-holder balances with snapshot
//!   checkpoints so past entitlements survive later share transfers.
//! - **Snapshots**: newly accrued revenue per token is frozen under an
//!   increasing snapshot id, at most once per configured interval.
//! - **Claims**: a holder's entitlement is the sum over its unclaimed
//!   snapshots of `balance_at(snapshot) * revenue(snapshot) / supply`.

pub mod shares;
pub mod vault;

pub use shares::ShareLedger;
pub use vault::{RevenueVault, SnapshotOutcome};
