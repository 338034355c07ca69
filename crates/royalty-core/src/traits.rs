//! Trait interfaces for the collaborators the royalty module consumes.
//!
//! These traits define the contracts with systems outside the accounting core:
//! - [`AncestorGraphOracle`]: ancestor counts in the derivation graph
//! - [`EntityRegistry`]: collective entities and their pooled receivers
//! - [`DisputeOracle`]: dispute tags on entities
//! - [`TokenLedger`]: the movable-balance primitive revenue tokens live in
//! - [`Clock`]: wall-clock seconds used for snapshot spacing
//!
//! Any of them may be untrusted: implementations can attempt to call back into
//! the module before returning, so the module never holds its state lock
//! across a call through one of these traits.

use crate::error::LedgerError;
use crate::types::{Address, EntityId, TokenId};

/// Read-only view of the derivation graph.
pub trait AncestorGraphOracle: Send + Sync {
    /// Number of distinct ancestors of `entity` (parents, grandparents, ...).
    fn ancestor_count(&self, entity: &EntityId) -> u64;
}

/// Entity registration facts the module needs.
pub trait EntityRegistry: Send + Sync {
    /// Whether `entity` is a collective whose revenue goes to a pooled receiver.
    fn is_collective(&self, entity: &EntityId) -> bool;

    /// The pooled receiver of a collective entity.
    ///
    /// Only meaningful when [`is_collective`](Self::is_collective) is true.
    fn collective_receiver_of(&self, entity: &EntityId) -> Address;

    /// Whether `address` is the pooled receiver of some collective entity.
    fn is_collective_receiver(&self, address: &Address) -> bool;
}

/// Dispute tags. A tagged entity may neither receive nor pay revenue.
pub trait DisputeOracle: Send + Sync {
    fn is_tagged(&self, entity: &EntityId) -> bool;
}

/// The low-level movable-balance primitive for revenue tokens.
pub trait TokenLedger: Send + Sync {
    /// Balance of `token` held by `holder`.
    fn balance_of(&self, token: &TokenId, holder: &Address) -> u64;

    /// Move `amount` of `token` from `from` to `to`.
    ///
    /// Either moves the full amount or fails without effect.
    fn transfer(
        &self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), LedgerError>;

    /// Whether `holder` can cover `amount` of `token`.
    ///
    /// Default implementation compares against [`balance_of`](Self::balance_of).
    fn can_cover(&self, token: &TokenId, holder: &Address, amount: u64) -> bool {
        self.balance_of(token, holder) >= amount
    }
}

/// Source of the current time in Unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}
