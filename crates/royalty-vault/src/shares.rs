//! Fixed-supply share ledger with per-snapshot balance checkpoints.
//!
//! A checkpoint `(id, balance)` records what a holder owned when snapshot
//! `id` was taken. It is written lazily, on the first balance change after
//! that snapshot, so holders that never move pay nothing. The balance at
//! snapshot `s` is the first checkpoint with `id >= s`, or the live balance
//! when there is none.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use royalty_core::error::{ConfigError, RoyaltyError, ShareError, VaultError};
use royalty_core::types::Address;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
struct Checkpoint {
    snapshot_id: u64,
    balance: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ShareLedger {
    supply: u64,
    balances: BTreeMap<Address, u64>,
    checkpoints: BTreeMap<Address, Vec<Checkpoint>>,
}

impl ShareLedger {
    /// Mint the whole `supply` to `holder`.
    pub fn mint(holder: Address, supply: u64) -> Self {
        Self {
            supply,
            balances: BTreeMap::from([(holder, supply)]),
            checkpoints: BTreeMap::new(),
        }
    }

    pub fn supply(&self) -> u64 {
        self.supply
    }

    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// Balance of `holder` as of snapshot `snapshot_id`.
    pub fn balance_at(&self, holder: &Address, snapshot_id: u64) -> u64 {
        let Some(points) = self.checkpoints.get(holder) else {
            return self.balance_of(holder);
        };
        let idx = points.partition_point(|cp| cp.snapshot_id < snapshot_id);
        match points.get(idx) {
            Some(cp) => cp.balance,
            None => self.balance_of(holder),
        }
    }

    /// Holders with a non-zero live balance.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &u64)> {
        self.balances.iter().filter(|(_, v)| **v > 0)
    }

    /// Sum of all live balances. Always equals [`supply`](Self::supply).
    pub fn total(&self) -> u64 {
        self.balances.values().sum()
    }

    /// Move `amount` from `from` to `to`, checkpointing both sides against
    /// `current_snapshot_id` first.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
        current_snapshot_id: u64,
    ) -> Result<(), RoyaltyError> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount.into());
        }
        if to.is_zero() {
            return Err(ConfigError::InvalidIdentifier("share recipient is empty".into()).into());
        }
        let have = self.balance_of(from);
        if have < amount {
            return Err(ShareError::InsufficientShares { have, need: amount }.into());
        }
        if from == to {
            return Ok(());
        }
        self.checkpoint(from, current_snapshot_id);
        self.checkpoint(to, current_snapshot_id);

        let remaining = have - amount;
        if remaining == 0 {
            self.balances.remove(from);
        } else {
            self.balances.insert(*from, remaining);
        }
        // Cannot overflow: every balance is a part of `supply`.
        *self.balances.entry(*to).or_insert(0) += amount;
        Ok(())
    }

    fn checkpoint(&mut self, holder: &Address, current_snapshot_id: u64) {
        // Snapshot 0 is "no snapshot yet"; nothing can ever be claimed against it.
        if current_snapshot_id == 0 {
            return;
        }
        let balance = self.balance_of(holder);
        let points = self.checkpoints.entry(*holder).or_default();
        if points.last().is_none_or(|cp| cp.snapshot_id < current_snapshot_id) {
            points.push(Checkpoint {
                snapshot_id: current_snapshot_id,
                balance,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SUPPLY: u64 = 100_000_000;

    fn a(seed: u8) -> Address {
        Address([seed; 32])
    }

    #[test]
    fn mint_assigns_supply() {
        let ledger = ShareLedger::mint(a(1), SUPPLY);
        assert_eq!(ledger.balance_of(&a(1)), SUPPLY);
        assert_eq!(ledger.total(), SUPPLY);
        assert_eq!(ledger.holders().count(), 1);
    }

    #[test]
    fn transfer_moves_and_prunes() {
        let mut ledger = ShareLedger::mint(a(1), SUPPLY);
        ledger.transfer(&a(1), &a(2), SUPPLY, 0).unwrap();
        assert_eq!(ledger.balance_of(&a(1)), 0);
        assert_eq!(ledger.balance_of(&a(2)), SUPPLY);
        assert_eq!(ledger.holders().count(), 1);
    }

    #[test]
    fn transfer_rejects_overdraft() {
        let mut ledger = ShareLedger::mint(a(1), SUPPLY);
        let err = ledger.transfer(&a(2), &a(1), 1, 0).unwrap_err();
        assert_eq!(
            err,
            RoyaltyError::Share(ShareError::InsufficientShares { have: 0, need: 1 })
        );
    }

    #[test]
    fn transfer_rejects_zero_and_empty() {
        let mut ledger = ShareLedger::mint(a(1), SUPPLY);
        assert_eq!(
            ledger.transfer(&a(1), &a(2), 0, 0).unwrap_err(),
            RoyaltyError::Vault(VaultError::ZeroAmount)
        );
        assert!(matches!(
            ledger.transfer(&a(1), &Address::ZERO, 1, 0).unwrap_err(),
            RoyaltyError::Config(ConfigError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn balance_at_without_checkpoints_is_live() {
        let ledger = ShareLedger::mint(a(1), SUPPLY);
        assert_eq!(ledger.balance_at(&a(1), 5), SUPPLY);
        assert_eq!(ledger.balance_at(&a(2), 5), 0);
    }

    #[test]
    fn balance_at_sees_history() {
        let mut ledger = ShareLedger::mint(a(1), SUPPLY);
        // Snapshot 1 taken, then half moves.
        ledger.transfer(&a(1), &a(2), SUPPLY / 2, 1).unwrap();
        // Snapshot 2 and 3 taken, then the rest moves.
        ledger.transfer(&a(1), &a(2), SUPPLY / 2, 3).unwrap();

        assert_eq!(ledger.balance_at(&a(1), 1), SUPPLY);
        assert_eq!(ledger.balance_at(&a(1), 2), SUPPLY / 2);
        assert_eq!(ledger.balance_at(&a(1), 3), SUPPLY / 2);
        assert_eq!(ledger.balance_at(&a(1), 4), 0);

        assert_eq!(ledger.balance_at(&a(2), 1), 0);
        assert_eq!(ledger.balance_at(&a(2), 3), SUPPLY / 2);
        assert_eq!(ledger.balance_at(&a(2), 4), SUPPLY);
    }

    #[test]
    fn one_checkpoint_per_snapshot() {
        let mut ledger = ShareLedger::mint(a(1), SUPPLY);
        ledger.transfer(&a(1), &a(2), 10, 1).unwrap();
        ledger.transfer(&a(1), &a(2), 10, 1).unwrap();
        // The first change after snapshot 1 fixed the snapshot-1 balance.
        assert_eq!(ledger.balance_at(&a(1), 1), SUPPLY);
        assert_eq!(ledger.checkpoints[&a(1)].len(), 1);
    }

    proptest! {
        #[test]
        fn total_is_conserved(
            moves in prop::collection::vec((0u8..4, 0u8..4, 1u64..=SUPPLY, 0u64..5), 0..40),
        ) {
            let mut ledger = ShareLedger::mint(a(0), SUPPLY);
            let mut snapshot = 0;
            for (from, to, amount, bump) in moves {
                snapshot += bump;
                let _ = ledger.transfer(&a(from), &a(to), amount, snapshot);
                prop_assert_eq!(ledger.total(), SUPPLY);
            }
        }
    }
}
