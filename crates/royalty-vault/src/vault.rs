//! The revenue vault state machine: `deposit* -> snapshot -> claim*`.
//!
//! Token balances live in the external ledger. The vault only remembers how
//! much of its balance was already accounted for at the last snapshot
//! (`unclaimed_at_last_snapshot`), so a snapshot can attribute the difference
//! to the new snapshot id without touching any holder.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use royalty_core::config::RoyaltyConfig;
use royalty_core::constants::SHARE_SUPPLY;
use royalty_core::error::{ConfigError, RoyaltyError, VaultError};
use royalty_core::types::{Address, EntityId, TokenId};

use crate::shares::ShareLedger;

/// What a successful snapshot recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub snapshot_id: u64,
    /// Tokens with new revenue and the amount attributed to this snapshot.
    pub recorded: Vec<(TokenId, u64)>,
    /// Tokens dropped from tracking because the vault holds none of them.
    pub dropped: Vec<TokenId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevenueVault {
    entity: EntityId,
    address: Address,
    shares: ShareLedger,
    tracked_tokens: BTreeSet<TokenId>,
    unclaimed_at_last_snapshot: BTreeMap<TokenId, u64>,
    /// Revenue frozen per `(token, snapshot_id)`.
    claimable_at_snapshot: BTreeMap<(TokenId, u64), u64>,
    total_deposited: BTreeMap<TokenId, u64>,
    last_claimed_snapshot: BTreeMap<(Address, TokenId), u64>,
    /// Collection addresses that received shares when this vault was linked.
    ancestor_collectors: BTreeSet<Address>,
    last_snapshot_time: u64,
    current_snapshot_id: u64,
}

impl RevenueVault {
    /// Create the vault for `entity`, minting the full share supply to `initial_holder`.
    pub fn new(entity: EntityId, initial_holder: Address, now: u64) -> Self {
        Self {
            entity,
            address: Address::vault_of(&entity),
            shares: ShareLedger::mint(initial_holder, SHARE_SUPPLY),
            tracked_tokens: BTreeSet::new(),
            unclaimed_at_last_snapshot: BTreeMap::new(),
            claimable_at_snapshot: BTreeMap::new(),
            total_deposited: BTreeMap::new(),
            last_claimed_snapshot: BTreeMap::new(),
            ancestor_collectors: BTreeSet::new(),
            last_snapshot_time: now,
            current_snapshot_id: 0,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn shares(&self) -> &ShareLedger {
        &self.shares
    }

    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.shares.balance_of(holder)
    }

    pub fn balance_at(&self, holder: &Address, snapshot_id: u64) -> u64 {
        self.shares.balance_at(holder, snapshot_id)
    }

    pub fn tracked_tokens(&self) -> impl Iterator<Item = &TokenId> {
        self.tracked_tokens.iter()
    }

    pub fn is_tracked(&self, token: &TokenId) -> bool {
        self.tracked_tokens.contains(token)
    }

    pub fn current_snapshot_id(&self) -> u64 {
        self.current_snapshot_id
    }

    pub fn last_snapshot_time(&self) -> u64 {
        self.last_snapshot_time
    }

    /// Revenue of `token` frozen under `snapshot_id` (0 if none).
    pub fn claimable_at(&self, snapshot_id: u64, token: &TokenId) -> u64 {
        self.claimable_at_snapshot
            .get(&(*token, snapshot_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn unclaimed_at_last_snapshot(&self, token: &TokenId) -> u64 {
        self.unclaimed_at_last_snapshot.get(token).copied().unwrap_or(0)
    }

    pub fn total_deposited(&self, token: &TokenId) -> u64 {
        self.total_deposited.get(token).copied().unwrap_or(0)
    }

    pub fn last_claimed_snapshot(&self, holder: &Address, token: &TokenId) -> u64 {
        self.last_claimed_snapshot
            .get(&(*holder, *token))
            .copied()
            .unwrap_or(0)
    }

    pub fn ancestor_collectors(&self) -> impl Iterator<Item = &Address> {
        self.ancestor_collectors.iter()
    }

    pub fn is_ancestor_collector(&self, collector: &Address) -> bool {
        self.ancestor_collectors.contains(collector)
    }

    pub fn record_ancestor_collector(&mut self, collector: Address) {
        self.ancestor_collectors.insert(collector);
    }

    /// Move shares between holders, checkpointing against the current snapshot.
    pub fn transfer_shares(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), RoyaltyError> {
        self.shares.transfer(from, to, amount, self.current_snapshot_id)
    }

    /// Account for `amount` of `token` arriving at the vault.
    ///
    /// The token transfer itself is performed by the depositor.
    pub fn deposit(
        &mut self,
        config: &RoyaltyConfig,
        token: TokenId,
        amount: u64,
    ) -> Result<(), RoyaltyError> {
        if !config.is_token_whitelisted(&token) {
            return Err(ConfigError::UnwhitelistedToken(token.to_string()).into());
        }
        if amount == 0 {
            return Err(VaultError::ZeroAmount.into());
        }
        let total = self
            .total_deposited(&token)
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.total_deposited.insert(token, total);
        self.tracked_tokens.insert(token);
        Ok(())
    }

    /// Freeze revenue accrued since the last snapshot under a new snapshot id.
    ///
    /// `balances` holds the vault's current ledger balance of each tracked
    /// token; a token missing from the map counts as zero.
    pub fn snapshot(
        &mut self,
        config: &RoyaltyConfig,
        now: u64,
        balances: &BTreeMap<TokenId, u64>,
    ) -> Result<SnapshotOutcome, RoyaltyError> {
        let elapsed = now.saturating_sub(self.last_snapshot_time);
        let interval = config.snapshot_interval_secs();
        if elapsed < interval {
            return Err(VaultError::IntervalNotElapsed { elapsed, interval }.into());
        }

        let snapshot_id = self.current_snapshot_id + 1;
        let mut recorded = Vec::new();
        let mut dropped = Vec::new();
        let tokens: Vec<TokenId> = self.tracked_tokens.iter().copied().collect();
        for token in tokens {
            let balance = balances.get(&token).copied().unwrap_or(0);
            if balance == 0 {
                self.tracked_tokens.remove(&token);
                dropped.push(token);
                continue;
            }
            let new_revenue = balance.saturating_sub(self.unclaimed_at_last_snapshot(&token));
            if new_revenue == 0 {
                continue;
            }
            self.claimable_at_snapshot.insert((token, snapshot_id), new_revenue);
            self.unclaimed_at_last_snapshot.insert(token, balance);
            recorded.push((token, new_revenue));
        }

        self.current_snapshot_id = snapshot_id;
        self.last_snapshot_time = now;
        debug!(
            entity = %self.entity.short(),
            snapshot_id,
            recorded = recorded.len(),
            dropped = dropped.len(),
            "vault snapshot"
        );
        Ok(SnapshotOutcome {
            snapshot_id,
            recorded,
            dropped,
        })
    }

    /// Revenue of `token` owed to `holder` over its unclaimed snapshots.
    ///
    /// Each snapshot term is floored separately; the residue stays in the vault.
    pub fn claimable_revenue(&self, holder: &Address, token: &TokenId) -> Result<u64, RoyaltyError> {
        let last = self.last_claimed_snapshot(holder, token);
        if last >= self.current_snapshot_id {
            return Ok(0);
        }
        let supply = self.shares.supply() as u128;
        let mut total: u128 = 0;
        for (&(_, snapshot_id), &revenue) in self
            .claimable_at_snapshot
            .range((*token, last + 1)..=(*token, self.current_snapshot_id))
        {
            let balance = self.shares.balance_at(holder, snapshot_id) as u128;
            total = total
                .checked_add(balance * revenue as u128 / supply)
                .ok_or(VaultError::ArithmeticOverflow)?;
        }
        u64::try_from(total).map_err(|_| VaultError::ArithmeticOverflow.into())
    }

    /// Settle `holder`'s claim on each of `tokens`.
    ///
    /// Fails with `NoClaimableTokens` if any token (including a repeated one)
    /// has nothing owed, in which case nothing is settled. On success returns
    /// the amount of each token the caller must transfer out to the holder.
    pub fn settle_claim(
        &mut self,
        holder: &Address,
        tokens: &[TokenId],
    ) -> Result<Vec<(TokenId, u64)>, RoyaltyError> {
        if tokens.is_empty() {
            return Err(VaultError::NoClaimableTokens("no tokens requested".into()).into());
        }
        let mut seen = HashSet::new();
        let mut payouts = Vec::with_capacity(tokens.len());
        for token in tokens {
            let amount = if seen.insert(*token) {
                self.claimable_revenue(holder, token)?
            } else {
                0
            };
            if amount == 0 {
                return Err(VaultError::NoClaimableTokens(token.to_string()).into());
            }
            payouts.push((*token, amount));
        }

        for (token, amount) in &payouts {
            self.last_claimed_snapshot
                .insert((*holder, *token), self.current_snapshot_id);
            let unclaimed = self.unclaimed_at_last_snapshot(token).saturating_sub(*amount);
            self.unclaimed_at_last_snapshot.insert(*token, unclaimed);
        }
        Ok(payouts)
    }
}
