//! Per-vault entry points: snapshot, claims and share transfers.
//!
//! A [`VaultHandle`] borrows the module and names one entity's vault. Every
//! mutating call is atomic and guarded per vault, so claims on two different
//! vaults may nest while a second claim on the same vault is refused.

use std::collections::BTreeMap;

use tracing::info;

use royalty_core::error::{AccessError, RoyaltyError, VaultError};
use royalty_core::traits::{EntityRegistry, TokenLedger};
use royalty_core::types::{Address, EntityId, TokenId};
use royalty_vault::{RevenueVault, SnapshotOutcome};

use crate::guard::{CallFamily, GuardScope};
use crate::module::RoyaltyModule;
use crate::state::Depositor;

#[derive(Clone, Copy)]
pub struct VaultHandle<'a> {
    module: &'a RoyaltyModule,
    entity: EntityId,
    address: Address,
}

impl<'a> VaultHandle<'a> {
    pub(crate) fn new(module: &'a RoyaltyModule, entity: EntityId, address: Address) -> Self {
        Self {
            module,
            entity,
            address,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn read<T: Default>(&self, f: impl FnOnce(&RevenueVault) -> T) -> T {
        self.module
            .state
            .read()
            .vault(&self.entity)
            .ok()
            .map(f)
            .unwrap_or_default()
    }

    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.read(|v| v.balance_of(holder))
    }

    pub fn balance_at(&self, holder: &Address, snapshot_id: u64) -> u64 {
        self.read(|v| v.balance_at(holder, snapshot_id))
    }

    pub fn total_shares(&self) -> u64 {
        self.read(|v| v.shares().total())
    }

    pub fn current_snapshot_id(&self) -> u64 {
        self.read(RevenueVault::current_snapshot_id)
    }

    pub fn last_snapshot_time(&self) -> u64 {
        self.read(RevenueVault::last_snapshot_time)
    }

    pub fn tracked_tokens(&self) -> Vec<TokenId> {
        self.read(|v| v.tracked_tokens().copied().collect())
    }

    pub fn claimable_at(&self, snapshot_id: u64, token: &TokenId) -> u64 {
        self.read(|v| v.claimable_at(snapshot_id, token))
    }

    pub fn total_deposited(&self, token: &TokenId) -> u64 {
        self.read(|v| v.total_deposited(token))
    }

    pub fn unclaimed_at_last_snapshot(&self, token: &TokenId) -> u64 {
        self.read(|v| v.unclaimed_at_last_snapshot(token))
    }

    pub fn last_claimed_snapshot(&self, holder: &Address, token: &TokenId) -> u64 {
        self.read(|v| v.last_claimed_snapshot(holder, token))
    }

    pub fn ancestor_collectors(&self) -> Vec<Address> {
        self.read(|v| v.ancestor_collectors().copied().collect())
    }

    pub fn claimable_revenue(&self, holder: &Address, token: &TokenId) -> Result<u64, RoyaltyError> {
        self.module
            .state
            .read()
            .vault(&self.entity)?
            .claimable_revenue(holder, token)
    }

    /// Freeze revenue accrued since the last snapshot.
    pub fn snapshot(&self) -> Result<SnapshotOutcome, RoyaltyError> {
        self.module.atomic(
            "snapshot",
            &[(GuardScope::Vault(self.entity), CallFamily::Snapshot)],
            || {
                let tokens: Vec<TokenId> = {
                    let state = self.module.state.read();
                    state.vault(&self.entity)?.tracked_tokens().copied().collect()
                };
                let balances: BTreeMap<TokenId, u64> = tokens
                    .into_iter()
                    .map(|t| {
                        let balance = self.module.env.ledger.balance_of(&t, &self.address);
                        (t, balance)
                    })
                    .collect();
                let now = self.module.now();

                let mut state = self.module.state.write();
                let config = state.config().clone();
                let outcome = state
                    .vault_mut(&self.entity)?
                    .snapshot(&config, now, &balances)?;
                info!(
                    entity = %self.entity.short(),
                    snapshot_id = outcome.snapshot_id,
                    recorded = outcome.recorded.len(),
                    "snapshot taken"
                );
                Ok(outcome)
            },
        )
    }

    /// Claim `target`'s revenue in each of `tokens`. `caller` must be the
    /// target, and collective pools must use
    /// [`claim_collective_revenue`](Self::claim_collective_revenue).
    pub fn claim_own_revenue(
        &self,
        caller: &Address,
        tokens: &[TokenId],
        target: &Address,
    ) -> Result<Vec<(TokenId, u64)>, RoyaltyError> {
        self.module.atomic(
            "claim_own_revenue",
            &[(GuardScope::Vault(self.entity), CallFamily::Claim)],
            || {
                if self.module.env.registry.is_collective_receiver(target) {
                    return Err(AccessError::CollectiveMustClaimViaCollectiveModule.into());
                }
                if caller != target {
                    return Err(AccessError::MustClaimAsSelf.into());
                }
                self.settle_and_pay(target, tokens)
            },
        )
    }

    /// Claim on behalf of a collective pool. Collective module only.
    pub fn claim_collective_revenue(
        &self,
        caller: &Address,
        tokens: &[TokenId],
        pool: &Address,
    ) -> Result<Vec<(TokenId, u64)>, RoyaltyError> {
        self.module.atomic(
            "claim_collective_revenue",
            &[(GuardScope::Vault(self.entity), CallFamily::Claim)],
            || {
                if *caller != self.module.state.read().config().collective_module() {
                    return Err(AccessError::Unauthorized(format!(
                        "{} is not the collective module",
                        caller.short()
                    ))
                    .into());
                }
                if !self.module.env.registry.is_collective_receiver(pool) {
                    return Err(VaultError::InvalidTarget(format!("{pool} is not a collective pool")).into());
                }
                self.settle_and_pay(pool, tokens)
            },
        )
    }

    fn settle_and_pay(&self, holder: &Address, tokens: &[TokenId]) -> Result<Vec<(TokenId, u64)>, RoyaltyError> {
        let payouts = self
            .module
            .state
            .write()
            .vault_mut(&self.entity)?
            .settle_claim(holder, tokens)?;
        for (token, amount) in &payouts {
            self.module.move_tokens(token, &self.address, holder, *amount)?;
        }
        info!(entity = %self.entity.short(), holder = %holder.short(), tokens = payouts.len(), "revenue claimed");
        Ok(payouts)
    }

    /// This vault claims, as a share holder, its revenue from `descendant`'s
    /// vault. Only possible when propagation sent this vault shares of the
    /// descendant.
    pub fn claim_as_ancestor_vault(
        &self,
        tokens: &[TokenId],
        descendant: &EntityId,
    ) -> Result<Vec<(TokenId, u64)>, RoyaltyError> {
        if *descendant == self.entity || descendant.is_zero() {
            return Err(VaultError::InvalidTarget(descendant.to_string()).into());
        }
        self.module.atomic(
            "claim_as_ancestor_vault",
            &[
                (GuardScope::Vault(self.entity), CallFamily::Claim),
                (GuardScope::Vault(*descendant), CallFamily::Claim),
            ],
            || {
                let (from, payouts) = {
                    let mut state = self.module.state.write();
                    let source = state.vault(descendant)?;
                    if !source.is_ancestor_collector(&self.address) {
                        return Err(VaultError::NotAVerifiedAncestor {
                            ancestor: self.entity.to_string(),
                            descendant: descendant.to_string(),
                        }
                        .into());
                    }
                    let from = source.address();
                    let payouts = state
                        .vault_mut(descendant)?
                        .settle_claim(&self.address, tokens)?;
                    for (token, amount) in &payouts {
                        state.credit_vault(&self.entity, Depositor::Vault(from), *token, *amount)?;
                    }
                    (from, payouts)
                };
                for (token, amount) in &payouts {
                    self.module.move_tokens(token, &from, &self.address, *amount)?;
                }
                info!(
                    ancestor = %self.entity.short(),
                    descendant = %descendant.short(),
                    tokens = payouts.len(),
                    "ancestor vault claimed"
                );
                Ok(payouts)
            },
        )
    }

    /// Move `amount` of `caller`'s shares in this vault to `to`.
    pub fn transfer_shares(&self, caller: &Address, to: &Address, amount: u64) -> Result<(), RoyaltyError> {
        self.module.atomic(
            "transfer_shares",
            &[(GuardScope::Vault(self.entity), CallFamily::ShareTransfer)],
            || {
                self.module
                    .state
                    .write()
                    .vault_mut(&self.entity)?
                    .transfer_shares(caller, to, amount)
            },
        )
    }
}
