//! Everything the module owns, with an undo journal of its own changes.
//!
//! Fields are private so every change goes through a method that first
//! records the prior value of the key it touches. A failing frame replays
//! those records newest first, so rollback costs what the call touched and
//! nothing more.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use royalty_core::config::RoyaltyConfig;
use royalty_core::error::{AccessError, ConfigError, RoyaltyError, VaultError};
use royalty_core::policy::DistributionPolicy;
use royalty_core::types::{Address, EntityId, PolicyId, TokenId};
use royalty_vault::RevenueVault;

use crate::journal::Journal;

/// Who is crediting revenue to a vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Depositor {
    Module,
    /// Another vault, identified by its address.
    Vault(Address),
}

/// Prior value of one touched key. `None` means the key was absent.
enum StateUndo {
    Config(Box<RoyaltyConfig>),
    Vault(EntityId, Option<Box<RevenueVault>>),
    VaultIndex(Address, Option<EntityId>),
    Accumulated(EntityId, Option<BTreeSet<PolicyId>>),
    Policy(PolicyId, Option<Arc<dyn DistributionPolicy>>),
    Slot((PolicyId, EntityId), Option<u64>),
    Revenue((EntityId, TokenId), Option<u64>),
}

fn restore<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, prior: Option<V>) {
    match prior {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

pub struct ModuleState {
    config: RoyaltyConfig,
    vaults: BTreeMap<EntityId, RevenueVault>,
    vault_index: BTreeMap<Address, EntityId>,
    accumulated: BTreeMap<EntityId, BTreeSet<PolicyId>>,
    policies: BTreeMap<PolicyId, Arc<dyn DistributionPolicy>>,
    policy_slots: BTreeMap<(PolicyId, EntityId), u64>,
    revenue_received: BTreeMap<(EntityId, TokenId), u64>,
    undo: Journal<StateUndo>,
}

impl ModuleState {
    pub fn new(config: RoyaltyConfig) -> Self {
        Self {
            config,
            vaults: BTreeMap::new(),
            vault_index: BTreeMap::new(),
            accumulated: BTreeMap::new(),
            policies: BTreeMap::new(),
            policy_slots: BTreeMap::new(),
            revenue_received: BTreeMap::new(),
            undo: Journal::default(),
        }
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    pub fn open_frame(&mut self) -> usize {
        self.undo.open()
    }

    pub fn commit_frame(&mut self) {
        self.undo.commit();
    }

    /// Undo every change made since `mark`. Returns how many records were
    /// replayed.
    pub fn rollback_frame(&mut self, mark: usize) -> usize {
        let records = self.undo.rollback(mark);
        let replayed = records.len();
        for record in records {
            match record {
                StateUndo::Config(prior) => self.config = *prior,
                StateUndo::Vault(entity, prior) => restore(&mut self.vaults, entity, prior.map(|v| *v)),
                StateUndo::VaultIndex(address, prior) => restore(&mut self.vault_index, address, prior),
                StateUndo::Accumulated(entity, prior) => restore(&mut self.accumulated, entity, prior),
                StateUndo::Policy(id, prior) => restore(&mut self.policies, id, prior),
                StateUndo::Slot(key, prior) => restore(&mut self.policy_slots, key, prior),
                StateUndo::Revenue(key, prior) => restore(&mut self.revenue_received, key, prior),
            }
        }
        replayed
    }

    /// Undo records held by open frames.
    pub fn pending_undo(&self) -> usize {
        self.undo.pending()
    }

    /// Record `entity`'s vault once per frame; later changes in the same
    /// frame are covered by that copy.
    fn touch_vault(&mut self, entity: &EntityId) {
        if self.undo.depth() == 0 {
            return;
        }
        let seen = self
            .undo
            .current()
            .iter()
            .any(|r| matches!(r, StateUndo::Vault(e, _) if e == entity));
        if !seen {
            let prior = self.vaults.get(entity).cloned().map(Box::new);
            self.undo.record(StateUndo::Vault(*entity, prior));
        }
    }

    // ------------------------------------------------------------------
    // Configuration and policies
    // ------------------------------------------------------------------

    pub fn config(&self) -> &RoyaltyConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RoyaltyConfig {
        let seen = self.undo.current().iter().any(|r| matches!(r, StateUndo::Config(_)));
        if !seen && self.undo.depth() > 0 {
            self.undo.record(StateUndo::Config(Box::new(self.config.clone())));
        }
        &mut self.config
    }

    /// The implementation behind a known policy id.
    pub fn policy(&self, id: &PolicyId) -> Result<Arc<dyn DistributionPolicy>, RoyaltyError> {
        self.policies
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigError::PolicyNotAllowed(id.to_string()).into())
    }

    pub fn has_policy(&self, id: &PolicyId) -> bool {
        self.policies.contains_key(id)
    }

    pub fn insert_policy(&mut self, id: PolicyId, policy: Arc<dyn DistributionPolicy>) {
        let prior = self.policies.insert(id, policy);
        self.undo.record(StateUndo::Policy(id, prior));
    }

    pub fn slot(&self, policy: &PolicyId, entity: &EntityId) -> u64 {
        self.policy_slots.get(&(*policy, *entity)).copied().unwrap_or(0)
    }

    pub fn set_slot(&mut self, policy: PolicyId, entity: EntityId, value: u64) {
        let key = (policy, entity);
        let prior = self.policy_slots.insert(key, value);
        self.undo.record(StateUndo::Slot(key, prior));
    }

    // ------------------------------------------------------------------
    // Vaults
    // ------------------------------------------------------------------

    pub fn vault(&self, entity: &EntityId) -> Result<&RevenueVault, RoyaltyError> {
        self.vaults
            .get(entity)
            .ok_or_else(|| VaultError::NoVault(entity.to_string()).into())
    }

    pub fn vault_mut(&mut self, entity: &EntityId) -> Result<&mut RevenueVault, RoyaltyError> {
        if !self.vaults.contains_key(entity) {
            return Err(VaultError::NoVault(entity.to_string()).into());
        }
        self.touch_vault(entity);
        self.vaults
            .get_mut(entity)
            .ok_or_else(|| VaultError::NoVault(entity.to_string()).into())
    }

    pub fn has_vault(&self, entity: &EntityId) -> bool {
        self.vaults.contains_key(entity)
    }

    pub fn vaults(&self) -> impl Iterator<Item = (&EntityId, &RevenueVault)> {
        self.vaults.iter()
    }

    pub fn vault_count(&self) -> usize {
        self.vaults.len()
    }

    pub fn entity_of_vault(&self, address: &Address) -> Option<EntityId> {
        self.vault_index.get(address).copied()
    }

    /// Create `entity`'s vault with the full supply held by `initial_holder`.
    pub fn create_vault(&mut self, entity: EntityId, initial_holder: Address, now: u64) -> Address {
        let vault = RevenueVault::new(entity, initial_holder, now);
        let address = vault.address();
        let prior_index = self.vault_index.insert(address, entity);
        self.undo.record(StateUndo::VaultIndex(address, prior_index));
        let prior = self.vaults.insert(entity, vault).map(Box::new);
        self.undo.record(StateUndo::Vault(entity, prior));
        address
    }

    // ------------------------------------------------------------------
    // Accumulated policy sets
    // ------------------------------------------------------------------

    pub fn accumulated_of(&self, entity: &EntityId) -> BTreeSet<PolicyId> {
        self.accumulated.get(entity).cloned().unwrap_or_default()
    }

    /// Add `policies` to `entity`'s set and return its new size.
    pub fn extend_accumulated(
        &mut self,
        entity: EntityId,
        policies: impl IntoIterator<Item = PolicyId>,
    ) -> usize {
        let prior = self.accumulated.get(&entity).cloned();
        self.undo.record(StateUndo::Accumulated(entity, prior));
        let set = self.accumulated.entry(entity).or_default();
        set.extend(policies);
        set.len()
    }

    // ------------------------------------------------------------------
    // Revenue
    // ------------------------------------------------------------------

    pub fn revenue_received(&self, entity: &EntityId, token: &TokenId) -> u64 {
        self.revenue_received.get(&(*entity, *token)).copied().unwrap_or(0)
    }

    /// Account a deposit into `entity`'s vault.
    ///
    /// Only the module itself or another registered vault may deposit.
    pub fn credit_vault(
        &mut self,
        entity: &EntityId,
        depositor: Depositor,
        token: TokenId,
        amount: u64,
    ) -> Result<(), RoyaltyError> {
        if let Depositor::Vault(address) = depositor {
            if !self.vault_index.contains_key(&address) {
                return Err(AccessError::Unauthorized(format!("depositor {address}")).into());
            }
        }
        if !self.vaults.contains_key(entity) {
            return Err(VaultError::NoVault(entity.to_string()).into());
        }
        let key = (*entity, token);
        let prior = self.revenue_received.get(&key).copied();
        let received = prior
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;

        self.touch_vault(entity);
        if let Some(vault) = self.vaults.get_mut(entity) {
            vault.deposit(&self.config, token, amount)?;
        }
        self.undo.record(StateUndo::Revenue(key, prior));
        self.revenue_received.insert(key, received);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use royalty_core::config::RoyaltySettings;
    use royalty_core::constants::SHARE_SUPPLY;

    fn usd() -> TokenId {
        TokenId([0x55; 32])
    }

    fn state() -> ModuleState {
        let settings = RoyaltySettings {
            whitelisted_tokens: vec![usd()],
            ..RoyaltySettings::default()
        };
        ModuleState::new(RoyaltyConfig::from_settings(&settings).unwrap())
    }

    #[test]
    fn create_vault_indexes_address() {
        let mut state = state();
        let entity = EntityId([1; 32]);
        let address = state.create_vault(entity, Address([2; 32]), 0);
        assert_eq!(state.entity_of_vault(&address), Some(entity));
        assert_eq!(state.vault(&entity).unwrap().balance_of(&Address([2; 32])), SHARE_SUPPLY);
    }

    #[test]
    fn missing_vault_and_policy() {
        let state = state();
        assert!(matches!(
            state.vault(&EntityId([1; 32])),
            Err(RoyaltyError::Vault(VaultError::NoVault(_)))
        ));
        assert!(matches!(
            state.policy(&PolicyId([1; 32])),
            Err(RoyaltyError::Config(ConfigError::PolicyNotAllowed(_)))
        ));
    }

    #[test]
    fn credit_requires_known_depositor() {
        let mut state = state();
        let a = EntityId([1; 32]);
        let b = EntityId([2; 32]);
        state.create_vault(a, Address([9; 32]), 0);
        let b_vault = state.create_vault(b, Address([9; 32]), 0);

        state.credit_vault(&a, Depositor::Module, usd(), 10).unwrap();
        state.credit_vault(&a, Depositor::Vault(b_vault), usd(), 5).unwrap();
        assert_eq!(state.revenue_received(&a, &usd()), 15);

        let err = state
            .credit_vault(&a, Depositor::Vault(Address([7; 32])), usd(), 5)
            .unwrap_err();
        assert!(matches!(err, RoyaltyError::Access(AccessError::Unauthorized(_))));
        assert_eq!(state.vault(&a).unwrap().total_deposited(&usd()), 15);
    }

    #[test]
    fn slots_default_to_zero() {
        let mut state = state();
        let policy = PolicyId([3; 32]);
        let entity = EntityId([4; 32]);
        assert_eq!(state.slot(&policy, &entity), 0);
        state.set_slot(policy, entity, 42);
        assert_eq!(state.slot(&policy, &entity), 42);
    }

    #[test]
    fn rollback_restores_touched_keys() {
        let mut state = state();
        let (a, b) = (EntityId([1; 32]), EntityId([2; 32]));
        let policy = PolicyId([3; 32]);
        state.create_vault(a, Address([9; 32]), 0);
        state.credit_vault(&a, Depositor::Module, usd(), 10).unwrap();

        let mark = state.open_frame();
        let b_vault = state.create_vault(b, Address([9; 32]), 0);
        state.credit_vault(&a, Depositor::Module, usd(), 5).unwrap();
        state.credit_vault(&a, Depositor::Module, usd(), 5).unwrap();
        state.set_slot(policy, a, 7);
        state.extend_accumulated(a, [policy]);
        state.config_mut().set_snapshot_interval(1);
        // One copy of the vault covers both credits.
        assert_eq!(state.pending_undo(), 8);

        assert_eq!(state.rollback_frame(mark), 8);
        assert!(!state.has_vault(&b));
        assert_eq!(state.entity_of_vault(&b_vault), None);
        assert_eq!(state.vault(&a).unwrap().total_deposited(&usd()), 10);
        assert_eq!(state.revenue_received(&a, &usd()), 10);
        assert_eq!(state.slot(&policy, &a), 0);
        assert!(state.accumulated_of(&a).is_empty());
        assert_ne!(state.config().snapshot_interval_secs(), 1);
        assert_eq!(state.pending_undo(), 0);
    }

    #[test]
    fn nested_rollback_keeps_outer_changes() {
        let mut state = state();
        let a = EntityId([1; 32]);
        let policy = PolicyId([3; 32]);
        state.create_vault(a, Address([9; 32]), 0);

        state.open_frame();
        state.set_slot(policy, a, 1);
        let inner = state.open_frame();
        state.set_slot(policy, a, 2);
        state.credit_vault(&a, Depositor::Module, usd(), 5).unwrap();
        state.rollback_frame(inner);
        assert_eq!(state.slot(&policy, &a), 1);
        assert_eq!(state.revenue_received(&a, &usd()), 0);
        state.commit_frame();

        assert_eq!(state.slot(&policy, &a), 1);
        assert_eq!(state.pending_undo(), 0);
    }

    #[test]
    fn nothing_is_recorded_outside_frames() {
        let mut state = state();
        let a = EntityId([1; 32]);
        state.create_vault(a, Address([9; 32]), 0);
        state.credit_vault(&a, Depositor::Module, usd(), 5).unwrap();
        assert_eq!(state.pending_undo(), 0);
    }
}
