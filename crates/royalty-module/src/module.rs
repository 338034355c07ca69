//! The distribution orchestrator.
//!
//! [`RoyaltyModule`] owns the versioned configuration, every revenue vault and
//! the per-entity accumulated-policy sets. Each externally callable entry
//! point runs inside [`RoyaltyModule::atomic`]: it takes its call-family
//! guard, checkpoints state, and on failure restores the checkpoint and
//! reverses the ledger transfers it made. Entry points may nest (a policy
//! hook paying revenue during a link); an inner failure only unwinds the
//! inner frame.

use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, error, info, warn};

use royalty_core::config::{GraphLimits, RoyaltyConfig, RoyaltySettings};
use royalty_core::constants::SHARE_SUPPLY;
use royalty_core::error::{
    AccessError, ConfigError, GatingError, GraphError, LedgerError, RoyaltyError, ShareError,
    VaultError,
};
use royalty_core::policy::DistributionPolicy;
use royalty_core::traits::{AncestorGraphOracle, Clock, DisputeOracle, EntityRegistry, TokenLedger};
use royalty_core::types::{Address, EntityId, PolicyId, TokenId};
use royalty_vault::RevenueVault;

use crate::guard::{CallFamily, GuardScope, GuardSet};
use crate::handle::VaultHandle;
use crate::host::ModuleHost;
use crate::journal::{Journal, TransferRecord};
use crate::propagation::{self, LinkOutcome};
use crate::state::{Depositor, ModuleState};

/// The external systems the module consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub graph: Arc<dyn AncestorGraphOracle>,
    pub registry: Arc<dyn EntityRegistry>,
    pub disputes: Arc<dyn DisputeOracle>,
    pub ledger: Arc<dyn TokenLedger>,
    pub clock: Arc<dyn Clock>,
}

pub struct RoyaltyModule {
    pub(crate) state: RwLock<ModuleState>,
    journal: Mutex<Journal<TransferRecord>>,
    guards: GuardSet,
    /// Serializes top-level calls across threads; re-entered by nested calls
    /// on the same thread.
    exec: ReentrantMutex<()>,
    pub(crate) env: Collaborators,
}

impl RoyaltyModule {
    pub fn new(settings: &RoyaltySettings, env: Collaborators) -> Result<Self, RoyaltyError> {
        let config = RoyaltyConfig::from_settings(settings)?;
        info!(
            module = %config.module().short(),
            version = config.version(),
            "royalty module configured"
        );
        Ok(Self {
            state: RwLock::new(ModuleState::new(config)),
            journal: Mutex::new(Journal::default()),
            guards: GuardSet::new(),
            exec: ReentrantMutex::new(()),
            env,
        })
    }

    /// Run `f` as one all-or-nothing call holding the given guards.
    ///
    /// On failure the state changes and ledger transfers made since the
    /// frame opened are undone, newest first. If a transfer cannot be
    /// reversed the call fails with [`LedgerError::RollbackIncomplete`]
    /// instead of the original error.
    pub(crate) fn atomic<T>(
        &self,
        op: &'static str,
        guards: &[(GuardScope, CallFamily)],
        f: impl FnOnce() -> Result<T, RoyaltyError>,
    ) -> Result<T, RoyaltyError> {
        let _exec = self.exec.lock();
        let mut held = Vec::with_capacity(guards.len());
        for (scope, family) in guards {
            held.push(self.guards.enter(*scope, *family)?);
        }

        let state_mark = self.state.write().open_frame();
        let mark = self.journal.lock().open();
        match f() {
            Ok(value) => {
                self.state.write().commit_frame();
                self.journal.lock().commit();
                Ok(value)
            }
            Err(err) => {
                let restored = self.state.write().rollback_frame(state_mark);
                let undo = self.journal.lock().rollback(mark);
                let reversed = undo.len();
                let mut stuck = None;
                for transfer in undo {
                    let back = transfer.reversed();
                    if let Err(e) =
                        self.env
                            .ledger
                            .transfer(&back.token, &back.from, &back.to, back.amount)
                    {
                        error!(op, token = %back.token.short(), amount = back.amount, error = %e, "failed to reverse transfer");
                        stuck.get_or_insert(LedgerError::RollbackIncomplete {
                            op,
                            cause: err.to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
                warn!(op, restored, reversed, error = %err, "call rolled back");
                match stuck {
                    Some(incomplete) => Err(incomplete.into()),
                    None => Err(err),
                }
            }
        }
    }

    /// Move revenue tokens through the ledger, journaled for rollback.
    pub(crate) fn move_tokens(
        &self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), RoyaltyError> {
        self.env.ledger.transfer(token, from, to, amount)?;
        self.journal.lock().record(TransferRecord {
            token: *token,
            from: *from,
            to: *to,
            amount,
        });
        Ok(())
    }

    pub(crate) fn now(&self) -> u64 {
        self.env.clock.now()
    }

    fn require_admin(&self, caller: &Address) -> Result<(), RoyaltyError> {
        if *caller != self.state.read().config().admin() {
            return Err(AccessError::Unauthorized(format!("{} is not the admin", caller.short())).into());
        }
        Ok(())
    }

    fn require_grant_module(&self, caller: &Address) -> Result<(), RoyaltyError> {
        if *caller != self.state.read().config().grant_module() {
            return Err(AccessError::Unauthorized(format!(
                "{} is not the grant module",
                caller.short()
            ))
            .into());
        }
        Ok(())
    }

    /// Where the remainder of a fresh vault's shares goes: the collective
    /// pool for collective entities, the entity itself otherwise.
    fn receiver_of(&self, entity: &EntityId) -> Address {
        if self.env.registry.is_collective(entity) {
            self.env.registry.collective_receiver_of(entity)
        } else {
            Address::from(*entity)
        }
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Add or remove `policy` from the whitelist. Whitelisted policies have
    /// their grant and link hooks invoked.
    pub fn whitelist_policy(
        &self,
        caller: &Address,
        policy: Arc<dyn DistributionPolicy>,
        allowed: bool,
    ) -> Result<(), RoyaltyError> {
        self.atomic("whitelist_policy", &[(GuardScope::Module, CallFamily::Admin)], || {
            self.require_admin(caller)?;
            let id = policy.id();
            if id.is_zero() {
                return Err(ConfigError::InvalidIdentifier("policy id is empty".into()).into());
            }
            let mut state = self.state.write();
            if allowed || !state.has_policy(&id) {
                state.insert_policy(id, Arc::clone(&policy));
            }
            state.config_mut().set_policy_whitelisted(id, allowed);
            info!(policy = %id.short(), allowed, version = state.config().version(), "policy whitelist updated");
            Ok(())
        })
    }

    pub fn whitelist_token(&self, caller: &Address, token: TokenId, allowed: bool) -> Result<(), RoyaltyError> {
        self.atomic("whitelist_token", &[(GuardScope::Module, CallFamily::Admin)], || {
            self.require_admin(caller)?;
            if token.is_zero() {
                return Err(ConfigError::InvalidIdentifier("token id is empty".into()).into());
            }
            let mut state = self.state.write();
            state.config_mut().set_token_whitelisted(token, allowed);
            info!(token = %token.short(), allowed, version = state.config().version(), "token whitelist updated");
            Ok(())
        })
    }

    /// Register a policy that is consulted for share math only.
    ///
    /// Open to anyone. The policy must answer a zero-percent probe.
    pub fn register_external_policy(&self, policy: Arc<dyn DistributionPolicy>) -> Result<(), RoyaltyError> {
        self.atomic(
            "register_external_policy",
            &[(GuardScope::Module, CallFamily::Admin)],
            || {
                let id = policy.id();
                if id.is_zero() {
                    return Err(ConfigError::InvalidIdentifier("policy id is empty".into()).into());
                }
                if self.state.read().config().is_policy_allowed(&id) {
                    return Err(ConfigError::AlreadyRegistered(id.to_string()).into());
                }
                policy
                    .shares_required_to_link(&EntityId::ZERO, 0)
                    .map_err(|e| ConfigError::CapabilityProbeFailed {
                        policy: id.to_string(),
                        reason: e.to_string(),
                    })?;

                let mut state = self.state.write();
                state.insert_policy(id, Arc::clone(&policy));
                state.config_mut().register_external_policy(id);
                info!(policy = %id.short(), "external policy registered");
                Ok(())
            },
        )
    }

    pub fn set_graph_limits(&self, caller: &Address, limits: GraphLimits) -> Result<(), RoyaltyError> {
        self.atomic("set_graph_limits", &[(GuardScope::Module, CallFamily::Admin)], || {
            self.require_admin(caller)?;
            let mut state = self.state.write();
            state.config_mut().set_limits(limits)?;
            info!(
                max_parents = limits.max_parents,
                max_ancestors = limits.max_ancestors,
                max_accumulated = limits.max_accumulated_policies,
                "graph limits updated"
            );
            Ok(())
        })
    }

    pub fn set_snapshot_interval(&self, caller: &Address, secs: u64) -> Result<(), RoyaltyError> {
        self.atomic("set_snapshot_interval", &[(GuardScope::Module, CallFamily::Admin)], || {
            self.require_admin(caller)?;
            self.state.write().config_mut().set_snapshot_interval(secs);
            info!(secs, "snapshot interval updated");
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Grant and link events
    // ------------------------------------------------------------------

    /// A share grant was issued for `entity` under `policy`.
    ///
    /// Creates the vault on first grant, then runs the policy's grant hook
    /// when the policy is whitelisted.
    pub fn on_grant_share(
        &self,
        caller: &Address,
        entity: &EntityId,
        policy: &PolicyId,
        percent: u64,
        data: &[u8],
    ) -> Result<(), RoyaltyError> {
        self.atomic("on_grant_share", &[(GuardScope::Module, CallFamily::Grant)], || {
            self.require_grant_module(caller)?;
            let max = self.state.read().config().limits().max_ancestors;
            let count = self.env.graph.ancestor_count(entity);
            if count >= max {
                return Err(GraphError::AncestorLimitReached { count, max }.into());
            }

            let receiver = self.receiver_of(entity);
            let now = self.now();
            let hook = {
                let mut state = self.state.write();
                if !state.config().is_policy_allowed(policy) {
                    return Err(ConfigError::PolicyNotAllowed(policy.to_string()).into());
                }
                if !state.has_vault(entity) {
                    let vault = state.create_vault(*entity, receiver, now);
                    info!(entity = %entity.short(), vault = %vault.short(), receiver = %receiver.short(), "vault created on grant");
                }
                if state.config().is_policy_whitelisted(policy) {
                    Some(state.policy(policy)?)
                } else {
                    None
                }
            };

            if let Some(implementation) = hook {
                let host = ModuleHost::new(self, implementation.as_ref());
                implementation.on_grant(&host, entity, percent, data)?;
            }
            debug!(entity = %entity.short(), policy = %policy.short(), percent, "grant processed");
            Ok(())
        })
    }

    /// `entity` links to `parents`, each through the policy and percent at
    /// the same position. Creates the vault and propagates shares upward.
    pub fn on_link(
        &self,
        caller: &Address,
        entity: &EntityId,
        parents: &[EntityId],
        policies: &[PolicyId],
        percents: &[u64],
        data: &[u8],
    ) -> Result<LinkOutcome, RoyaltyError> {
        self.atomic("on_link", &[(GuardScope::Module, CallFamily::Link)], || {
            self.require_grant_module(caller)?;
            let limits = {
                let state = self.state.read();
                if state.has_vault(entity) {
                    return Err(VaultError::AlreadyLinked(entity.to_string()).into());
                }
                state.config().limits()
            };
            if parents.is_empty() {
                return Err(GraphError::EmptyParentList.into());
            }
            if parents.len() > limits.max_parents {
                return Err(GraphError::TooManyParents {
                    count: parents.len(),
                    max: limits.max_parents,
                }
                .into());
            }
            if policies.len() != parents.len() || percents.len() != parents.len() {
                return Err(GraphError::LengthMismatch {
                    parents: parents.len(),
                    policies: policies.len(),
                    percents: percents.len(),
                }
                .into());
            }
            if let Some(percent) = percents.iter().find(|p| **p > SHARE_SUPPLY) {
                return Err(ShareError::InvalidPercent(*percent).into());
            }
            let count = self.env.graph.ancestor_count(entity);
            if count > limits.max_ancestors {
                return Err(GraphError::AncestorLimitExceeded {
                    count,
                    max: limits.max_ancestors,
                }
                .into());
            }

            let receiver = self.receiver_of(entity);
            let outcome = propagation::propagate(
                &self.state,
                self.now(),
                entity,
                receiver,
                parents,
                policies,
                percents,
            )?;

            let hooked = {
                let state = self.state.read();
                let mut hooked = Vec::new();
                for id in state.accumulated_of(entity) {
                    if !state.config().is_policy_allowed(&id) {
                        return Err(ConfigError::PolicyNotAllowed(id.to_string()).into());
                    }
                    if state.config().is_policy_whitelisted(&id) {
                        hooked.push(state.policy(&id)?);
                    }
                }
                hooked
            };
            for implementation in hooked {
                let host = ModuleHost::new(self, implementation.as_ref());
                implementation.on_link(&host, entity, parents, policies, percents, data)?;
            }

            info!(
                entity = %entity.short(),
                parents = parents.len(),
                distributed = outcome.total,
                remainder = outcome.remainder,
                "entity linked"
            );
            Ok(outcome)
        })
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Pay `amount` of `token` from `caller` into `receiver`'s vault on
    /// behalf of `payer_entity`.
    pub fn pay_revenue(
        &self,
        caller: &Address,
        receiver: &EntityId,
        payer_entity: &EntityId,
        token: &TokenId,
        amount: u64,
    ) -> Result<(), RoyaltyError> {
        self.atomic("pay_revenue", &[(GuardScope::Module, CallFamily::Payment)], || {
            if self.env.disputes.is_tagged(receiver) {
                return Err(GatingError::EntityTagged(receiver.to_string()).into());
            }
            if self.env.disputes.is_tagged(payer_entity) {
                return Err(GatingError::EntityTagged(payer_entity.to_string()).into());
            }
            self.route_payment(caller, receiver, token, amount)
        })
    }

    /// Grant fee paid by `payer` into `receiver`'s vault. Grant module only;
    /// only the receiver's dispute tag is checked.
    pub fn pay_grant_fee(
        &self,
        caller: &Address,
        receiver: &EntityId,
        payer: &Address,
        token: &TokenId,
        amount: u64,
    ) -> Result<(), RoyaltyError> {
        self.atomic("pay_grant_fee", &[(GuardScope::Module, CallFamily::Payment)], || {
            self.require_grant_module(caller)?;
            if self.env.disputes.is_tagged(receiver) {
                return Err(GatingError::EntityTagged(receiver.to_string()).into());
            }
            self.route_payment(payer, receiver, token, amount)
        })
    }

    fn route_payment(
        &self,
        from: &Address,
        receiver: &EntityId,
        token: &TokenId,
        amount: u64,
    ) -> Result<(), RoyaltyError> {
        let vault = {
            let mut state = self.state.write();
            state.credit_vault(receiver, Depositor::Module, *token, amount)?;
            state.vault(receiver)?.address()
        };
        self.move_tokens(token, from, &vault, amount)?;
        debug!(receiver = %receiver.short(), token = %token.short(), amount, "revenue deposited");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read API
    // ------------------------------------------------------------------

    /// Entry points of `entity`'s vault.
    pub fn vault(&self, entity: &EntityId) -> Result<VaultHandle<'_>, RoyaltyError> {
        let address = self.state.read().vault(entity)?.address();
        Ok(VaultHandle::new(self, *entity, address))
    }

    /// A copy of `entity`'s vault state.
    pub fn vault_state(&self, entity: &EntityId) -> Option<RevenueVault> {
        self.state.read().vault(entity).ok().cloned()
    }

    pub fn has_vault(&self, entity: &EntityId) -> bool {
        self.state.read().has_vault(entity)
    }

    pub fn vault_address(&self, entity: &EntityId) -> Option<Address> {
        self.state.read().vault(entity).ok().map(RevenueVault::address)
    }

    pub fn is_vault(&self, address: &Address) -> bool {
        self.state.read().entity_of_vault(address).is_some()
    }

    pub fn entity_of_vault(&self, address: &Address) -> Option<EntityId> {
        self.state.read().entity_of_vault(address)
    }

    pub fn accumulated_policies(&self, entity: &EntityId) -> Vec<PolicyId> {
        self.state.read().accumulated_of(entity).into_iter().collect()
    }

    pub fn total_revenue_received(&self, entity: &EntityId, token: &TokenId) -> u64 {
        self.state.read().revenue_received(entity, token)
    }

    pub fn policy_slot(&self, policy: &PolicyId, entity: &EntityId) -> u64 {
        self.state.read().slot(policy, entity)
    }

    /// A clone of the current configuration.
    pub fn config(&self) -> RoyaltyConfig {
        self.state.read().config().clone()
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.env
    }

    /// Number of vaults created so far.
    pub fn vault_count(&self) -> usize {
        self.state.read().vault_count()
    }

    pub fn entities(&self) -> Vec<EntityId> {
        self.state.read().vaults().map(|(entity, _)| *entity).collect()
    }
}
