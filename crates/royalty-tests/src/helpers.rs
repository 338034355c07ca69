//! Shared helpers for integration tests.

use std::sync::Arc;

use royalty_core::clock::ManualClock;
use royalty_core::config::RoyaltySettings;
use royalty_core::constants::SHARE_SUPPLY;
use royalty_core::error::RoyaltyError;
use royalty_core::memory::{MemoryDisputes, MemoryGraph, MemoryLedger, MemoryRegistry};
use royalty_core::policy::DistributionPolicy;
use royalty_core::traits::TokenLedger;
use royalty_core::types::{Address, EntityId, PolicyId, TokenId};
use royalty_module::{Collaborators, FixedRatePolicy, LinkOutcome, RoyaltyModule};

pub const T0: u64 = 1_700_000_000;
pub const DAY: u64 = 24 * 60 * 60;

pub fn entity(label: &str) -> EntityId {
    EntityId::from_label(label)
}

pub fn holder(seed: u8) -> Address {
    Address([seed; 32])
}

pub fn usd() -> TokenId {
    TokenId::from_label("usd")
}

pub fn eur() -> TokenId {
    TokenId::from_label("eur")
}

/// Address revenue is paid from in [`Harness::pay`].
pub fn payer() -> Address {
    Address::from_label("payer")
}

/// A module over in-memory collaborators, a manual clock and a one-day
/// snapshot interval, with `usd` and `eur` whitelisted.
pub struct Harness {
    pub module: Arc<RoyaltyModule>,
    pub settings: RoyaltySettings,
    pub graph: Arc<MemoryGraph>,
    pub registry: Arc<MemoryRegistry>,
    pub disputes: Arc<MemoryDisputes>,
    pub ledger: Arc<MemoryLedger>,
    pub clock: Arc<ManualClock>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(RoyaltySettings {
            snapshot_interval_secs: DAY,
            whitelisted_tokens: vec![usd(), eur()],
            ..RoyaltySettings::default()
        })
    }

    pub fn with_settings(settings: RoyaltySettings) -> Self {
        Self::with_ledger(settings, Arc::new(MemoryLedger::new()))
    }

    /// Share `ledger` with the caller, e.g. to pre-fund addresses.
    pub fn with_ledger(settings: RoyaltySettings, ledger: Arc<MemoryLedger>) -> Self {
        Self::with_token_ledger(settings, ledger.clone(), ledger)
    }

    /// Wire the module to an arbitrary ledger implementation (e.g. one that
    /// wraps `backing` to misbehave); `backing` is kept for balance checks.
    pub fn with_token_ledger(
        settings: RoyaltySettings,
        ledger: Arc<dyn TokenLedger>,
        backing: Arc<MemoryLedger>,
    ) -> Self {
        let graph = Arc::new(MemoryGraph::new());
        let registry = Arc::new(MemoryRegistry::new());
        let disputes = Arc::new(MemoryDisputes::new());
        let clock = Arc::new(ManualClock::new(T0));
        let env = Collaborators {
            graph: graph.clone(),
            registry: registry.clone(),
            disputes: disputes.clone(),
            ledger,
            clock: clock.clone(),
        };
        let module = Arc::new(RoyaltyModule::new(&settings, env).expect("valid settings"));
        Self {
            module,
            settings,
            graph,
            registry,
            disputes,
            ledger: backing,
            clock,
        }
    }

    pub fn admin(&self) -> Address {
        self.settings.admin
    }

    pub fn grant_module(&self) -> Address {
        self.settings.grant_module
    }

    pub fn collective_module(&self) -> Address {
        self.settings.collective_module
    }

    /// Whitelist a fixed-rate policy derived from `label` and return its id.
    pub fn fixed_rate(&self, label: &str) -> PolicyId {
        let policy = FixedRatePolicy::from_label(label);
        self.whitelist(Arc::new(policy));
        policy.id()
    }

    pub fn whitelist(&self, policy: Arc<dyn DistributionPolicy>) {
        self.module
            .whitelist_policy(&self.admin(), policy, true)
            .expect("whitelist policy");
    }

    /// Give `entity` a vault through a zero-percent grant under `policy`.
    pub fn root(&self, entity: EntityId, policy: PolicyId) {
        self.module
            .on_grant_share(&self.grant_module(), &entity, &policy, 0, &[])
            .expect("root grant");
    }

    /// Link `child` to `(parent, policy, percent)` triples, recording the
    /// edges in the graph when the link succeeds.
    pub fn link(
        &self,
        child: EntityId,
        links: &[(EntityId, PolicyId, u64)],
    ) -> Result<LinkOutcome, RoyaltyError> {
        let parents: Vec<EntityId> = links.iter().map(|l| l.0).collect();
        let policies: Vec<PolicyId> = links.iter().map(|l| l.1).collect();
        let percents: Vec<u64> = links.iter().map(|l| l.2).collect();
        let outcome = self.module.on_link(
            &self.grant_module(),
            &child,
            &parents,
            &policies,
            &percents,
            &[],
        )?;
        self.graph.add_parents(child, &parents);
        Ok(outcome)
    }

    /// Mint `amount` to [`payer`] and pay it into `receiver`'s vault.
    pub fn pay(&self, receiver: EntityId, token: TokenId, amount: u64) -> Result<(), RoyaltyError> {
        self.ledger.mint(token, payer(), amount)?;
        self.module
            .pay_revenue(&payer(), &receiver, &entity("payer-entity"), &token, amount)
    }

    pub fn advance(&self, secs: u64) -> u64 {
        self.clock.advance(secs)
    }

    pub fn balance(&self, token: TokenId, who: &Address) -> u64 {
        self.ledger.balance_of(&token, who)
    }

    /// Every vault's share balances sum to the supply.
    pub fn assert_conserved(&self) {
        for entity in self.module.entities() {
            let vault = self.module.vault_state(&entity).expect("vault exists");
            assert_eq!(
                vault.shares().total(),
                SHARE_SUPPLY,
                "share supply of {entity} not conserved"
            );
        }
    }
}
