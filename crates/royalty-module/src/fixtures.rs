//! Shared unit-test wiring: a module over in-memory collaborators with one
//! whitelisted fixed-rate policy and one registered external policy.

use std::sync::Arc;

use royalty_core::clock::ManualClock;
use royalty_core::config::RoyaltySettings;
use royalty_core::error::PolicyError;
use royalty_core::memory::{MemoryDisputes, MemoryGraph, MemoryLedger, MemoryRegistry};
use royalty_core::policy::DistributionPolicy;
use royalty_core::traits::Clock;
use royalty_core::types::{Address, EntityId, PolicyId, TokenId};

use crate::module::{Collaborators, RoyaltyModule};
use crate::policies::{FixedRatePolicy, ScaledExternalPolicy};

pub const T0: u64 = 1_700_000_000;

pub fn e(seed: u8) -> EntityId {
    EntityId([seed; 32])
}

pub fn a(seed: u8) -> Address {
    Address([seed; 32])
}

pub fn usd() -> TokenId {
    TokenId([0x55; 32])
}

/// Fails every share query, so it cannot pass the registration probe.
pub struct BrokenPolicy;

impl DistributionPolicy for BrokenPolicy {
    fn id(&self) -> PolicyId {
        PolicyId([0xBB; 32])
    }

    fn collection_address(&self) -> Address {
        Address([0xBB; 32])
    }

    fn shares_required_to_link(&self, _parent: &EntityId, _percent: u64) -> Result<u64, PolicyError> {
        Err(PolicyError::Rejected {
            policy: "broken".into(),
            reason: "unsupported".into(),
        })
    }
}

pub struct Fixture {
    pub module: Arc<RoyaltyModule>,
    pub settings: RoyaltySettings,
    pub graph: Arc<MemoryGraph>,
    pub registry: Arc<MemoryRegistry>,
    pub disputes: Arc<MemoryDisputes>,
    pub ledger: Arc<MemoryLedger>,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    pub fn new() -> Self {
        let settings = RoyaltySettings {
            snapshot_interval_secs: 3_600,
            whitelisted_tokens: vec![usd()],
            ..RoyaltySettings::default()
        };
        let graph = Arc::new(MemoryGraph::new());
        let registry = Arc::new(MemoryRegistry::new());
        let disputes = Arc::new(MemoryDisputes::new());
        let ledger = Arc::new(MemoryLedger::new());
        let clock = Arc::new(ManualClock::new(T0));
        let env = Collaborators {
            graph: graph.clone(),
            registry: registry.clone(),
            disputes: disputes.clone(),
            ledger: ledger.clone(),
            clock: clock.clone(),
        };
        let module = Arc::new(RoyaltyModule::new(&settings, env).unwrap());
        let fx = Self {
            module,
            settings,
            graph,
            registry,
            disputes,
            ledger,
            clock,
        };
        fx.module.whitelist_policy(&fx.admin(), fx.lap_policy(), true).unwrap();
        fx.module.register_external_policy(fx.external_policy()).unwrap();
        fx
    }

    pub fn admin(&self) -> Address {
        self.settings.admin
    }

    pub fn grant(&self) -> Address {
        self.settings.grant_module
    }

    pub fn collective(&self) -> Address {
        self.settings.collective_module
    }

    pub fn clock_now(&self) -> u64 {
        self.clock.now()
    }

    pub fn lap_policy(&self) -> Arc<dyn DistributionPolicy> {
        Arc::new(FixedRatePolicy::from_label("fixed-rate"))
    }

    pub fn lap(&self) -> PolicyId {
        self.lap_policy().id()
    }

    /// Collects half of the link percent.
    pub fn external_policy(&self) -> Arc<dyn DistributionPolicy> {
        Arc::new(ScaledExternalPolicy::from_label("scaled-external", 5_000))
    }

    pub fn external(&self) -> PolicyId {
        self.external_policy().id()
    }

    /// Not registered by default.
    pub fn second_external_policy(&self) -> Arc<dyn DistributionPolicy> {
        Arc::new(ScaledExternalPolicy::from_label("second-external", 10_000))
    }

    pub fn second_external(&self) -> PolicyId {
        self.second_external_policy().id()
    }

    /// Give `entity` a vault through a zero-percent grant.
    pub fn root(&self, entity: EntityId) {
        self.module
            .on_grant_share(&self.grant(), &entity, &self.lap(), 0, &[])
            .unwrap();
    }
}
