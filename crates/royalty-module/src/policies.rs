//! Standard distribution policies.
//!
//! - [`FixedRatePolicy`]: whitelisted, collects exactly the link percent and
//!   keeps a per-entity royalty stack in its policy slots.
//! - [`ScaledExternalPolicy`]: math-only policy for external registration;
//!   collects a basis-point fraction of the link percent.

use royalty_core::constants::{BPS_PRECISION, SHARE_SUPPLY};
use royalty_core::error::{PolicyError, RoyaltyError};
use royalty_core::policy::{DistributionPolicy, PolicyHost};
use royalty_core::types::{Address, EntityId, PolicyId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedRatePolicy {
    id: PolicyId,
    collection: Address,
}

impl FixedRatePolicy {
    pub fn new(id: PolicyId, collection: Address) -> Self {
        Self { id, collection }
    }

    /// Policy whose id and collection address both derive from `label`.
    pub fn from_label(label: &str) -> Self {
        Self::new(PolicyId::from_label(label), Address::from_label(label))
    }
}

impl DistributionPolicy for FixedRatePolicy {
    fn id(&self) -> PolicyId {
        self.id
    }

    fn collection_address(&self) -> Address {
        self.collection
    }

    fn shares_required_to_link(&self, _parent: &EntityId, percent: u64) -> Result<u64, PolicyError> {
        Ok(percent.min(SHARE_SUPPLY))
    }

    /// Refuse a grant that would push the entity's stack past the supply.
    fn on_grant(
        &self,
        host: &dyn PolicyHost,
        entity: &EntityId,
        percent: u64,
        _data: &[u8],
    ) -> Result<(), RoyaltyError> {
        let stack = host.policy_slot(entity).saturating_add(percent);
        if stack > SHARE_SUPPLY {
            return Err(PolicyError::StackExceeded {
                stack,
                max: SHARE_SUPPLY,
            }
            .into());
        }
        Ok(())
    }

    /// The new entity's stack: for every parent linked through this policy,
    /// the parent's stack plus the link percent.
    fn on_link(
        &self,
        host: &dyn PolicyHost,
        entity: &EntityId,
        parents: &[EntityId],
        parent_policies: &[PolicyId],
        percents: &[u64],
        _data: &[u8],
    ) -> Result<(), RoyaltyError> {
        let mut stack: u64 = 0;
        for ((parent, policy), percent) in parents.iter().zip(parent_policies).zip(percents) {
            if *policy != self.id {
                continue;
            }
            stack = stack
                .saturating_add(host.policy_slot(parent))
                .saturating_add(*percent);
        }
        if stack > SHARE_SUPPLY {
            return Err(PolicyError::StackExceeded {
                stack,
                max: SHARE_SUPPLY,
            }
            .into());
        }
        host.set_policy_slot(entity, stack);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaledExternalPolicy {
    id: PolicyId,
    collection: Address,
    bps: u64,
}

impl ScaledExternalPolicy {
    pub fn new(id: PolicyId, collection: Address, bps: u64) -> Self {
        Self { id, collection, bps }
    }

    pub fn from_label(label: &str, bps: u64) -> Self {
        Self::new(PolicyId::from_label(label), Address::from_label(label), bps)
    }

    pub fn bps(&self) -> u64 {
        self.bps
    }
}

impl DistributionPolicy for ScaledExternalPolicy {
    fn id(&self) -> PolicyId {
        self.id
    }

    fn collection_address(&self) -> Address {
        self.collection
    }

    fn shares_required_to_link(&self, _parent: &EntityId, percent: u64) -> Result<u64, PolicyError> {
        let scaled = percent as u128 * self.bps as u128 / BPS_PRECISION as u128;
        Ok(scaled.min(SHARE_SUPPLY as u128) as u64)
    }
}
