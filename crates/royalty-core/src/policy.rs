//! The pluggable distribution-policy surface.
//!
//! A policy supplies the "shares required to link" math and, when it is fully
//! whitelisted, receives grant and link hooks. An externally registered policy
//! is consulted for its share math only; its hooks are never invoked, so the
//! defaults here are no-ops.

use crate::error::{PolicyError, RoyaltyError};
use crate::types::{Address, EntityId, PolicyId, TokenId};

/// Capabilities the module lends to a policy while one of its hooks runs.
///
/// Slots are durable per-(policy, entity) integers stored inside the module's
/// state, so they roll back together with the call that wrote them.
pub trait PolicyHost {
    /// Read this policy's slot for `entity` (0 if never written).
    fn policy_slot(&self, entity: &EntityId) -> u64;

    /// Overwrite this policy's slot for `entity`.
    fn set_policy_slot(&self, entity: &EntityId, value: u64);

    /// Pay revenue into `receiver`'s vault from this policy's collection address.
    fn pay_revenue(
        &self,
        receiver: &EntityId,
        payer_entity: &EntityId,
        token: &TokenId,
        amount: u64,
    ) -> Result<(), RoyaltyError>;
}

pub trait DistributionPolicy: Send + Sync {
    fn id(&self) -> PolicyId;

    /// Where share units owed to this policy are sent during propagation.
    fn collection_address(&self) -> Address;

    /// Share units the child must hand to this policy when it links to
    /// `parent` with `percent` (0 when the policy only rides along from an
    /// earlier generation).
    ///
    /// Must be deterministic and side-effect free.
    fn shares_required_to_link(&self, parent: &EntityId, percent: u64)
        -> Result<u64, PolicyError>;

    fn on_grant(
        &self,
        _host: &dyn PolicyHost,
        _entity: &EntityId,
        _percent: u64,
        _data: &[u8],
    ) -> Result<(), RoyaltyError> {
        Ok(())
    }

    fn on_link(
        &self,
        _host: &dyn PolicyHost,
        _entity: &EntityId,
        _parents: &[EntityId],
        _parent_policies: &[PolicyId],
        _percents: &[u64],
        _data: &[u8],
    ) -> Result<(), RoyaltyError> {
        Ok(())
    }
}
