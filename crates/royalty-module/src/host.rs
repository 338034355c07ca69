//! The [`PolicyHost`] lent to a policy while its hook runs.

use royalty_core::error::RoyaltyError;
use royalty_core::policy::{DistributionPolicy, PolicyHost};
use royalty_core::types::{Address, EntityId, PolicyId, TokenId};

use crate::module::RoyaltyModule;

/// Scopes slot access to one policy and pays from its collection address.
pub struct ModuleHost<'a> {
    module: &'a RoyaltyModule,
    policy: PolicyId,
    collector: Address,
}

impl<'a> ModuleHost<'a> {
    pub fn new(module: &'a RoyaltyModule, policy: &dyn DistributionPolicy) -> Self {
        Self {
            module,
            policy: policy.id(),
            collector: policy.collection_address(),
        }
    }
}

impl PolicyHost for ModuleHost<'_> {
    fn policy_slot(&self, entity: &EntityId) -> u64 {
        self.module.state.read().slot(&self.policy, entity)
    }

    fn set_policy_slot(&self, entity: &EntityId, value: u64) {
        self.module.state.write().set_slot(self.policy, *entity, value);
    }

    fn pay_revenue(
        &self,
        receiver: &EntityId,
        payer_entity: &EntityId,
        token: &TokenId,
        amount: u64,
    ) -> Result<(), RoyaltyError> {
        self.module
            .pay_revenue(&self.collector, receiver, payer_entity, token, amount)
    }
}
