//! Write-time share propagation.
//!
//! When a child links to its parents, every policy accumulated on each
//! parent collects the share units its math asks for, out of the child's
//! freshly minted supply; the rest goes to the child's receiver. Policies
//! ride along transitively: the child inherits every policy of every parent,
//! so later descendants pay them too.
//!
//! The work is split in three phases so the state lock is never held while
//! policy code runs:
//! 1. under the lock: create the vault, extend parent sets, build the plan;
//! 2. unlocked: ask each policy for its share requirement;
//! 3. under the lock: move shares and record the child's accumulated set.
//!
//! The caller's transaction frame undoes phase 1 if 2 or 3 fail.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use royalty_core::constants::SHARE_SUPPLY;
use royalty_core::error::{GraphError, RoyaltyError, ShareError};
use royalty_core::policy::DistributionPolicy;
use royalty_core::types::{Address, EntityId, PolicyId};

use crate::state::ModuleState;

/// Share units moved to one policy's collection address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShareMove {
    pub parent: EntityId,
    pub policy: PolicyId,
    pub collector: Address,
    pub amount: u64,
}

/// Result of a successful link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkOutcome {
    pub vault: Address,
    pub receiver: Address,
    pub moves: Vec<ShareMove>,
    /// Sum of all moves.
    pub total: u64,
    /// `SHARE_SUPPLY - total`, handed to the receiver.
    pub remainder: u64,
}

struct PlanItem {
    parent: EntityId,
    policy: Arc<dyn DistributionPolicy>,
    percent: u64,
}

pub(crate) fn propagate(
    state: &RwLock<ModuleState>,
    now: u64,
    entity: &EntityId,
    receiver: Address,
    parents: &[EntityId],
    link_policies: &[PolicyId],
    link_percents: &[u64],
) -> Result<LinkOutcome, RoyaltyError> {
    // Phase 1.
    let (module, vault, plan) = {
        let mut state = state.write();
        let module = state.config().module();
        let vault = state.create_vault(*entity, module, now);
        for (parent, policy) in parents.iter().zip(link_policies) {
            state.extend_accumulated(*parent, [*policy]);
        }

        let mut plan = Vec::new();
        for (i, parent) in parents.iter().enumerate() {
            for id in state.accumulated_of(parent) {
                let percent = if id == link_policies[i] { link_percents[i] } else { 0 };
                plan.push(PlanItem {
                    parent: *parent,
                    policy: state.policy(&id)?,
                    percent,
                });
            }
        }
        (module, vault, plan)
    };

    // Phase 2.
    let mut moves = Vec::with_capacity(plan.len());
    let mut inherited = BTreeSet::new();
    let mut total: u64 = 0;
    for item in &plan {
        let id = item.policy.id();
        let amount = item.policy.shares_required_to_link(&item.parent, item.percent)?;
        total = total.saturating_add(amount);
        if total > SHARE_SUPPLY {
            return Err(ShareError::ShareSupplyExceeded {
                total,
                supply: SHARE_SUPPLY,
            }
            .into());
        }
        inherited.insert(id);
        moves.push(ShareMove {
            parent: item.parent,
            policy: id,
            collector: item.policy.collection_address(),
            amount,
        });
    }

    // Phase 3.
    let mut state = state.write();
    let max = state.config().limits().max_accumulated_policies;
    let count = state.extend_accumulated(*entity, inherited);
    if count > max {
        return Err(GraphError::TooManyAccumulatedPolicies { count, max }.into());
    }

    let remainder = SHARE_SUPPLY - total;
    let child = state.vault_mut(entity)?;
    for m in &moves {
        child.record_ancestor_collector(m.collector);
        if m.amount > 0 {
            child.transfer_shares(&module, &m.collector, m.amount)?;
        }
    }
    if remainder > 0 {
        child.transfer_shares(&module, &receiver, remainder)?;
    }
    debug!(
        entity = %entity.short(),
        moves = moves.len(),
        total,
        remainder,
        "shares propagated"
    );

    Ok(LinkOutcome {
        vault,
        receiver,
        moves,
        total,
        remainder,
    })
}
