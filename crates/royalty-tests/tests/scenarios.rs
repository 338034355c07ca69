//! Reference scenarios: propagation, snapshot claims, ancestor claims and
//! the failure modes that must leave no trace.

use std::sync::Arc;

use royalty_core::constants::{ONE_PERCENT, SHARE_SUPPLY};
use royalty_core::error::{GraphError, PolicyError, RoyaltyError, VaultError};
use royalty_core::policy::DistributionPolicy;
use royalty_core::types::{Address, EntityId, PolicyId};
use royalty_module::FixedRatePolicy;
use royalty_tests::helpers::*;

/// `P` is a root; `Q` collects into `P`'s own vault.
fn parent_with_vault_collector(h: &Harness) -> (EntityId, PolicyId, Address) {
    let p = entity("P");
    let bootstrap = h.fixed_rate("bootstrap");
    h.root(p, bootstrap);
    let p_vault = h.module.vault_address(&p).unwrap();
    let q = FixedRatePolicy::new(PolicyId::from_label("Q"), p_vault);
    h.whitelist(Arc::new(q));
    (p, q.id(), p_vault)
}

#[test]
fn link_propagates_shares() {
    let h = Harness::new();
    let (p, q, q_collection) = parent_with_vault_collector(&h);
    let c = entity("C");

    h.link(c, &[(p, q, 10_000_000)]).unwrap();

    let vault = h.module.vault_state(&c).unwrap();
    assert_eq!(vault.balance_of(&q_collection), 10_000_000);
    assert_eq!(vault.balance_of(&Address::from(c)), 90_000_000);
    assert_eq!(vault.shares().holders().count(), 2);
    assert!(h.module.accumulated_policies(&p).contains(&q));
    assert!(h.module.accumulated_policies(&c).contains(&q));
    h.assert_conserved();
}

#[test]
fn snapshot_splits_pro_rata() {
    let h = Harness::new();
    let (p, q, q_collection) = parent_with_vault_collector(&h);
    let c = entity("C");
    h.link(c, &[(p, q, 10_000_000)]).unwrap();

    h.pay(c, usd(), 100_000).unwrap();
    h.advance(DAY);
    let vault = h.module.vault(&c).unwrap();
    vault.snapshot().unwrap();

    assert_eq!(vault.claimable_revenue(&Address::from(c), &usd()).unwrap(), 90_000);
    assert_eq!(vault.claimable_revenue(&q_collection, &usd()).unwrap(), 10_000);
}

#[test]
fn ancestor_vault_claims_once() {
    let h = Harness::new();
    let (p, q, p_vault) = parent_with_vault_collector(&h);
    let c = entity("C");
    h.link(c, &[(p, q, 10_000_000)]).unwrap();
    h.pay(c, usd(), 100_000).unwrap();
    h.advance(DAY);
    h.module.vault(&c).unwrap().snapshot().unwrap();

    let ancestor = h.module.vault(&p).unwrap();
    let paid = ancestor.claim_as_ancestor_vault(&[usd()], &c).unwrap();
    assert_eq!(paid, vec![(usd(), 10_000)]);
    assert_eq!(h.balance(usd(), &p_vault), 10_000);
    assert_eq!(ancestor.total_deposited(&usd()), 10_000);

    let err = ancestor.claim_as_ancestor_vault(&[usd()], &c).unwrap_err();
    assert!(matches!(err, RoyaltyError::Vault(VaultError::NoClaimableTokens(_))));
    assert_eq!(h.balance(usd(), &p_vault), 10_000);
}

#[test]
fn second_link_is_rejected_without_effect() {
    let h = Harness::new();
    let (p, q, _) = parent_with_vault_collector(&h);
    let other = h.fixed_rate("other");
    let c = entity("C");
    h.link(c, &[(p, q, 10_000_000)]).unwrap();

    let vault_before = h.module.vault_state(&c).unwrap();
    let p_policies = h.module.accumulated_policies(&p);
    let c_policies = h.module.accumulated_policies(&c);
    let version = h.module.config().version();

    let err = h.link(c, &[(p, other, 5_000_000)]).unwrap_err();
    assert!(matches!(err, RoyaltyError::Vault(VaultError::AlreadyLinked(_))));

    assert_eq!(h.module.vault_state(&c).unwrap(), vault_before);
    assert_eq!(h.module.accumulated_policies(&p), p_policies);
    assert_eq!(h.module.accumulated_policies(&c), c_policies);
    assert_eq!(h.module.config().version(), version);
}

#[test]
fn grant_at_ancestor_limit_is_rejected() {
    let h = Harness::new();
    let policy = h.fixed_rate("lap");
    let x = entity("X");
    let max = h.module.config().limits().max_ancestors;
    h.graph.set_ancestor_count(x, max);
    let vaults = h.module.vault_count();

    let err = h
        .module
        .on_grant_share(&h.grant_module(), &x, &policy, ONE_PERCENT, &[])
        .unwrap_err();
    assert_eq!(
        err,
        RoyaltyError::Graph(GraphError::AncestorLimitReached { count: max, max })
    );
    assert!(!h.module.has_vault(&x));
    assert_eq!(h.module.vault_count(), vaults);
}

/// Collects a flat one percent from every child, even when only inherited.
struct FlatPolicy;

impl DistributionPolicy for FlatPolicy {
    fn id(&self) -> PolicyId {
        PolicyId::from_label("flat")
    }

    fn collection_address(&self) -> Address {
        Address::from_label("flat")
    }

    fn shares_required_to_link(&self, _parent: &EntityId, _percent: u64) -> Result<u64, PolicyError> {
        Ok(ONE_PERCENT)
    }
}

#[test]
fn inherited_policies_charge_every_generation() {
    let h = Harness::new();
    h.whitelist(Arc::new(FlatPolicy));
    let flat = FlatPolicy.id();
    let lap = h.fixed_rate("lap");
    let (a, b, c) = (entity("A"), entity("B"), entity("C"));
    h.root(a, flat);

    h.link(b, &[(a, flat, 0)]).unwrap();
    let outcome = h.link(c, &[(b, lap, 5 * ONE_PERCENT)]).unwrap();

    assert_eq!(outcome.total, 6 * ONE_PERCENT);
    let vault = h.module.vault_state(&c).unwrap();
    assert_eq!(vault.balance_of(&FlatPolicy.collection_address()), ONE_PERCENT);
    assert_eq!(vault.balance_of(&FixedRatePolicy::from_label("lap").collection_address()), 5 * ONE_PERCENT);
    assert_eq!(vault.balance_of(&Address::from(c)), 94 * ONE_PERCENT);

    let mut expected = vec![flat, lap];
    expected.sort();
    assert_eq!(h.module.accumulated_policies(&c), expected);
    assert_eq!(h.module.accumulated_policies(&a), vec![flat]);
    h.assert_conserved();
}

#[test]
fn multi_parent_link_pays_each_policy() {
    let h = Harness::new();
    let l1 = h.fixed_rate("l1");
    let l2 = h.fixed_rate("l2");
    let (a, b, c) = (entity("A"), entity("B"), entity("C"));
    h.root(a, l1);
    h.root(b, l2);

    let outcome = h
        .link(c, &[(a, l1, 3 * ONE_PERCENT), (b, l2, 7 * ONE_PERCENT)])
        .unwrap();
    assert_eq!(outcome.total, 10 * ONE_PERCENT);
    assert_eq!(outcome.remainder, 90 * ONE_PERCENT);
    assert_eq!(outcome.moves.len(), 2);

    let vault = h.module.vault_state(&c).unwrap();
    assert_eq!(vault.ancestor_collectors().count(), 2);
    assert_eq!(h.module.policy_slot(&l1, &c), 3 * ONE_PERCENT);
    assert_eq!(h.module.policy_slot(&l2, &c), 7 * ONE_PERCENT);
    assert_eq!(h.graph.parents_of(&c), vec![a, b]);
}

#[test]
fn royalty_stack_accumulates_down_the_chain() {
    let h = Harness::new();
    let lap = h.fixed_rate("lap");
    let chain: Vec<EntityId> = (0..4).map(|i| entity(&format!("gen-{i}"))).collect();
    h.root(chain[0], lap);
    for pair in chain.windows(2) {
        h.link(pair[1], &[(pair[0], lap, 10 * ONE_PERCENT)]).unwrap();
    }
    assert_eq!(h.module.policy_slot(&lap, &chain[3]), 30 * ONE_PERCENT);

    // Each generation pays only its own link percent into the vault split.
    let tip = h.module.vault_state(&chain[3]).unwrap();
    assert_eq!(tip.balance_of(&Address::from(chain[3])), 90 * ONE_PERCENT);
}

#[test]
fn stack_overflow_in_hook_rolls_back_link() {
    let h = Harness::new();
    let lap = h.fixed_rate("lap");
    let (a, b, c) = (entity("A"), entity("B"), entity("C"));
    h.root(a, lap);
    h.link(b, &[(a, lap, 60 * ONE_PERCENT)]).unwrap();

    let err = h.link(c, &[(b, lap, 50 * ONE_PERCENT)]).unwrap_err();
    assert!(matches!(err, RoyaltyError::Policy(PolicyError::StackExceeded { .. })));
    assert!(!h.module.has_vault(&c));
    assert_eq!(h.module.policy_slot(&lap, &c), 0);
    assert!(h.graph.parents_of(&c).is_empty());
}

#[test]
fn full_supply_link_is_allowed() {
    let h = Harness::new();
    let lap = h.fixed_rate("lap");
    let (a, b) = (entity("A"), entity("B"));
    h.root(a, lap);
    let outcome = h.link(b, &[(a, lap, SHARE_SUPPLY)]).unwrap();
    assert_eq!(outcome.remainder, 0);
    h.assert_conserved();
}
