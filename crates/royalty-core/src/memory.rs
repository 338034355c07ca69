//! In-memory collaborators.
//!
//! Stores everything in `HashMap`s behind `parking_lot` locks with no
//! persistence. Suitable for tests and the simulator; a deployment plugs its
//! own registry, dispute service and token ledger in through the traits.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::LedgerError;
use crate::traits::{AncestorGraphOracle, DisputeOracle, EntityRegistry, TokenLedger};
use crate::types::{Address, EntityId, TokenId};

/// Derivation graph built from recorded parent edges.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    parents: RwLock<HashMap<EntityId, Vec<EntityId>>>,
    /// Forced ancestor counts, taking precedence over the edges.
    overrides: RwLock<HashMap<EntityId, u64>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `child` derives from `parents`.
    pub fn add_parents(&self, child: EntityId, parents: &[EntityId]) {
        let mut map = self.parents.write();
        let entry = map.entry(child).or_default();
        for parent in parents {
            if !entry.contains(parent) {
                entry.push(*parent);
            }
        }
    }

    pub fn parents_of(&self, child: &EntityId) -> Vec<EntityId> {
        self.parents.read().get(child).cloned().unwrap_or_default()
    }

    /// Pin the reported ancestor count of `entity` regardless of edges.
    pub fn set_ancestor_count(&self, entity: EntityId, count: u64) {
        self.overrides.write().insert(entity, count);
    }
}

impl AncestorGraphOracle for MemoryGraph {
    fn ancestor_count(&self, entity: &EntityId) -> u64 {
        if let Some(count) = self.overrides.read().get(entity) {
            return *count;
        }
        let parents = self.parents.read();
        let mut seen: HashSet<EntityId> = HashSet::new();
        let mut queue: VecDeque<EntityId> = parents.get(entity).into_iter().flatten().copied().collect();
        while let Some(next) = queue.pop_front() {
            if next == *entity || !seen.insert(next) {
                continue;
            }
            if let Some(grand) = parents.get(&next) {
                queue.extend(grand.iter().copied());
            }
        }
        seen.len() as u64
    }
}

/// Collective entities and their pooled receivers.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    pools: RwLock<HashMap<EntityId, Address>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_collective(&self, entity: EntityId, pool: Address) {
        self.pools.write().insert(entity, pool);
    }
}

impl EntityRegistry for MemoryRegistry {
    fn is_collective(&self, entity: &EntityId) -> bool {
        self.pools.read().contains_key(entity)
    }

    fn collective_receiver_of(&self, entity: &EntityId) -> Address {
        self.pools.read().get(entity).copied().unwrap_or(Address::ZERO)
    }

    fn is_collective_receiver(&self, address: &Address) -> bool {
        self.pools.read().values().any(|pool| pool == address)
    }
}

/// Dispute tags.
#[derive(Debug, Default)]
pub struct MemoryDisputes {
    tagged: RwLock<HashSet<EntityId>>,
}

impl MemoryDisputes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(&self, entity: EntityId) {
        self.tagged.write().insert(entity);
    }

    pub fn resolve(&self, entity: &EntityId) {
        self.tagged.write().remove(entity);
    }
}

impl DisputeOracle for MemoryDisputes {
    fn is_tagged(&self, entity: &EntityId) -> bool {
        self.tagged.read().contains(entity)
    }
}

/// Token balances keyed by `(token, holder)`.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    balances: RwLock<HashMap<(TokenId, Address), u64>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `token` to `holder` out of thin air.
    pub fn mint(&self, token: TokenId, holder: Address, amount: u64) -> Result<(), LedgerError> {
        let mut balances = self.balances.write();
        let entry = balances.entry((token, holder)).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Sum of all balances of `token`.
    pub fn total_of(&self, token: &TokenId) -> u64 {
        self.balances
            .read()
            .iter()
            .filter(|((t, _), _)| t == token)
            .map(|(_, v)| *v)
            .sum()
    }
}

impl TokenLedger for MemoryLedger {
    fn balance_of(&self, token: &TokenId, holder: &Address) -> u64 {
        self.balances.read().get(&(*token, *holder)).copied().unwrap_or(0)
    }

    fn transfer(
        &self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let mut balances = self.balances.write();
        let have = balances.get(&(*token, *from)).copied().unwrap_or(0);
        if have < amount {
            return Err(LedgerError::InsufficientBalance {
                token: token.short(),
                holder: from.short(),
                have,
                need: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = balances.get(&(*token, *to)).copied().unwrap_or(0);
        let credited = to_balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        balances.insert((*token, *from), have - amount);
        balances.insert((*token, *to), credited);
        debug!(token = %token.short(), from = %from.short(), to = %to.short(), amount, "ledger transfer");
        Ok(())
    }
}
