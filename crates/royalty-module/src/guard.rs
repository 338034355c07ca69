//! Non-reentrant guards per call family.
//!
//! A guard is held for the whole of an entry point, including its outbound
//! calls, so a policy hook or ledger that calls back into the same family
//! (on the same scope) is refused with [`AccessError::ReentrantCall`].
//! Different families may nest: a link hook may pay revenue.

use std::collections::HashSet;

use parking_lot::Mutex;

use royalty_core::error::AccessError;
use royalty_core::types::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallFamily {
    Admin,
    Grant,
    Link,
    Payment,
    Snapshot,
    Claim,
    ShareTransfer,
}

impl CallFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Grant => "grant",
            Self::Link => "link",
            Self::Payment => "payment",
            Self::Snapshot => "snapshot",
            Self::Claim => "claim",
            Self::ShareTransfer => "share transfer",
        }
    }
}

/// What a guard is keyed on: the module as a whole or one entity's vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardScope {
    Module,
    Vault(EntityId),
}

#[derive(Debug, Default)]
pub struct GuardSet {
    active: Mutex<HashSet<(GuardScope, CallFamily)>>,
}

impl GuardSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `family` on `scope`, failing if it is already entered.
    pub fn enter(&self, scope: GuardScope, family: CallFamily) -> Result<GuardToken<'_>, AccessError> {
        if !self.active.lock().insert((scope, family)) {
            return Err(AccessError::ReentrantCall(family.as_str()));
        }
        Ok(GuardToken {
            set: self,
            key: (scope, family),
        })
    }

    pub fn is_active(&self, scope: GuardScope, family: CallFamily) -> bool {
        self.active.lock().contains(&(scope, family))
    }
}

/// Releases its guard on drop.
#[must_use]
pub struct GuardToken<'a> {
    set: &'a GuardSet,
    key: (GuardScope, CallFamily),
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.set.active.lock().remove(&self.key);
    }
}
