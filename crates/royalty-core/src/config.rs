//! Settings and the versioned runtime configuration.
//!
//! [`RoyaltySettings`] is the file-loadable part: graph limits, snapshot
//! spacing, privileged addresses and the initial token whitelist. It can be
//! built programmatically or loaded with [`RoyaltySettings::load`] from a
//! TOML/JSON/YAML file layered with `ROYALTY__*` environment variables.
//!
//! [`RoyaltyConfig`] is what the module owns at runtime. Every admin mutation
//! bumps its `version`, so a caller holding a clone can tell it is stale.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ADMIN_LABEL, COLLECTIVE_MODULE_LABEL, DEFAULT_MAX_ACCUMULATED_POLICIES,
    DEFAULT_MAX_ANCESTORS, DEFAULT_MAX_PARENTS, DEFAULT_SNAPSHOT_INTERVAL_SECS, ENV_PREFIX,
    GRANT_MODULE_LABEL, MODULE_LABEL,
};
use crate::error::ConfigError;
use crate::types::{Address, PolicyId, TokenId};

/// Structural bounds on the derivation graph, bounding per-call cost.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct GraphLimits {
    pub max_parents: usize,
    pub max_ancestors: u64,
    pub max_accumulated_policies: usize,
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self {
            max_parents: DEFAULT_MAX_PARENTS,
            max_ancestors: DEFAULT_MAX_ANCESTORS,
            max_accumulated_policies: DEFAULT_MAX_ACCUMULATED_POLICIES,
        }
    }
}

impl GraphLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parents == 0 {
            return Err(ConfigError::InvalidLimit("max_parents must be positive".into()));
        }
        if self.max_ancestors == 0 {
            return Err(ConfigError::InvalidLimit("max_ancestors must be positive".into()));
        }
        if self.max_accumulated_policies == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_accumulated_policies must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// File-loadable module settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct RoyaltySettings {
    /// The orchestrator's own address; holds a freshly linked vault's shares
    /// until propagation hands them out.
    pub module: Address,
    /// Admin role: whitelists and limits.
    pub admin: Address,
    /// The only caller allowed to grant shares, link entities and pay grant fees.
    pub grant_module: Address,
    /// The only caller allowed to claim on behalf of collective pools.
    pub collective_module: Address,
    pub limits: GraphLimits,
    pub snapshot_interval_secs: u64,
    pub whitelisted_tokens: Vec<TokenId>,
}

impl Default for RoyaltySettings {
    fn default() -> Self {
        Self {
            module: Address::from_label(MODULE_LABEL),
            admin: Address::from_label(ADMIN_LABEL),
            grant_module: Address::from_label(GRANT_MODULE_LABEL),
            collective_module: Address::from_label(COLLECTIVE_MODULE_LABEL),
            limits: GraphLimits::default(),
            snapshot_interval_secs: DEFAULT_SNAPSHOT_INTERVAL_SECS,
            whitelisted_tokens: Vec::new(),
        }
    }
}

impl RoyaltySettings {
    /// Load settings from an optional file, then apply `ROYALTY__*` overrides
    /// (e.g. `ROYALTY__LIMITS__MAX_PARENTS=8`). Missing keys keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let settings: Self = builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| ConfigError::Settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, addr) in [
            ("module", &self.module),
            ("admin", &self.admin),
            ("grant_module", &self.grant_module),
            ("collective_module", &self.collective_module),
        ] {
            if addr.is_zero() {
                return Err(ConfigError::InvalidIdentifier(format!("{name} address is empty")));
            }
        }
        if let Some(token) = self.whitelisted_tokens.iter().find(|t| t.is_zero()) {
            return Err(ConfigError::InvalidIdentifier(format!("whitelisted token {token}")));
        }
        self.limits.validate()
    }
}

/// Runtime configuration owned by the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoyaltyConfig {
    version: u64,
    module: Address,
    admin: Address,
    grant_module: Address,
    collective_module: Address,
    limits: GraphLimits,
    snapshot_interval_secs: u64,
    whitelisted_policies: BTreeSet<PolicyId>,
    whitelisted_tokens: BTreeSet<TokenId>,
    external_policies: BTreeSet<PolicyId>,
}

impl RoyaltyConfig {
    pub fn from_settings(settings: &RoyaltySettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            version: 1,
            module: settings.module,
            admin: settings.admin,
            grant_module: settings.grant_module,
            collective_module: settings.collective_module,
            limits: settings.limits,
            snapshot_interval_secs: settings.snapshot_interval_secs,
            whitelisted_policies: BTreeSet::new(),
            whitelisted_tokens: settings.whitelisted_tokens.iter().copied().collect(),
            external_policies: BTreeSet::new(),
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn module(&self) -> Address {
        self.module
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn grant_module(&self) -> Address {
        self.grant_module
    }

    pub fn collective_module(&self) -> Address {
        self.collective_module
    }

    pub fn limits(&self) -> GraphLimits {
        self.limits
    }

    pub fn snapshot_interval_secs(&self) -> u64 {
        self.snapshot_interval_secs
    }

    pub fn is_policy_whitelisted(&self, policy: &PolicyId) -> bool {
        self.whitelisted_policies.contains(policy)
    }

    pub fn is_external_policy(&self, policy: &PolicyId) -> bool {
        self.external_policies.contains(policy)
    }

    /// Whitelisted or externally registered.
    pub fn is_policy_allowed(&self, policy: &PolicyId) -> bool {
        self.is_policy_whitelisted(policy) || self.is_external_policy(policy)
    }

    pub fn is_token_whitelisted(&self, token: &TokenId) -> bool {
        self.whitelisted_tokens.contains(token)
    }

    pub fn whitelisted_tokens(&self) -> impl Iterator<Item = &TokenId> {
        self.whitelisted_tokens.iter()
    }

    pub fn set_policy_whitelisted(&mut self, policy: PolicyId, allowed: bool) {
        if allowed {
            self.whitelisted_policies.insert(policy);
        } else {
            self.whitelisted_policies.remove(&policy);
        }
        self.version += 1;
    }

    pub fn set_token_whitelisted(&mut self, token: TokenId, allowed: bool) {
        if allowed {
            self.whitelisted_tokens.insert(token);
        } else {
            self.whitelisted_tokens.remove(&token);
        }
        self.version += 1;
    }

    pub fn register_external_policy(&mut self, policy: PolicyId) {
        self.external_policies.insert(policy);
        self.version += 1;
    }

    pub fn set_limits(&mut self, limits: GraphLimits) -> Result<(), ConfigError> {
        limits.validate()?;
        self.limits = limits;
        self.version += 1;
        Ok(())
    }

    pub fn set_snapshot_interval(&mut self, secs: u64) {
        self.snapshot_interval_secs = secs;
        self.version += 1;
    }
}
