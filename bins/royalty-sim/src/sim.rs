//! Replays a [`Script`] against an in-memory module and collects a report.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use royalty_core::clock::{ManualClock, SystemClock};
use royalty_core::config::RoyaltySettings;
use royalty_core::error::RoyaltyError;
use royalty_core::memory::{MemoryDisputes, MemoryGraph, MemoryLedger, MemoryRegistry};
use royalty_core::policy::DistributionPolicy;
use royalty_core::traits::{Clock, TokenLedger};
use royalty_core::types::{Address, EntityId, PolicyId, TokenId};
use royalty_module::{Collaborators, FixedRatePolicy, RoyaltyModule, ScaledExternalPolicy};

use crate::script::{self, Action, HolderRef, Script};

#[derive(Serialize, Debug)]
pub struct StepReport {
    pub step: usize,
    pub action: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

#[derive(Serialize, Debug)]
pub struct VaultReport {
    pub entity: String,
    pub vault: String,
    pub snapshot_id: u64,
    pub accumulated_policies: Vec<String>,
    /// Share holder (label when known, hex otherwise) to balance.
    pub holders: BTreeMap<String, u64>,
    pub revenue_received: BTreeMap<String, u64>,
}

#[derive(Serialize, Debug)]
pub struct Report {
    pub config_version: u64,
    pub clock: u64,
    pub steps: Vec<StepReport>,
    pub failures: usize,
    pub vaults: Vec<VaultReport>,
    /// Account label to token label to balance.
    pub balances: BTreeMap<String, BTreeMap<String, u64>>,
}

pub struct Simulation {
    module: RoyaltyModule,
    settings: RoyaltySettings,
    graph: Arc<MemoryGraph>,
    registry: Arc<MemoryRegistry>,
    disputes: Arc<MemoryDisputes>,
    ledger: Arc<MemoryLedger>,
    clock: Arc<ManualClock>,
    /// Reverse lookups for the report.
    entity_labels: BTreeMap<EntityId, String>,
    policy_labels: BTreeMap<PolicyId, String>,
    policy_collections: BTreeMap<PolicyId, Address>,
    token_labels: BTreeMap<TokenId, String>,
    address_labels: BTreeMap<Address, String>,
}

impl Simulation {
    pub fn new(settings: RoyaltySettings) -> Result<Self> {
        let graph = Arc::new(MemoryGraph::new());
        let registry = Arc::new(MemoryRegistry::new());
        let disputes = Arc::new(MemoryDisputes::new());
        let ledger = Arc::new(MemoryLedger::new());
        let clock = Arc::new(ManualClock::new(SystemClock.now()));
        let env = Collaborators {
            graph: graph.clone(),
            registry: registry.clone(),
            disputes: disputes.clone(),
            ledger: ledger.clone(),
            clock: clock.clone(),
        };
        let module = RoyaltyModule::new(&settings, env).context("building royalty module")?;
        Ok(Self {
            module,
            settings,
            graph,
            registry,
            disputes,
            ledger,
            clock,
            entity_labels: BTreeMap::new(),
            policy_labels: BTreeMap::new(),
            policy_collections: BTreeMap::new(),
            token_labels: BTreeMap::new(),
            address_labels: BTreeMap::new(),
        })
    }

    fn entity(&mut self, label: &str) -> EntityId {
        let id = script::entity(label);
        self.entity_labels.entry(id).or_insert_with(|| label.to_string());
        self.address_labels
            .entry(Address::from(id))
            .or_insert_with(|| label.to_string());
        self.address_labels
            .entry(Address::vault_of(&id))
            .or_insert_with(|| format!("vault:{label}"));
        id
    }

    fn token(&mut self, label: &str) -> TokenId {
        let id = script::token(label);
        self.token_labels.entry(id).or_insert_with(|| label.to_string());
        id
    }

    fn tokens(&mut self, labels: &[String]) -> Vec<TokenId> {
        labels.iter().map(|l| self.token(l)).collect()
    }

    fn holder(&mut self, holder: &HolderRef) -> Address {
        match holder {
            HolderRef::Entity(label) => Address::from(self.entity(label)),
            HolderRef::Vault(label) => {
                let id = self.entity(label);
                Address::vault_of(&id)
            }
            HolderRef::Account(label) => {
                let address = script::account(label);
                self.address_labels.entry(address).or_insert_with(|| label.clone());
                address
            }
            HolderRef::Policy(label) => self
                .policy_collections
                .get(&PolicyId::from_label(label))
                .copied()
                .unwrap_or_else(|| Address::from_label(label)),
        }
    }

    /// Register the script's policies, tokens and collectives.
    pub fn prepare(&mut self, script: &Script) -> Result<()> {
        let admin = self.settings.admin;
        for spec in &script.policies {
            let policy: Arc<dyn DistributionPolicy> = match spec {
                script::PolicySpec::FixedRate {
                    label,
                    collect_into_vault_of,
                } => {
                    let collection = match collect_into_vault_of {
                        Some(owner) => {
                            let id = self.entity(owner);
                            Address::vault_of(&id)
                        }
                        None => Address::from_label(label),
                    };
                    Arc::new(FixedRatePolicy::new(PolicyId::from_label(label), collection))
                }
                script::PolicySpec::ScaledExternal { label, bps } => {
                    Arc::new(ScaledExternalPolicy::from_label(label, *bps))
                }
            };
            self.policy_labels.insert(policy.id(), spec.label().to_string());
            self.policy_collections.insert(policy.id(), policy.collection_address());
            self.address_labels
                .entry(policy.collection_address())
                .or_insert_with(|| format!("policy:{}", spec.label()));
            let registered = match spec {
                script::PolicySpec::FixedRate { .. } => self.module.whitelist_policy(&admin, policy, true),
                script::PolicySpec::ScaledExternal { .. } => self.module.register_external_policy(policy),
            };
            registered.with_context(|| format!("registering policy {}", spec.label()))?;
        }
        for label in &script.tokens {
            let token = self.token(label);
            self.module
                .whitelist_token(&admin, token, true)
                .with_context(|| format!("whitelisting token {label}"))?;
        }
        for collective in &script.collectives {
            let entity = self.entity(&collective.entity);
            let pool = script::account(&collective.pool);
            self.address_labels.insert(pool, collective.pool.clone());
            self.registry.register_collective(entity, pool);
        }
        Ok(())
    }

    /// Run every action. With `strict`, stop at the first failure.
    pub fn run(&mut self, script: &Script, strict: bool) -> Result<Report> {
        self.prepare(script)?;
        let mut steps = Vec::with_capacity(script.actions.len());
        for (step, action) in script.actions.iter().enumerate() {
            let result = self.apply(action);
            let (ok, error, detail) = match result {
                Ok(detail) => (true, None, detail),
                Err(err) => {
                    warn!(step, action = action.name(), error = %err, "action failed");
                    if strict {
                        bail!("step {step} ({}) failed: {err}", action.name());
                    }
                    (false, Some(err.to_string()), None)
                }
            };
            steps.push(StepReport {
                step,
                action: action.name(),
                ok,
                error,
                detail,
            });
        }
        let failures = steps.iter().filter(|s| !s.ok).count();
        info!(steps = steps.len(), failures, "script finished");
        Ok(self.report(steps, failures))
    }

    fn apply(&mut self, action: &Action) -> Result<Option<serde_json::Value>, RoyaltyError> {
        let grant = self.settings.grant_module;
        match action {
            Action::Grant {
                entity,
                policy,
                percent,
            } => {
                let id = self.entity(entity);
                self.module
                    .on_grant_share(&grant, &id, &PolicyId::from_label(policy), *percent, &[])?;
                Ok(None)
            }
            Action::Link { entity, parents } => {
                let child = self.entity(entity);
                let ids: Vec<EntityId> = parents.iter().map(|p| self.entity(&p.parent)).collect();
                let policies: Vec<PolicyId> = parents.iter().map(|p| PolicyId::from_label(&p.policy)).collect();
                let percents: Vec<u64> = parents.iter().map(|p| p.percent).collect();
                let outcome = self.module.on_link(&grant, &child, &ids, &policies, &percents, &[])?;
                self.graph.add_parents(child, &ids);
                Ok(Some(serde_json::json!({
                    "distributed": outcome.total,
                    "remainder": outcome.remainder,
                    "receiver": self.label_of(&outcome.receiver),
                })))
            }
            Action::Mint { token, to, amount } => {
                let token = self.token(token);
                let to = self.holder(to);
                self.ledger.mint(token, to, *amount)?;
                Ok(None)
            }
            Action::Pay {
                from,
                receiver,
                payer_entity,
                token,
                amount,
            } => {
                let from = self.holder(from);
                let receiver = self.entity(receiver);
                let payer = self.entity(payer_entity);
                let token = self.token(token);
                self.module.pay_revenue(&from, &receiver, &payer, &token, *amount)?;
                Ok(None)
            }
            Action::GrantFee {
                from,
                receiver,
                token,
                amount,
            } => {
                let from = self.holder(from);
                let receiver = self.entity(receiver);
                let token = self.token(token);
                self.module.pay_grant_fee(&grant, &receiver, &from, &token, *amount)?;
                Ok(None)
            }
            Action::Advance { secs } => {
                let now = self.clock.advance(*secs);
                Ok(Some(serde_json::json!({ "clock": now })))
            }
            Action::Snapshot { entity } => {
                let id = self.entity(entity);
                let outcome = self.module.vault(&id)?.snapshot()?;
                let recorded: BTreeMap<String, u64> = outcome
                    .recorded
                    .iter()
                    .map(|(t, amount)| (self.token_label(t), *amount))
                    .collect();
                Ok(Some(serde_json::json!({
                    "snapshot_id": outcome.snapshot_id,
                    "recorded": recorded,
                })))
            }
            Action::Claim {
                entity,
                holder,
                tokens,
            } => {
                let id = self.entity(entity);
                let holder = self.holder(holder);
                let tokens = self.tokens(tokens);
                let paid = self.module.vault(&id)?.claim_own_revenue(&holder, &tokens, &holder)?;
                Ok(Some(self.payout_json(&paid)))
            }
            Action::ClaimCollective {
                entity,
                pool,
                tokens,
            } => {
                let id = self.entity(entity);
                let pool = script::account(pool);
                let tokens = self.tokens(tokens);
                let collective = self.settings.collective_module;
                let paid = self
                    .module
                    .vault(&id)?
                    .claim_collective_revenue(&collective, &tokens, &pool)?;
                Ok(Some(self.payout_json(&paid)))
            }
            Action::ClaimAsAncestor {
                ancestor,
                descendant,
                tokens,
            } => {
                let ancestor = self.entity(ancestor);
                let descendant = self.entity(descendant);
                let tokens = self.tokens(tokens);
                let paid = self
                    .module
                    .vault(&ancestor)?
                    .claim_as_ancestor_vault(&tokens, &descendant)?;
                Ok(Some(self.payout_json(&paid)))
            }
            Action::TransferShares {
                entity,
                from,
                to,
                amount,
            } => {
                let id = self.entity(entity);
                let from = self.holder(from);
                let to = self.holder(to);
                self.module.vault(&id)?.transfer_shares(&from, &to, *amount)?;
                Ok(None)
            }
            Action::Dispute { entity } => {
                let id = self.entity(entity);
                self.disputes.tag(id);
                Ok(None)
            }
            Action::Resolve { entity } => {
                let id = self.entity(entity);
                self.disputes.resolve(&id);
                Ok(None)
            }
        }
    }

    fn label_of(&self, address: &Address) -> String {
        self.address_labels
            .get(address)
            .cloned()
            .unwrap_or_else(|| address.to_string())
    }

    fn token_label(&self, token: &TokenId) -> String {
        self.token_labels
            .get(token)
            .cloned()
            .unwrap_or_else(|| token.to_string())
    }

    fn payout_json(&self, paid: &[(TokenId, u64)]) -> serde_json::Value {
        let map: BTreeMap<String, u64> = paid.iter().map(|(t, a)| (self.token_label(t), *a)).collect();
        serde_json::json!({ "paid": map })
    }

    fn report(&self, steps: Vec<StepReport>, failures: usize) -> Report {
        let vaults = self
            .module
            .entities()
            .into_iter()
            .filter_map(|id| self.module.vault_state(&id))
            .map(|vault| {
                let entity = vault.entity();
                let revenue_received = self
                    .token_labels
                    .iter()
                    .map(|(t, label)| (label.clone(), self.module.total_revenue_received(&entity, t)))
                    .filter(|(_, v)| *v > 0)
                    .collect();
                VaultReport {
                    entity: self
                        .entity_labels
                        .get(&entity)
                        .cloned()
                        .unwrap_or_else(|| entity.to_string()),
                    vault: vault.address().to_string(),
                    snapshot_id: vault.current_snapshot_id(),
                    accumulated_policies: self
                        .module
                        .accumulated_policies(&entity)
                        .iter()
                        .map(|p| self.policy_labels.get(p).cloned().unwrap_or_else(|| p.to_string()))
                        .collect(),
                    holders: vault
                        .shares()
                        .holders()
                        .map(|(h, b)| (self.label_of(h), *b))
                        .collect(),
                    revenue_received,
                }
            })
            .collect();

        let mut balances: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        for (address, label) in &self.address_labels {
            for (token, token_label) in &self.token_labels {
                let amount = self.ledger.balance_of(token, address);
                if amount > 0 {
                    balances
                        .entry(label.clone())
                        .or_default()
                        .insert(token_label.clone(), amount);
                }
            }
        }

        Report {
            config_version: self.module.config().version(),
            clock: self.clock.now(),
            steps,
            failures,
            vaults,
            balances,
        }
    }
}
