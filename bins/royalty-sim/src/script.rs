//! Script format.
//!
//! Everything is named by label; labels are hashed into identifiers with
//! `from_label`, so the same label always names the same entity, token,
//! policy or account.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use royalty_core::types::{Address, EntityId, TokenId};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Script {
    pub policies: Vec<PolicySpec>,
    /// Token labels to whitelist on top of the settings.
    pub tokens: Vec<String>,
    pub collectives: Vec<CollectiveSpec>,
    pub actions: Vec<Action>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing script {}", path.display()))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicySpec {
    /// Whitelisted fixed-rate policy. Collects into its own label address,
    /// or into the vault of `collect_into_vault_of` when set.
    FixedRate {
        label: String,
        #[serde(default)]
        collect_into_vault_of: Option<String>,
    },
    /// Externally registered policy scaling link percents by `bps`.
    ScaledExternal { label: String, bps: u64 },
}

impl PolicySpec {
    pub fn label(&self) -> &str {
        match self {
            Self::FixedRate { label, .. } | Self::ScaledExternal { label, .. } => label,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CollectiveSpec {
    pub entity: String,
    pub pool: String,
}

/// A share holder or token account.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum HolderRef {
    /// The entity's own address.
    Entity(String),
    /// A plain account.
    Account(String),
    /// A policy's collection address.
    Policy(String),
    /// The vault address of an entity.
    Vault(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LinkSpec {
    pub parent: String,
    pub policy: String,
    pub percent: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Grant {
        entity: String,
        policy: String,
        #[serde(default)]
        percent: u64,
    },
    Link {
        entity: String,
        parents: Vec<LinkSpec>,
    },
    Mint {
        token: String,
        to: HolderRef,
        amount: u64,
    },
    Pay {
        from: HolderRef,
        receiver: String,
        payer_entity: String,
        token: String,
        amount: u64,
    },
    GrantFee {
        from: HolderRef,
        receiver: String,
        token: String,
        amount: u64,
    },
    Advance {
        secs: u64,
    },
    Snapshot {
        entity: String,
    },
    Claim {
        entity: String,
        holder: HolderRef,
        tokens: Vec<String>,
    },
    ClaimCollective {
        entity: String,
        pool: String,
        tokens: Vec<String>,
    },
    ClaimAsAncestor {
        ancestor: String,
        descendant: String,
        tokens: Vec<String>,
    },
    TransferShares {
        entity: String,
        from: HolderRef,
        to: HolderRef,
        amount: u64,
    },
    Dispute {
        entity: String,
    },
    Resolve {
        entity: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Grant { .. } => "grant",
            Self::Link { .. } => "link",
            Self::Mint { .. } => "mint",
            Self::Pay { .. } => "pay",
            Self::GrantFee { .. } => "grant_fee",
            Self::Advance { .. } => "advance",
            Self::Snapshot { .. } => "snapshot",
            Self::Claim { .. } => "claim",
            Self::ClaimCollective { .. } => "claim_collective",
            Self::ClaimAsAncestor { .. } => "claim_as_ancestor",
            Self::TransferShares { .. } => "transfer_shares",
            Self::Dispute { .. } => "dispute",
            Self::Resolve { .. } => "resolve",
        }
    }
}

pub fn entity(label: &str) -> EntityId {
    EntityId::from_label(label)
}

pub fn token(label: &str) -> TokenId {
    TokenId::from_label(label)
}

pub fn account(label: &str) -> Address {
    Address::from_label(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_tagged_actions() {
        let raw = r#"{
            "policies": [
                {"kind": "fixed_rate", "label": "lap"},
                {"kind": "scaled_external", "label": "ext", "bps": 5000}
            ],
            "tokens": ["usd"],
            "actions": [
                {"action": "grant", "entity": "A", "policy": "lap"},
                {"action": "link", "entity": "B", "parents": [{"parent": "A", "policy": "lap", "percent": 10}]},
                {"action": "claim", "entity": "B", "holder": {"entity": "B"}, "tokens": ["usd"]}
            ]
        }"#;
        let script: Script = serde_json::from_str(raw).unwrap();
        assert_eq!(script.policies.len(), 2);
        assert_eq!(script.policies[1].label(), "ext");
        assert!(script.collectives.is_empty());
        assert_eq!(
            script.actions[0],
            Action::Grant {
                entity: "A".into(),
                policy: "lap".into(),
                percent: 0
            }
        );
        assert_eq!(script.actions[2].name(), "claim");
        match &script.actions[2] {
            Action::Claim { holder, .. } => assert_eq!(*holder, HolderRef::Entity("B".into())),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"actions": [{{"action": "advance", "secs": 60}}]}}"#).unwrap();
        let script = Script::load(file.path()).unwrap();
        assert_eq!(script.actions, vec![Action::Advance { secs: 60 }]);
    }

    #[test]
    fn unknown_action_is_an_error() {
        let raw = r#"{"actions": [{"action": "burn"}]}"#;
        assert!(serde_json::from_str::<Script>(raw).is_err());
    }
}
