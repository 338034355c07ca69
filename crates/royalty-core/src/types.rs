//! Identifier types: entities, tokens, policies and share/revenue holders.
//!
//! Every identifier is 32 opaque bytes. The all-zero value is the empty
//! identifier and is rejected wherever a real one is required. Identifiers
//! render as lowercase hex and serialize as hex strings so they can be
//! written by hand in settings files.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::VAULT_ADDRESS_CONTEXT;
use crate::error::ConfigError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// The empty identifier (32 zero bytes).
            pub const ZERO: Self = Self([0u8; 32]);

            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Deterministic identifier for a human-readable label (BLAKE3 of the label).
            pub fn from_label(label: &str) -> Self {
                Self(*blake3::hash(label.as_bytes()).as_bytes())
            }

            /// Parse a 64-character hex string, with or without a `0x` prefix.
            pub fn from_hex(s: &str) -> Result<Self, ConfigError> {
                let trimmed = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(trimmed)
                    .map_err(|e| ConfigError::InvalidIdentifier(format!("{s}: {e}")))?;
                let arr: [u8; 32] = bytes.try_into().map_err(|_| {
                    ConfigError::InvalidIdentifier(format!("{s}: expected 32 bytes"))
                })?;
                Ok(Self(arr))
            }

            /// First four bytes in hex, for log lines.
            pub fn short(&self) -> String {
                hex::encode(&self.0[..4])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.short())
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_id!(
    /// A registered creative-work entity.
    EntityId
);

define_id!(
    /// A whitelisted revenue token (the currency revenue is paid in).
    TokenId
);

define_id!(
    /// A distribution policy.
    PolicyId
);

define_id!(
    /// Anything that can hold shares or revenue tokens: an entity, a vault,
    /// a policy collection address, a collective pool or a plain account.
    Address
);

impl Address {
    /// The address of the revenue vault belonging to `entity`.
    ///
    /// Derived with a dedicated BLAKE3 context so a vault address never
    /// equals the entity's own address.
    pub fn vault_of(entity: &EntityId) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(VAULT_ADDRESS_CONTEXT);
        hasher.update(entity.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

impl From<EntityId> for Address {
    fn from(entity: EntityId) -> Self {
        Self(entity.0)
    }
}

/// One parent edge of a link: the parent, the policy of the license used and
/// the share of the child's future revenue that license grants.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParentLink {
    pub parent: EntityId,
    pub policy: PolicyId,
    /// Share units out of [`SHARE_SUPPLY`](crate::constants::SHARE_SUPPLY).
    pub percent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_empty() {
        assert!(EntityId::ZERO.is_zero());
        assert!(!EntityId([1; 32]).is_zero());
        assert_eq!(TokenId::default(), TokenId::ZERO);
    }

    #[test]
    fn display_is_full_hex() {
        let id = PolicyId([0xAB; 32]);
        assert_eq!(id.to_string(), "ab".repeat(32));
        assert_eq!(id.short(), "abababab");
        assert_eq!(format!("{id:?}"), "PolicyId(abababab)");
    }

    #[test]
    fn hex_parse_accepts_prefix() {
        let id = EntityId([0x11; 32]);
        let text = format!("0x{id}");
        assert_eq!(EntityId::from_hex(&text).unwrap(), id);
        assert_eq!(text[2..].parse::<EntityId>().unwrap(), id);
    }

    #[test]
    fn hex_parse_rejects_wrong_length() {
        let err = Address::from_hex("abcd").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentifier(_)));
        assert!(Address::from_hex("zz").is_err());
    }

    #[test]
    fn labels_are_deterministic() {
        assert_eq!(EntityId::from_label("alice"), EntityId::from_label("alice"));
        assert_ne!(EntityId::from_label("alice"), EntityId::from_label("bob"));
    }

    #[test]
    fn vault_address_differs_from_entity_address() {
        let entity = EntityId([7; 32]);
        let vault = Address::vault_of(&entity);
        assert_ne!(vault, Address::from(entity));
        assert_eq!(vault, Address::vault_of(&entity));
        assert_ne!(vault, Address::vault_of(&EntityId([8; 32])));
    }

    #[test]
    fn serde_uses_hex_strings() {
        let token = TokenId([0x0F; 32]);
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{}\"", "0f".repeat(32)));
        let back: TokenId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
