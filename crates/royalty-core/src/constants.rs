//! Protocol constants. Share amounts are in share units (1 share = 10^6 units).

/// Total share supply minted into every vault: 100.000000%.
pub const SHARE_SUPPLY: u64 = 100_000_000;

/// Decimal places of the share unit.
pub const SHARE_DECIMALS: u32 = 6;

/// One whole percent expressed in share units.
pub const ONE_PERCENT: u64 = SHARE_SUPPLY / 100;

pub const BPS_PRECISION: u64 = 10_000;

/// Default maximum number of parents in a single link.
pub const DEFAULT_MAX_PARENTS: usize = 16;

/// Default maximum ancestor count reported by the graph oracle.
pub const DEFAULT_MAX_ANCESTORS: u64 = 1024;

/// Default maximum size of an entity's accumulated-policy set.
pub const DEFAULT_MAX_ACCUMULATED_POLICIES: usize = 14;

/// Default minimum spacing between two vault snapshots (7 days).
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// BLAKE3 key-derivation context for vault addresses.
pub const VAULT_ADDRESS_CONTEXT: &str = "royalty 2024-06-01 revenue vault address";

/// Labels hashed into the default privileged addresses.
pub const MODULE_LABEL: &str = "royalty-module";
pub const ADMIN_LABEL: &str = "royalty-admin";
pub const GRANT_MODULE_LABEL: &str = "royalty-grant-module";
pub const COLLECTIVE_MODULE_LABEL: &str = "royalty-collective-module";

/// Prefix for environment-variable overrides of [`RoyaltySettings`](crate::config::RoyaltySettings).
pub const ENV_PREFIX: &str = "ROYALTY";
