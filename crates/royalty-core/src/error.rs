//! Error types for royalty share accounting.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid identifier: {0}")] InvalidIdentifier(String),
    #[error("invalid limit: {0}")] InvalidLimit(String),
    #[error("token not whitelisted: {0}")] UnwhitelistedToken(String),
    #[error("policy not allowed: {0}")] PolicyNotAllowed(String),
    #[error("policy already registered: {0}")] AlreadyRegistered(String),
    #[error("capability probe failed for {policy}: {reason}")] CapabilityProbeFailed { policy: String, reason: String },
    #[error("settings: {0}")] Settings(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("empty parent list")] EmptyParentList,
    #[error("too many parents: {count} > {max}")] TooManyParents { count: usize, max: usize },
    #[error("ancestor limit reached: {count} >= {max}")] AncestorLimitReached { count: u64, max: u64 },
    #[error("ancestor limit exceeded: {count} > {max}")] AncestorLimitExceeded { count: u64, max: u64 },
    #[error("too many accumulated policies: {count} > {max}")] TooManyAccumulatedPolicies { count: usize, max: usize },
    #[error("length mismatch: {parents} parents, {policies} policies, {percents} percents")] LengthMismatch { parents: usize, policies: usize, percents: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error("share supply exceeded: {total} > {supply}")] ShareSupplyExceeded { total: u64, supply: u64 },
    #[error("invalid percent: {0}")] InvalidPercent(u64),
    #[error("insufficient shares: have {have}, need {need}")] InsufficientShares { have: u64, need: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("no vault for entity {0}")] NoVault(String),
    #[error("entity already linked: {0}")] AlreadyLinked(String),
    #[error("snapshot interval not elapsed: {elapsed}s < {interval}s")] IntervalNotElapsed { elapsed: u64, interval: u64 },
    #[error("zero amount")] ZeroAmount,
    #[error("no claimable tokens: {0}")] NoClaimableTokens(String),
    #[error("invalid target: {0}")] InvalidTarget(String),
    #[error("{ancestor} is not a verified ancestor of {descendant}")] NotAVerifiedAncestor { ancestor: String, descendant: String },
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("unauthorized: {0}")] Unauthorized(String),
    #[error("must claim as self")] MustClaimAsSelf,
    #[error("collective receivers must claim via the collective module")] CollectiveMustClaimViaCollectiveModule,
    #[error("reentrant call into {0}")] ReentrantCall(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatingError {
    #[error("entity is tagged by a dispute: {0}")] EntityTagged(String),
}

/// Failure raised by distribution policy code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy {policy} rejected: {reason}")] Rejected { policy: String, reason: String },
    #[error("royalty stack {stack} exceeds {max}")] StackExceeded { stack: u64, max: u64 },
}

/// Failure raised by the movable-balance primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance of {token} for {holder}: have {have}, need {need}")] InsufficientBalance { token: String, holder: String, have: u64, need: u64 },
    #[error("balance overflow")] Overflow,
    #[error("transfer rejected: {0}")] Rejected(String),
    /// A failed call could not reverse one of its transfers; ledger effects remain.
    #[error("rollback of {op} incomplete after {cause}: {reason}")] RollbackIncomplete { op: &'static str, cause: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoyaltyError {
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Graph(#[from] GraphError),
    #[error(transparent)] Share(#[from] ShareError),
    #[error(transparent)] Vault(#[from] VaultError),
    #[error(transparent)] Access(#[from] AccessError),
    #[error(transparent)] Gating(#[from] GatingError),
    #[error(transparent)] Policy(#[from] PolicyError),
    #[error(transparent)] Ledger(#[from] LedgerError),
}
