//! Cross-crate test suite for royalty share accounting.
//!
//! Integration tests drive the module end to end over in-memory
//! collaborators: the reference scenarios, claim accounting across snapshots
//! and share transfers, and adversarial callers (reentrant policies and
//! ledgers, failing hooks, randomized graphs).

pub mod helpers;
