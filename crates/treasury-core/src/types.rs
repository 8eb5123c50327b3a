use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotone integer clock supplied by the host with every call.
///
/// All expiry, window, and period-bucket arithmetic is done on ticks; the
/// engine never reads a wall clock.
pub type Tick = u64;

/// Principal identity of a member, recipient, or vault account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Principal {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Host-supplied context for a single engine call: the invoking principal
/// (assumed tamper-proof) and the current tick.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub caller: Principal,
    pub now: Tick,
}

impl CallContext {
    pub fn new(caller: impl Into<Principal>, now: Tick) -> Self {
        Self {
            caller: caller.into(),
            now,
        }
    }
}

/// Vault-wide stats tuple exposed as a single read query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStats {
    pub member_count: u64,
    pub signature_threshold: u64,
    pub balance_minor: u64,
    pub proposal_count: u64,
    pub paused: bool,
}
