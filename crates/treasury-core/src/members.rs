use crate::error::TreasuryError;
use crate::types::{Principal, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Member roles, ordered by authority: Viewer < Signer < Admin.
///
/// The derived total order is the authorization comparison; no raw role
/// integers appear anywhere in the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Signer,
    Admin,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Signer => "signer",
            Self::Admin => "admin",
        }
    }
}

impl TryFrom<u8> for Role {
    type Error = TreasuryError;

    fn try_from(value: u8) -> Result<Self, TreasuryError> {
        match value {
            0 => Ok(Self::Viewer),
            1 => Ok(Self::Signer),
            2 => Ok(Self::Admin),
            other => Err(TreasuryError::InvalidRole(format!(
                "role value {other} outside allowed range 0..=2"
            ))),
        }
    }
}

impl FromStr for Role {
    type Err = TreasuryError;

    fn from_str(s: &str) -> Result<Self, TreasuryError> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "signer" => Ok(Self::Signer),
            "admin" => Ok(Self::Admin),
            other => Err(TreasuryError::InvalidRole(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}

/// Member record. Members are never physically deleted; deactivation flips
/// the `active` tombstone and the record stays for audit lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub role: Role,
    pub added_at: Tick,
    pub last_active: Tick,
    pub active: bool,
}

/// Authoritative role table; the leaf dependency for every authorization
/// check in the engine.
#[derive(Debug, Default, Clone)]
pub struct MemberRegistry {
    members: BTreeMap<Principal, Member>,
    active_count: u64,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the genesis admin at bootstrap. Idempotence is not needed:
    /// bootstrap runs once per deployment.
    pub(crate) fn seed_admin(&mut self, principal: Principal, now: Tick) {
        self.members.insert(
            principal,
            Member {
                role: Role::Admin,
                added_at: now,
                last_active: now,
                active: true,
            },
        );
        self.active_count += 1;
    }

    pub fn add(
        &mut self,
        principal: Principal,
        role: Role,
        now: Tick,
    ) -> Result<(), TreasuryError> {
        if self.members.contains_key(&principal) {
            return Err(TreasuryError::AlreadyExists(format!(
                "member '{principal}'"
            )));
        }
        self.members.insert(
            principal,
            Member {
                role,
                added_at: now,
                last_active: now,
                active: true,
            },
        );
        self.active_count += 1;
        Ok(())
    }

    /// Soft-deactivate a member. The tombstoned record remains readable.
    pub fn deactivate(&mut self, principal: &Principal) -> Result<(), TreasuryError> {
        let member = self
            .members
            .get_mut(principal)
            .filter(|member| member.active)
            .ok_or_else(|| TreasuryError::missing_member(principal))?;
        member.active = false;
        self.active_count -= 1;
        Ok(())
    }

    pub fn set_role(
        &mut self,
        principal: &Principal,
        role: Role,
        now: Tick,
    ) -> Result<(), TreasuryError> {
        let member = self
            .members
            .get_mut(principal)
            .filter(|member| member.active)
            .ok_or_else(|| TreasuryError::missing_member(principal))?;
        member.role = role;
        member.last_active = now;
        Ok(())
    }

    pub fn get(&self, principal: &Principal) -> Option<&Member> {
        self.members.get(principal)
    }

    /// A member may propose, vote, and execute iff active with at least
    /// Signer authority. Viewers are never authorized.
    pub fn is_authorized(&self, principal: &Principal) -> bool {
        self.has_role(principal, Role::Signer)
    }

    pub fn has_role(&self, principal: &Principal, required: Role) -> bool {
        self.members
            .get(principal)
            .map(|member| member.active && member.role >= required)
            .unwrap_or(false)
    }

    /// Update `last_active` if the principal is a registered member.
    pub(crate) fn touch(&mut self, principal: &Principal, now: Tick) {
        if let Some(member) = self.members.get_mut(principal) {
            member.last_active = now;
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count
    }
}
