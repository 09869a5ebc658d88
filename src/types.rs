//! Core directory and permission types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthzError, Result};
use crate::scope::RoleScope;

/// Unique principal identifier
pub type PrincipalId = String;

/// Unique account (tenant) identifier
pub type AccountId = String;

/// Unique membership identifier
pub type MembershipId = String;

/// A `resource:action` permission key
///
/// Both halves are ASCII; either half may be the literal wildcard `*`,
/// which must be standalone (e.g. `tickets:*`, `*:*` — never `tick*:view`).
///
/// # Examples
///
/// ```
/// use tenant_authz::PermissionKey;
///
/// let key: PermissionKey = "tickets:view".parse().unwrap();
/// assert_eq!(key.resource(), "tickets");
/// assert_eq!(key.action(), "view");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionKey {
    raw: String,
    split: usize,
}

impl PermissionKey {
    /// Parses and validates a `resource:action` string
    pub fn parse(s: &str) -> Result<Self> {
        if !s.is_ascii() {
            return Err(AuthzError::InvalidPermissionKey(s.to_string()));
        }

        let mut parts = s.splitn(2, ':');
        let resource = parts.next().unwrap_or("");
        let action = match parts.next() {
            Some(a) => a,
            None => return Err(AuthzError::InvalidPermissionKey(s.to_string())),
        };

        for half in [resource, action] {
            if half.is_empty() || half.contains(':') {
                return Err(AuthzError::InvalidPermissionKey(s.to_string()));
            }
            if half.contains('*') && half != "*" {
                return Err(AuthzError::InvalidPermissionKey(s.to_string()));
            }
        }

        Ok(Self {
            raw: s.to_string(),
            split: resource.len(),
        })
    }

    /// Builds a key from separate resource and action parts
    pub fn new(resource: &str, action: &str) -> Result<Self> {
        Self::parse(&format!("{}:{}", resource, action))
    }

    /// The resource half of the key
    pub fn resource(&self) -> &str {
        &self.raw[..self.split]
    }

    /// The action half of the key
    pub fn action(&self) -> &str {
        &self.raw[self.split + 1..]
    }

    /// Returns the raw `resource:action` string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The keys that would grant `(resource, action)`: the exact key plus
    /// the `resource:*` and `*:*` wildcard forms
    pub fn candidates(resource: &str, action: &str) -> Result<Vec<PermissionKey>> {
        let mut keys = vec![Self::new(resource, action)?];

        if action != "*" {
            keys.push(Self::new(resource, "*")?);
        }
        if resource != "*" {
            keys.push(Self::parse("*:*")?);
        }

        Ok(keys)
    }
}

impl FromStr for PermissionKey {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PermissionKey {
    type Error = AuthzError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PermissionKey> for String {
    fn from(key: PermissionKey) -> Self {
        key.raw
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// What a role template grants
///
/// Modeled as a sum type so the full-access escape hatch is structurally
/// distinct from an (even wildcard-bearing) permission list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Role {
    /// Super-admin: bypasses all permission checks
    FullAccess,
    /// Grants exactly the listed permission keys
    Scoped { permissions: Vec<PermissionKey> },
}

impl Role {
    /// Builds a scoped role from raw `resource:action` strings
    pub fn scoped<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let permissions = keys
            .into_iter()
            .map(|k| PermissionKey::parse(k.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Role::Scoped { permissions })
    }
}

/// A named, reusable role definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTemplate {
    /// Template name (e.g. "Administrator", "Technician")
    pub name: String,

    /// What the template grants
    pub role: Role,
}

impl RoleTemplate {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

/// A global (tenant-independent) role assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemAssignment {
    /// The assigned role template
    pub template: RoleTemplate,
}

/// A role assignment attached to a membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipAssignment {
    /// The assigned role template
    pub template: RoleTemplate,

    /// Breadth of the assignment
    pub scope: RoleScope,
}

/// A legacy per-membership permission grant, independent of role templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectOverride {
    /// Granted resource (may be `*`)
    pub resource: String,

    /// Granted action (may be `*`)
    pub action: String,

    /// Breadth of the grant
    pub scope: RoleScope,
}

/// A principal's membership in one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    /// Membership identifier
    pub id: MembershipId,

    /// The account this membership belongs to
    pub account_id: AccountId,

    /// Role assignments on this membership
    #[serde(default)]
    pub assignments: Vec<MembershipAssignment>,

    /// Legacy direct grants on this membership
    #[serde(default)]
    pub overrides: Vec<DirectOverride>,
}

/// One principal with everything needed for aggregation, fetched from the
/// store in a single combined read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalRecord {
    /// Principal identifier
    pub id: PrincipalId,

    /// Primary email address, if known
    #[serde(default)]
    pub email: Option<String>,

    /// Global role assignments
    #[serde(default)]
    pub system_assignments: Vec<SystemAssignment>,

    /// Account memberships with their assignments and overrides
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

impl PrincipalRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            system_assignments: Vec::new(),
            memberships: Vec::new(),
        }
    }
}

/// A tenant node in the account tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier
    pub id: AccountId,

    /// Display name
    pub name: String,

    /// Parent account, absent for roots
    #[serde(default)]
    pub parent_id: Option<AccountId>,

    /// Comma-separated, case-insensitive email domain list used for
    /// auto-enrollment (e.g. "acme.com, acme.co.uk")
    #[serde(default)]
    pub domains: Option<String>,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            domains: None,
        }
    }

    /// Sets the parent account
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Sets the auto-enrollment domain list
    pub fn with_domains(mut self, domains: impl Into<String>) -> Self {
        self.domains = Some(domains.into());
        self
    }

    /// The configured domains, split, trimmed and lowercased
    pub fn domain_list(&self) -> Vec<String> {
        self.domains
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect()
    }
}
