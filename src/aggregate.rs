//! Role aggregation: reduces a principal's assignments to a snapshot
//!
//! The snapshot is the cached unit of evaluation. Templated grants are
//! bucketed per tenant; subsidiary-scoped grants additionally land in a
//! second map that `has_permission` probes from descendant tenants, so the
//! cache never pre-expands grants into every descendant bucket.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::scope::RoleScope;
use crate::types::{AccountId, PermissionKey, PrincipalRecord, Role};

/// A direct-override grant carried into the snapshot for the legacy path
#[derive(Debug, Clone, Serialize)]
pub struct OverrideGrant {
    /// Account the owning membership belongs to
    pub account_id: AccountId,

    /// Granted key (resource/action, possibly wildcarded)
    pub key: PermissionKey,

    /// Breadth of the grant
    pub scope: RoleScope,
}

/// Aggregated permission view for one principal
///
/// Derived and ephemeral; rebuilt wholesale on every cache miss so there is
/// never a partially-updated snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionSnapshot {
    /// Principal holds a full-access role; every check passes
    pub is_super_admin: bool,

    /// Keys granted by global role assignments
    pub system_permissions: HashSet<PermissionKey>,

    /// Keys granted per tenant, any scope, one entry per tenant with at
    /// least one grant
    pub account_permissions: HashMap<AccountId, HashSet<PermissionKey>>,

    /// Keys granted per tenant by subsidiary-scoped assignments only;
    /// probed from descendant tenants during evaluation
    pub subsidiary_permissions: HashMap<AccountId, HashSet<PermissionKey>>,

    /// Legacy direct grants, evaluated through the scope evaluator
    pub overrides: Vec<OverrideGrant>,
}

impl PermissionSnapshot {
    /// The snapshot of a full-access principal
    pub fn super_admin() -> Self {
        Self {
            is_super_admin: true,
            ..Default::default()
        }
    }

    /// Whether any candidate key is granted globally
    pub fn grants_system(&self, candidates: &[PermissionKey]) -> bool {
        candidates.iter().any(|k| self.system_permissions.contains(k))
    }

    /// Whether any candidate key is granted for the exact tenant
    pub fn grants_account(&self, account_id: &str, candidates: &[PermissionKey]) -> bool {
        self.account_permissions
            .get(account_id)
            .is_some_and(|keys| candidates.iter().any(|k| keys.contains(k)))
    }

    /// Whether any candidate key is granted with subsidiary reach from the
    /// given ancestor tenant
    pub fn grants_from_ancestor(&self, ancestor_id: &str, candidates: &[PermissionKey]) -> bool {
        self.subsidiary_permissions
            .get(ancestor_id)
            .is_some_and(|keys| candidates.iter().any(|k| keys.contains(k)))
    }
}

/// Reduces one principal record to a [`PermissionSnapshot`]
pub struct RoleAggregator;

impl RoleAggregator {
    /// Aggregates all role assignments of a principal
    ///
    /// Any full-access role, whether attached globally or to a single
    /// membership, short-circuits the whole aggregation and marks the
    /// principal super-admin across every tenant. That early break is the
    /// observed production policy and is preserved as-is; see DESIGN.md
    /// before changing it to a tenant-scoped interpretation.
    pub fn aggregate(record: &PrincipalRecord) -> PermissionSnapshot {
        let mut snapshot = PermissionSnapshot::default();

        for assignment in &record.system_assignments {
            match &assignment.template.role {
                Role::FullAccess => {
                    debug!(principal = %record.id, "full-access system role, short-circuiting");
                    return PermissionSnapshot::super_admin();
                }
                Role::Scoped { permissions } => {
                    snapshot.system_permissions.extend(permissions.iter().cloned());
                }
            }
        }

        for membership in &record.memberships {
            for assignment in &membership.assignments {
                match &assignment.template.role {
                    Role::FullAccess => {
                        debug!(
                            principal = %record.id,
                            account = %membership.account_id,
                            "full-access membership role, short-circuiting"
                        );
                        return PermissionSnapshot::super_admin();
                    }
                    Role::Scoped { permissions } => {
                        snapshot
                            .account_permissions
                            .entry(membership.account_id.clone())
                            .or_default()
                            .extend(permissions.iter().cloned());

                        if assignment.scope == RoleScope::Subsidiary {
                            snapshot
                                .subsidiary_permissions
                                .entry(membership.account_id.clone())
                                .or_default()
                                .extend(permissions.iter().cloned());
                        }
                    }
                }
            }

            for grant in &membership.overrides {
                match PermissionKey::new(&grant.resource, &grant.action) {
                    Ok(key) => snapshot.overrides.push(OverrideGrant {
                        account_id: membership.account_id.clone(),
                        key,
                        scope: grant.scope,
                    }),
                    Err(_) => {
                        // Malformed legacy grant: skip rather than poison
                        // the whole snapshot
                        debug!(
                            principal = %record.id,
                            resource = %grant.resource,
                            action = %grant.action,
                            "skipping malformed direct override"
                        );
                    }
                }
            }
        }

        // Drop tenants that ended up with no grants so accessible-account
        // listings stay tight
        snapshot.account_permissions.retain(|_, keys| !keys.is_empty());

        snapshot
    }
}
