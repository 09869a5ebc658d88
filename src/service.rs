//! Permission service façade
//!
//! Orchestrates the cache, role aggregator, hierarchy resolver and scope
//! evaluator to answer single and batched permission queries, and performs
//! the identity helpers (domain auto-enrollment, default-role assignment).
//!
//! # Pipeline
//!
//! ```text
//! Request → SnapshotCache (hit/miss)
//!             ↓ miss
//!           DirectoryStore → RoleAggregator → snapshot stored
//!             ↓
//!           evaluation (system keys → tenant bucket → ancestor probes →
//!           legacy overrides via ScopeEvaluator) → bool
//! ```
//!
//! A permission revoked elsewhere is observed here only after TTL expiry or
//! explicit invalidation; that bounded staleness is the documented
//! trade-off, not a bug. Store failures during rebuild surface to the
//! caller, so evaluation fails closed.

use futures::future;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::aggregate::{PermissionSnapshot, RoleAggregator};
use crate::cache::{CacheConfig, CacheStats, SnapshotCache};
use crate::error::Result;
use crate::hierarchy::AccountHierarchy;
use crate::scope::{RoleScope, ScopeEvaluator};
use crate::store::DirectoryStore;
use crate::types::{AccountId, PermissionKey, PrincipalId};

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Snapshot cache settings
    pub cache: CacheConfig,

    /// TTL for cached ancestor chains
    pub hierarchy_ttl: Duration,

    /// Scope given to default-role assignments on enrollment
    pub default_role_scope: RoleScope,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            hierarchy_ttl: Duration::from_secs(300),
            default_role_scope: RoleScope::Own,
        }
    }
}

/// One permission question inside a batch
#[derive(Debug, Clone)]
pub struct AccessContext {
    /// Principal being evaluated
    pub principal_id: PrincipalId,

    /// Requested resource
    pub resource: String,

    /// Requested action
    pub action: String,

    /// Requested tenant context, if any
    pub account_id: Option<AccountId>,
}

impl AccessContext {
    pub fn new(
        principal_id: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            resource: resource.into(),
            action: action.into(),
            account_id: None,
        }
    }

    /// Targets the question at a specific tenant
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}

/// Serializable snapshot view for clients
#[derive(Debug, Clone, Serialize)]
pub struct PermissionExport {
    /// Principal bypasses all checks
    pub is_super_admin: bool,

    /// Flat list of global permission keys, sorted
    pub system_permissions: Vec<String>,

    /// Per-tenant permission keys, each list sorted
    pub account_permissions: HashMap<AccountId, Vec<String>>,
}

/// Permission decision façade
///
/// Cheap to share: wrap in an [`Arc`] and clone across request handlers.
pub struct PermissionService {
    store: Arc<dyn DirectoryStore>,
    hierarchy: Arc<AccountHierarchy>,
    evaluator: ScopeEvaluator,
    cache: Arc<SnapshotCache>,
    config: ServiceConfig,
}

impl PermissionService {
    /// Creates a service over the given store
    pub fn new(store: Arc<dyn DirectoryStore>, config: ServiceConfig) -> Self {
        let hierarchy = Arc::new(AccountHierarchy::with_ttl(
            Arc::clone(&store),
            config.hierarchy_ttl,
        ));
        let evaluator = ScopeEvaluator::new(Arc::clone(&hierarchy));
        let cache = Arc::new(SnapshotCache::new(config.cache.clone()));

        info!(
            ttl_secs = config.cache.ttl.as_secs(),
            capacity = config.cache.capacity,
            "permission service initialized"
        );

        Self {
            store,
            hierarchy,
            evaluator,
            cache,
            config,
        }
    }

    /// Creates a service with default configuration
    pub fn with_defaults(store: Arc<dyn DirectoryStore>) -> Self {
        Self::new(store, ServiceConfig::default())
    }

    /// Spawns the cache expiry sweeper if one is configured
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_sweeper(&self) {
        self.cache.start_sweeper();
    }

    /// Stops background tasks
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }

    /// The hierarchy resolver, for administrative flows (cycle checks on
    /// reparenting, chain invalidation)
    pub fn hierarchy(&self) -> &AccountHierarchy {
        &self.hierarchy
    }

    /// Snapshot cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Whether the principal may perform `action` on `resource`, optionally
    /// within one tenant
    ///
    /// Store failures during a snapshot rebuild surface as errors; callers
    /// must treat an error as a denial (fail closed).
    pub async fn has_permission(
        &self,
        principal_id: &str,
        resource: &str,
        action: &str,
        account_id: Option<&str>,
    ) -> Result<bool> {
        let snapshot = self.snapshot(principal_id).await?;
        let allowed = self
            .evaluate(&snapshot, resource, action, account_id)
            .await?;

        debug!(
            principal = %principal_id,
            resource = %resource,
            action = %action,
            account = account_id.unwrap_or("-"),
            allowed,
            "permission decision"
        );

        Ok(allowed)
    }

    /// Evaluates a batch of contexts; output order matches input order
    ///
    /// Each distinct principal's snapshot is loaded at most once, with the
    /// loads fanned out concurrently.
    pub async fn batch_evaluate(&self, contexts: &[AccessContext]) -> Result<Vec<bool>> {
        let mut unique: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for ctx in contexts {
            if seen.insert(ctx.principal_id.as_str()) {
                unique.push(ctx.principal_id.as_str());
            }
        }

        let loads = unique.iter().map(|id| self.snapshot(id));
        let snapshots = future::try_join_all(loads).await?;
        let by_principal: HashMap<&str, Arc<PermissionSnapshot>> =
            unique.into_iter().zip(snapshots).collect();

        let mut results = Vec::with_capacity(contexts.len());
        for ctx in contexts {
            let snapshot = &by_principal[ctx.principal_id.as_str()];
            results.push(
                self.evaluate(snapshot, &ctx.resource, &ctx.action, ctx.account_id.as_deref())
                    .await?,
            );
        }

        Ok(results)
    }

    /// The serializable permission view for one principal
    pub async fn get_user_permissions(&self, principal_id: &str) -> Result<PermissionExport> {
        let snapshot = self.snapshot(principal_id).await?;

        let mut system_permissions: Vec<String> = snapshot
            .system_permissions
            .iter()
            .map(|k| k.as_str().to_string())
            .collect();
        system_permissions.sort();

        let account_permissions = snapshot
            .account_permissions
            .iter()
            .map(|(account, keys)| {
                let mut keys: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();
                keys.sort();
                (account.clone(), keys)
            })
            .collect();

        Ok(PermissionExport {
            is_super_admin: snapshot.is_super_admin,
            system_permissions,
            account_permissions,
        })
    }

    /// The tenants this principal can see: every account for super-admins,
    /// otherwise the tenants where it holds at least one grant
    pub async fn get_accessible_account_ids(&self, principal_id: &str) -> Result<Vec<AccountId>> {
        let snapshot = self.snapshot(principal_id).await?;

        let mut ids = if snapshot.is_super_admin {
            self.store.account_ids().await?
        } else {
            snapshot.account_permissions.keys().cloned().collect()
        };
        ids.sort();

        Ok(ids)
    }

    /// Drops the cached snapshot for a principal
    ///
    /// Callers must invoke this after any mutation to the principal's roles
    /// or memberships; the next check rebuilds from current state.
    pub fn invalidate_user_permissions(&self, principal_id: &str) {
        self.cache.invalidate(principal_id);
    }

    /// Empties the snapshot cache (e.g. after bulk role-template edits)
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Enrolls a principal into every account whose domain list contains the
    /// email's domain (case-insensitive exact match)
    ///
    /// Idempotent: existing memberships are returned without duplication.
    /// A failure against one account is logged and skipped so it cannot
    /// block enrollment into the others.
    pub async fn auto_assign_by_domain(
        &self,
        email: &str,
        principal_id: &str,
    ) -> Result<Vec<AccountId>> {
        let Some(domain) = email
            .rsplit_once('@')
            .map(|(_, d)| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
        else {
            warn!(email = %email, "cannot derive domain for auto-assignment");
            return Ok(Vec::new());
        };

        let accounts = self.store.accounts_with_domains().await?;
        let mut associated = Vec::new();

        for account in accounts {
            if !account.domain_list().iter().any(|d| d == &domain) {
                continue;
            }

            match self.store.create_membership(principal_id, &account.id).await {
                Ok(_) => associated.push(account.id),
                Err(err) => {
                    warn!(
                        principal = %principal_id,
                        account = %account.id,
                        error = %err,
                        "skipping domain auto-assignment for account"
                    );
                }
            }
        }

        if !associated.is_empty() {
            self.cache.invalidate(principal_id);
        }

        Ok(associated)
    }

    /// Attaches a named default role template to a fresh membership
    ///
    /// A duplicate assignment is already-satisfied, not an error. The
    /// caller is responsible for invalidating the owning principal's
    /// snapshot afterwards.
    pub async fn assign_default_role(
        &self,
        membership_id: &str,
        template_name: &str,
    ) -> Result<()> {
        let created = self
            .store
            .create_membership_role(membership_id, template_name, self.config.default_role_scope)
            .await?;

        if created {
            debug!(membership = %membership_id, template = %template_name, "default role assigned");
        } else {
            debug!(membership = %membership_id, template = %template_name, "default role already assigned");
        }

        Ok(())
    }

    /// Gets the cached snapshot or rebuilds it from the store
    async fn snapshot(&self, principal_id: &str) -> Result<Arc<PermissionSnapshot>> {
        if let Some(snapshot) = self.cache.get(principal_id) {
            return Ok(snapshot);
        }

        let record = self.store.load_principal(principal_id).await?;
        let snapshot = RoleAggregator::aggregate(&record);

        Ok(self.cache.insert(principal_id, snapshot))
    }

    /// Evaluates one question against a snapshot
    ///
    /// Order: super-admin, global keys, exact tenant bucket, subsidiary
    /// probes up the ancestor chain, then the legacy override path.
    async fn evaluate(
        &self,
        snapshot: &PermissionSnapshot,
        resource: &str,
        action: &str,
        account_id: Option<&str>,
    ) -> Result<bool> {
        if snapshot.is_super_admin {
            return Ok(true);
        }

        let candidates = PermissionKey::candidates(resource, action)?;

        if snapshot.grants_system(&candidates) {
            return Ok(true);
        }

        if let Some(account) = account_id {
            if snapshot.grants_account(account, &candidates) {
                return Ok(true);
            }

            let chain = self.hierarchy.ancestor_chain(account).await?;
            for ancestor in chain.iter().skip(1) {
                if snapshot.grants_from_ancestor(ancestor, &candidates) {
                    return Ok(true);
                }
            }
        }

        for grant in &snapshot.overrides {
            if !candidates.contains(&grant.key) {
                continue;
            }

            if self
                .evaluator
                .satisfies(
                    grant.scope,
                    RoleScope::Own,
                    Some(grant.account_id.as_str()),
                    account_id,
                )
                .await?
            {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
