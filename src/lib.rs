//! # Multi-tenant Authorization Core
//!
//! Decides, for a given principal, whether a requested action on a resource
//! is permitted, combining global roles, per-tenant membership roles, an
//! arbitrary-depth tenant hierarchy and legacy scoped overrides, with a
//! TTL-bounded per-principal snapshot cache.
//!
//! ## Features
//!
//! - **Role aggregation** into a cached per-principal snapshot, with a
//!   structural full-access short-circuit
//! - **Hierarchical tenants**: subsidiary-scoped grants reach descendant
//!   accounts at any depth, with cycle-safe ancestor walks
//! - **Wildcard permission keys** (`resource:action`, `resource:*`, `*:*`)
//! - **Batched evaluation** with per-principal snapshot deduplication
//! - **Explicit cache invalidation** alongside lazy TTL expiry
//! - **Domain auto-enrollment** and idempotent default-role assignment
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tenant_authz::{
//!     Account, InMemoryDirectoryStore, PermissionService, PrincipalRecord, Role, RoleTemplate,
//!     SystemAssignment,
//! };
//!
//! #[tokio::main]
//! async fn main() -> tenant_authz::Result<()> {
//!     let store = Arc::new(InMemoryDirectoryStore::new());
//!     store.put_account(Account::new("acme", "Acme Corp")).await;
//!
//!     let mut alice = PrincipalRecord::new("user-alice");
//!     alice.system_assignments.push(SystemAssignment {
//!         template: RoleTemplate::new("Support", Role::scoped(["tickets:view"])?),
//!     });
//!     store.put_principal(alice).await;
//!
//!     let service = PermissionService::with_defaults(store);
//!     assert!(service.has_permission("user-alice", "tickets", "view", None).await?);
//!     assert!(!service.has_permission("user-alice", "billing", "view", None).await?);
//!
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod hierarchy;
pub mod scope;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use aggregate::{OverrideGrant, PermissionSnapshot, RoleAggregator};
pub use cache::{CacheConfig, CacheStats, SnapshotCache};
pub use error::{AuthzError, Result};
pub use hierarchy::AccountHierarchy;
pub use scope::{RoleScope, ScopeEvaluator};
pub use service::{AccessContext, PermissionExport, PermissionService, ServiceConfig};
pub use store::{DirectoryStore, InMemoryDirectoryStore};
pub use types::{
    Account, AccountId, DirectOverride, Membership, MembershipAssignment, MembershipId,
    PermissionKey, PrincipalId, PrincipalRecord, Role, RoleTemplate, SystemAssignment,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
