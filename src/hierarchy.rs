//! Account hierarchy resolver with cached ancestor chains
//!
//! Walks parent links to answer ancestor and descendant queries over the
//! tenant tree. Chains are cached with a TTL so repeated permission checks
//! do not re-walk parent links per call; `invalidate` must be called when an
//! account is reparented.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{AuthzError, Result};
use crate::store::DirectoryStore;
use crate::types::AccountId;

/// Default chain cache TTL (5 minutes)
const DEFAULT_CHAIN_TTL: Duration = Duration::from_secs(300);

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    created_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Resolves ancestor chains over the account tree
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use tenant_authz::{AccountHierarchy, InMemoryDirectoryStore};
/// # async fn example() -> tenant_authz::Result<()> {
/// let store = Arc::new(InMemoryDirectoryStore::new());
/// let hierarchy = AccountHierarchy::new(store);
///
/// // ["child", "parent", "root"]
/// let chain = hierarchy.ancestor_chain("child").await?;
/// # Ok(())
/// # }
/// ```
pub struct AccountHierarchy {
    store: Arc<dyn DirectoryStore>,
    chain_cache: DashMap<AccountId, CacheEntry<Vec<AccountId>>>,
    ttl: Duration,
}

impl AccountHierarchy {
    /// Creates a resolver with the default chain TTL
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self::with_ttl(store, DEFAULT_CHAIN_TTL)
    }

    /// Creates a resolver with a custom chain TTL
    pub fn with_ttl(store: Arc<dyn DirectoryStore>, ttl: Duration) -> Self {
        Self {
            store,
            chain_cache: DashMap::new(),
            ttl,
        }
    }

    /// The chain of account ids from `account_id` up to the root, starting
    /// with `account_id` itself
    ///
    /// A revisited id aborts the walk with [`AuthzError::HierarchyCycle`].
    /// The schema is meant to prevent cycles at reparenting time; the guard
    /// here turns a corrupted tree into an error instead of a hang.
    pub async fn ancestor_chain(&self, account_id: &str) -> Result<Vec<AccountId>> {
        if let Some(entry) = self.chain_cache.get(account_id) {
            if !entry.is_expired(self.ttl) {
                return Ok(entry.value.clone());
            }
            drop(entry);
            self.chain_cache.remove(account_id);
        }

        let chain = self.walk_chain(account_id).await?;
        self.chain_cache
            .insert(account_id.to_string(), CacheEntry::new(chain.clone()));

        Ok(chain)
    }

    async fn walk_chain(&self, account_id: &str) -> Result<Vec<AccountId>> {
        let mut chain = vec![account_id.to_string()];
        let mut seen: HashSet<AccountId> = HashSet::new();
        seen.insert(account_id.to_string());

        let mut current = account_id.to_string();
        while let Some(parent) = self.store.parent_account(&current).await? {
            if !seen.insert(parent.clone()) {
                return Err(AuthzError::HierarchyCycle(parent));
            }
            chain.push(parent.clone());
            current = parent;
        }

        debug!(account = %account_id, depth = chain.len(), "resolved ancestor chain");
        Ok(chain)
    }

    /// Whether `candidate_id` sits strictly below `of_id` in the tree
    ///
    /// `candidate_id == of_id` is not a descendant relationship; the
    /// same-account case is handled separately by scope evaluation.
    pub async fn is_descendant(&self, candidate_id: &str, of_id: &str) -> Result<bool> {
        let chain = self.ancestor_chain(candidate_id).await?;
        Ok(chain.iter().skip(1).any(|id| id == of_id))
    }

    /// Whether attaching `account_id` under `proposed_parent_id` would close
    /// a cycle; reparenting must be refused when this returns true
    pub async fn would_create_cycle(
        &self,
        account_id: &str,
        proposed_parent_id: &str,
    ) -> Result<bool> {
        if account_id == proposed_parent_id {
            return Ok(true);
        }

        let chain = self.ancestor_chain(proposed_parent_id).await?;
        Ok(chain.iter().any(|id| id == account_id))
    }

    /// Drops the cached chain for one account (call after reparenting it or
    /// any of its ancestors)
    pub fn invalidate(&self, account_id: &str) {
        self.chain_cache.remove(account_id);
    }

    /// Drops all cached chains
    pub fn clear(&self) {
        self.chain_cache.clear();
    }

    /// Removes expired chain entries
    pub fn cleanup_expired(&self) {
        let ttl = self.ttl;
        self.chain_cache.retain(|_, entry| !entry.is_expired(ttl));
    }

    /// Number of cached chains
    pub fn cached_chains(&self) -> usize {
        self.chain_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDirectoryStore;
    use crate::types::Account;

    async fn tree() -> Arc<InMemoryDirectoryStore> {
        // root -> mid -> leaf, plus a sibling of mid
        let store = Arc::new(InMemoryDirectoryStore::new());
        store.put_account(Account::new("root", "Root")).await;
        store
            .put_account(Account::new("mid", "Mid").with_parent("root"))
            .await;
        store
            .put_account(Account::new("leaf", "Leaf").with_parent("mid"))
            .await;
        store
            .put_account(Account::new("sibling", "Sibling").with_parent("root"))
            .await;
        store
    }

    #[tokio::test]
    async fn test_ancestor_chain() {
        let hierarchy = AccountHierarchy::new(tree().await);

        let chain = hierarchy.ancestor_chain("leaf").await.unwrap();
        assert_eq!(chain, vec!["leaf", "mid", "root"]);

        let chain = hierarchy.ancestor_chain("root").await.unwrap();
        assert_eq!(chain, vec!["root"]);
    }

    #[tokio::test]
    async fn test_unknown_account_chain_is_itself() {
        let hierarchy = AccountHierarchy::new(tree().await);
        let chain = hierarchy.ancestor_chain("ghost").await.unwrap();
        assert_eq!(chain, vec!["ghost"]);
    }

    #[tokio::test]
    async fn test_is_descendant() {
        let hierarchy = AccountHierarchy::new(tree().await);

        assert!(hierarchy.is_descendant("leaf", "root").await.unwrap());
        assert!(hierarchy.is_descendant("leaf", "mid").await.unwrap());
        assert!(hierarchy.is_descendant("mid", "root").await.unwrap());

        // Not itself, not a sibling, not upward
        assert!(!hierarchy.is_descendant("leaf", "leaf").await.unwrap());
        assert!(!hierarchy.is_descendant("leaf", "sibling").await.unwrap());
        assert!(!hierarchy.is_descendant("root", "leaf").await.unwrap());
    }

    #[tokio::test]
    async fn test_would_create_cycle() {
        let hierarchy = AccountHierarchy::new(tree().await);

        // Self-parenting
        assert!(hierarchy.would_create_cycle("root", "root").await.unwrap());

        // Parenting root under its own descendant
        assert!(hierarchy.would_create_cycle("root", "leaf").await.unwrap());
        assert!(hierarchy.would_create_cycle("mid", "leaf").await.unwrap());

        // Legal moves
        assert!(!hierarchy
            .would_create_cycle("leaf", "sibling")
            .await
            .unwrap());
        assert!(!hierarchy.would_create_cycle("sibling", "mid").await.unwrap());
    }

    #[tokio::test]
    async fn test_cycle_detection_aborts() {
        let store = Arc::new(InMemoryDirectoryStore::new());
        store.put_account(Account::new("a", "A").with_parent("b")).await;
        store.put_account(Account::new("b", "B").with_parent("a")).await;

        let hierarchy = AccountHierarchy::new(store);
        let err = hierarchy.ancestor_chain("a").await.unwrap_err();
        assert!(matches!(err, AuthzError::HierarchyCycle(_)));
    }

    #[tokio::test]
    async fn test_invalidate_after_reparent() {
        let store = tree().await;
        let hierarchy = AccountHierarchy::new(Arc::clone(&store) as Arc<dyn DirectoryStore>);

        assert_eq!(
            hierarchy.ancestor_chain("leaf").await.unwrap(),
            vec!["leaf", "mid", "root"]
        );

        store
            .reparent_account("leaf", Some("sibling".to_string()))
            .await
            .unwrap();

        // Stale until invalidated
        assert_eq!(
            hierarchy.ancestor_chain("leaf").await.unwrap(),
            vec!["leaf", "mid", "root"]
        );

        hierarchy.invalidate("leaf");
        assert_eq!(
            hierarchy.ancestor_chain("leaf").await.unwrap(),
            vec!["leaf", "sibling", "root"]
        );
    }

    #[tokio::test]
    async fn test_chain_caching_and_cleanup() {
        let hierarchy = AccountHierarchy::with_ttl(tree().await, Duration::from_millis(50));

        hierarchy.ancestor_chain("leaf").await.unwrap();
        assert_eq!(hierarchy.cached_chains(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        hierarchy.cleanup_expired();
        assert_eq!(hierarchy.cached_chains(), 0);
    }
}
