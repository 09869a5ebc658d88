//! Persistence boundary for the authorization core
//!
//! The store returns a principal with all of its role assignments in one
//! combined read, answers parent-link lookups for hierarchy walks, and
//! performs the two writes this core needs (membership creation and
//! membership-role assignment). Everything else about persistence lives
//! outside this crate.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AuthzError, Result};
use crate::scope::RoleScope;
use crate::types::{
    Account, AccountId, Membership, MembershipAssignment, MembershipId, PrincipalId,
    PrincipalRecord, RoleTemplate,
};

/// Directory store trait
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Load a principal with global assignments, memberships, membership
    /// role assignments and direct overrides in one combined read
    async fn load_principal(&self, principal_id: &str) -> Result<PrincipalRecord>;

    /// The parent of an account, `None` for roots and unknown accounts
    async fn parent_account(&self, account_id: &str) -> Result<Option<AccountId>>;

    /// All account ids (super-admin visibility)
    async fn account_ids(&self) -> Result<Vec<AccountId>>;

    /// All accounts that carry an auto-enrollment domain list
    async fn accounts_with_domains(&self) -> Result<Vec<Account>>;

    /// Look up a role template by name
    async fn role_template(&self, name: &str) -> Result<Option<RoleTemplate>>;

    /// Create a membership between a principal and an account
    ///
    /// Idempotent: if the membership already exists, its id is returned and
    /// nothing is written.
    async fn create_membership(
        &self,
        principal_id: &str,
        account_id: &str,
    ) -> Result<MembershipId>;

    /// Attach a role template to a membership
    ///
    /// Returns `false` when an identical assignment already exists
    /// (duplicate assignment is not an error).
    async fn create_membership_role(
        &self,
        membership_id: &str,
        template_name: &str,
        scope: RoleScope,
    ) -> Result<bool>;
}

#[derive(Default)]
struct DirectoryState {
    principals: HashMap<PrincipalId, PrincipalRecord>,
    accounts: HashMap<AccountId, Account>,
    templates: HashMap<String, RoleTemplate>,
}

/// In-memory directory store implementation
///
/// Backs tests and embedded deployments; production deployments implement
/// [`DirectoryStore`] over their own persistence.
pub struct InMemoryDirectoryStore {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryDirectoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(DirectoryState::default())),
        }
    }

    /// Insert or replace a principal record
    pub async fn put_principal(&self, principal: PrincipalRecord) {
        let mut state = self.state.write().await;
        state.principals.insert(principal.id.clone(), principal);
    }

    /// Insert or replace an account
    pub async fn put_account(&self, account: Account) {
        let mut state = self.state.write().await;
        state.accounts.insert(account.id.clone(), account);
    }

    /// Insert or replace a role template
    pub async fn put_template(&self, template: RoleTemplate) {
        let mut state = self.state.write().await;
        state.templates.insert(template.name.clone(), template);
    }

    /// Move an account under a new parent (or to the root)
    ///
    /// Callers are expected to check
    /// [`AccountHierarchy::would_create_cycle`](crate::AccountHierarchy::would_create_cycle)
    /// first and to invalidate cached chains afterwards.
    pub async fn reparent_account(
        &self,
        account_id: &str,
        new_parent: Option<AccountId>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| AuthzError::AccountNotFound(account_id.to_string()))?;
        account.parent_id = new_parent;
        Ok(())
    }
}

impl Default for InMemoryDirectoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn load_principal(&self, principal_id: &str) -> Result<PrincipalRecord> {
        let state = self.state.read().await;
        state
            .principals
            .get(principal_id)
            .cloned()
            .ok_or_else(|| AuthzError::PrincipalNotFound(principal_id.to_string()))
    }

    async fn parent_account(&self, account_id: &str) -> Result<Option<AccountId>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .get(account_id)
            .and_then(|a| a.parent_id.clone()))
    }

    async fn account_ids(&self) -> Result<Vec<AccountId>> {
        let state = self.state.read().await;
        Ok(state.accounts.keys().cloned().collect())
    }

    async fn accounts_with_domains(&self) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .filter(|a| a.domains.as_deref().is_some_and(|d| !d.trim().is_empty()))
            .cloned()
            .collect())
    }

    async fn role_template(&self, name: &str) -> Result<Option<RoleTemplate>> {
        let state = self.state.read().await;
        Ok(state.templates.get(name).cloned())
    }

    async fn create_membership(
        &self,
        principal_id: &str,
        account_id: &str,
    ) -> Result<MembershipId> {
        let mut state = self.state.write().await;

        if !state.accounts.contains_key(account_id) {
            return Err(AuthzError::AccountNotFound(account_id.to_string()));
        }

        let principal = state
            .principals
            .get_mut(principal_id)
            .ok_or_else(|| AuthzError::PrincipalNotFound(principal_id.to_string()))?;

        if let Some(existing) = principal
            .memberships
            .iter()
            .find(|m| m.account_id == account_id)
        {
            return Ok(existing.id.clone());
        }

        let membership = Membership {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            assignments: Vec::new(),
            overrides: Vec::new(),
        };
        let id = membership.id.clone();
        principal.memberships.push(membership);

        Ok(id)
    }

    async fn create_membership_role(
        &self,
        membership_id: &str,
        template_name: &str,
        scope: RoleScope,
    ) -> Result<bool> {
        let mut state = self.state.write().await;

        let template = state
            .templates
            .get(template_name)
            .cloned()
            .ok_or_else(|| AuthzError::RoleTemplateNotFound(template_name.to_string()))?;

        let membership = state
            .principals
            .values_mut()
            .flat_map(|p| p.memberships.iter_mut())
            .find(|m| m.id == membership_id)
            .ok_or_else(|| AuthzError::MembershipNotFound(membership_id.to_string()))?;

        let duplicate = membership
            .assignments
            .iter()
            .any(|a| a.template.name == template_name && a.scope == scope);
        if duplicate {
            return Ok(false);
        }

        membership.assignments.push(MembershipAssignment {
            template,
            scope,
        });

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    async fn seeded_store() -> InMemoryDirectoryStore {
        let store = InMemoryDirectoryStore::new();
        store.put_account(Account::new("acct-1", "Acme")).await;
        store
            .put_principal(PrincipalRecord::new("user-1"))
            .await;
        store
            .put_template(RoleTemplate::new(
                "Technician",
                Role::scoped(["tickets:view"]).unwrap(),
            ))
            .await;
        store
    }

    #[tokio::test]
    async fn test_load_principal_not_found() {
        let store = InMemoryDirectoryStore::new();
        let err = store.load_principal("ghost").await.unwrap_err();
        assert!(matches!(err, AuthzError::PrincipalNotFound(_)));
    }

    #[tokio::test]
    async fn test_parent_of_unknown_account_is_none() {
        let store = InMemoryDirectoryStore::new();
        assert_eq!(store.parent_account("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_membership_idempotent() {
        let store = seeded_store().await;

        let first = store.create_membership("user-1", "acct-1").await.unwrap();
        let second = store.create_membership("user-1", "acct-1").await.unwrap();
        assert_eq!(first, second);

        let record = store.load_principal("user-1").await.unwrap();
        assert_eq!(record.memberships.len(), 1);
    }

    #[tokio::test]
    async fn test_create_membership_unknown_account() {
        let store = seeded_store().await;
        let err = store
            .create_membership("user-1", "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_membership_role_duplicate_is_not_an_error() {
        let store = seeded_store().await;
        let membership = store.create_membership("user-1", "acct-1").await.unwrap();

        let created = store
            .create_membership_role(&membership, "Technician", RoleScope::Account)
            .await
            .unwrap();
        assert!(created);

        let again = store
            .create_membership_role(&membership, "Technician", RoleScope::Account)
            .await
            .unwrap();
        assert!(!again);

        let record = store.load_principal("user-1").await.unwrap();
        assert_eq!(record.memberships[0].assignments.len(), 1);
    }

    #[tokio::test]
    async fn test_create_membership_role_unknown_template() {
        let store = seeded_store().await;
        let membership = store.create_membership("user-1", "acct-1").await.unwrap();

        let err = store
            .create_membership_role(&membership, "Ghost", RoleScope::Own)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::RoleTemplateNotFound(_)));
    }

    #[tokio::test]
    async fn test_accounts_with_domains_filters_empty() {
        let store = InMemoryDirectoryStore::new();
        store
            .put_account(Account::new("a", "A").with_domains("a.com"))
            .await;
        store.put_account(Account::new("b", "B").with_domains("  ")).await;
        store.put_account(Account::new("c", "C")).await;

        let with_domains = store.accounts_with_domains().await.unwrap();
        assert_eq!(with_domains.len(), 1);
        assert_eq!(with_domains[0].id, "a");
    }
}
