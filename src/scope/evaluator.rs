//! Scope sufficiency evaluation for the legacy direct-override path
//!
//! Templated role grants are bucketed per tenant at aggregation time and
//! never pass through here; direct overrides carry an explicit scope per
//! grant and are the only callers of this evaluator.

use std::sync::Arc;

use super::types::RoleScope;
use crate::error::Result;
use crate::hierarchy::AccountHierarchy;

/// Decides whether a granted scope reaches a requested target
pub struct ScopeEvaluator {
    hierarchy: Arc<AccountHierarchy>,
}

impl ScopeEvaluator {
    pub fn new(hierarchy: Arc<AccountHierarchy>) -> Self {
        Self { hierarchy }
    }

    /// Whether a grant with `role_scope`, anchored at `role_account`,
    /// satisfies a request requiring `required_scope` against
    /// `requested_account`
    ///
    /// With no requested account the decision is the context-free ordering
    /// (`subsidiary` ⊇ `account` ⊇ `own`). With a requested account, `own`
    /// and `account` grants require the exact anchor account, while
    /// `subsidiary` also reaches any descendant of the anchor, at any depth.
    pub async fn satisfies(
        &self,
        role_scope: RoleScope,
        required_scope: RoleScope,
        role_account: Option<&str>,
        requested_account: Option<&str>,
    ) -> Result<bool> {
        let Some(requested) = requested_account else {
            return Ok(role_scope.covers(required_scope));
        };

        let Some(anchor) = role_account else {
            // Global grants satisfy any tenant context
            return Ok(true);
        };

        if anchor == requested {
            return Ok(true);
        }

        match role_scope {
            RoleScope::Own | RoleScope::Account => Ok(false),
            RoleScope::Subsidiary => self.hierarchy.is_descendant(requested, anchor).await,
        }
    }
}
