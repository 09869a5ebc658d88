//! Role assignment scope definitions
//!
//! A scope describes how far a role assignment reaches from its anchor
//! account: `own` (narrowest), `account`, or `subsidiary` (the account and
//! every descendant). The set is closed and case-sensitive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthzError;

/// Breadth of a role assignment or direct grant
///
/// Ordering invariant: `Subsidiary` ⊇ `Account` ⊇ `Own` — a broader scope
/// satisfies any narrower requirement on the same account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleScope {
    /// Only the principal's own records
    Own,
    /// The whole anchor account
    Account,
    /// The anchor account and all descendant accounts
    Subsidiary,
}

impl RoleScope {
    /// Whether this scope satisfies a required scope, ignoring any account
    /// context (the context-free ordering)
    pub fn covers(self, required: RoleScope) -> bool {
        self >= required
    }

    /// The wire representation (`own`, `account`, `subsidiary`)
    pub fn as_str(self) -> &'static str {
        match self {
            RoleScope::Own => "own",
            RoleScope::Account => "account",
            RoleScope::Subsidiary => "subsidiary",
        }
    }
}

impl FromStr for RoleScope {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "own" => Ok(RoleScope::Own),
            "account" => Ok(RoleScope::Account),
            "subsidiary" => Ok(RoleScope::Subsidiary),
            other => Err(AuthzError::InvalidScope(other.to_string())),
        }
    }
}

impl fmt::Display for RoleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(RoleScope::Subsidiary > RoleScope::Account);
        assert!(RoleScope::Account > RoleScope::Own);
    }

    #[test]
    fn test_covers() {
        assert!(RoleScope::Subsidiary.covers(RoleScope::Own));
        assert!(RoleScope::Subsidiary.covers(RoleScope::Account));
        assert!(RoleScope::Subsidiary.covers(RoleScope::Subsidiary));

        assert!(RoleScope::Account.covers(RoleScope::Own));
        assert!(RoleScope::Account.covers(RoleScope::Account));
        assert!(!RoleScope::Account.covers(RoleScope::Subsidiary));

        assert!(RoleScope::Own.covers(RoleScope::Own));
        assert!(!RoleScope::Own.covers(RoleScope::Account));
    }

    #[test]
    fn test_parse_closed_set() {
        assert_eq!("own".parse::<RoleScope>().unwrap(), RoleScope::Own);
        assert_eq!("account".parse::<RoleScope>().unwrap(), RoleScope::Account);
        assert_eq!(
            "subsidiary".parse::<RoleScope>().unwrap(),
            RoleScope::Subsidiary
        );

        // Case-sensitive, closed set
        assert!("Own".parse::<RoleScope>().is_err());
        assert!("SUBSIDIARY".parse::<RoleScope>().is_err());
        assert!("global".parse::<RoleScope>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for scope in [RoleScope::Own, RoleScope::Account, RoleScope::Subsidiary] {
            assert_eq!(scope.to_string().parse::<RoleScope>().unwrap(), scope);
        }
    }
}
