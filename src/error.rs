//! Error types for the authorization core

use thiserror::Error;

/// Authorization core errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Principal does not exist in the directory
    #[error("Principal not found: {0}")]
    PrincipalNotFound(String),

    /// Account does not exist in the directory
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Membership does not exist in the directory
    #[error("Membership not found: {0}")]
    MembershipNotFound(String),

    /// Role template does not exist
    #[error("Role template not found: {0}")]
    RoleTemplateNotFound(String),

    /// Account hierarchy contains a cycle
    #[error("Hierarchy cycle detected at account: {0}")]
    HierarchyCycle(String),

    /// Malformed permission key
    #[error("Invalid permission key: {0}")]
    InvalidPermissionKey(String),

    /// Unrecognized scope value
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Underlying store failure
    #[error("Store error: {0}")]
    Store(String),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
