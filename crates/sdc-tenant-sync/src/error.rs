// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for sdc-tenant-sync.

use thiserror::Error;

/// Result type using SyncError.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type for identity-service calls.
pub type IdentityResult<T> = std::result::Result<T, IdentityError>;

/// Errors raised by the identity-service client.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The HTTP request itself failed.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The service rejected the admin token.
    #[error("Invalid OpenStack Identity credentials.")]
    Unauthorized,

    /// The service answered with a non-success status.
    #[error("identity api error [{status}]: {message}")]
    Api { status: u16, message: String },

    /// The endpoint is not a usable base URL.
    #[error("invalid identity endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// The service answered with a body we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors that abort a reconciliation pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configured role names with no matching role in the identity service.
    #[error("unable to find all roles specified, missing: {}", .0.join(", "))]
    MissingRoles(Vec<String>),

    /// Every user was filtered out as ignored.
    #[error("no users found to sync")]
    NoUsers,

    /// Identity-service failure.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_roles_lists_names() {
        let err = SyncError::MissingRoles(vec!["_member_".to_string(), "ops".to_string()]);
        assert_eq!(
            err.to_string(),
            "unable to find all roles specified, missing: _member_, ops"
        );
    }

    #[test]
    fn test_unauthorized_message() {
        let err = SyncError::from(IdentityError::Unauthorized);
        assert_eq!(err.to_string(), "Invalid OpenStack Identity credentials.");
    }
}
