// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for sdc-resources.

use thiserror::Error;

/// Result type using ResourceError.
pub type Result<T> = std::result::Result<T, ResourceError>;

/// Errors raised by the remote DataCenter client.
///
/// These are surfaced to the caller unmodified; nothing in this crate
/// retries or translates them.
#[derive(Debug, Error)]
pub enum DataCenterError {
    /// The HTTP request itself failed (connect, timeout, body decode).
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("api error [{status}]: {message}")]
    Api { status: u16, message: String },

    /// An endpoint is not a usable base URL.
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// VMAPI/NAPI endpoints could not be discovered through SAPI.
    #[error("service discovery failed: {0}")]
    Discovery(String),

    /// The service answered with a body we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors that can occur while driving a resource through its lifecycle.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Override configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required property was not supplied.
    #[error("missing required property: {0}")]
    MissingProperty(String),

    /// A property was supplied with a value of the wrong shape.
    #[error("invalid value for property '{name}': {reason}")]
    InvalidProperty { name: String, reason: String },

    /// A property name that the resource type does not declare.
    #[error("unknown property: {0}")]
    UnknownProperty(String),

    /// A `dest:via` route pair could not be split.
    #[error("invalid route '{0}': expected <destination>:<gateway>")]
    InvalidRoute(String),

    /// An operation that needs a remote identifier was called before creation.
    #[error("resource has no remote identifier")]
    MissingResourceId,

    /// The remote object vanished while it was expected to exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The remote service reports that provisioning failed.
    #[error("provisioning failed for {0}")]
    ProvisioningFailed(String),

    /// Remote client error.
    #[error(transparent)]
    DataCenter(#[from] DataCenterError),
}

impl From<toml::de::Error> for ResourceError {
    fn from(err: toml::de::Error) -> Self {
        ResourceError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        ResourceError::Config(err.to_string())
    }
}
