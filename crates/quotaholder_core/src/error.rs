//! Error taxonomy of the high-level quota API.
//!
//! # Invariants
//! - Name and key failures are detected locally, before any ledger call.
//! - Rejections reported by the ledger map to one variant per primitive.
//! - Authorization keys are never included in error messages.

use crate::ledger::LedgerError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by every high-level API operation.
pub type HlApiResult<T> = Result<T, HlApiError>;

/// Errors from high-level API operations.
#[derive(Debug)]
pub enum HlApiError {
    /// Malformed or wrongly-rooted node name.
    InvalidName { label: &'static str, value: String },
    /// Malformed node authorization key.
    InvalidKey { label: &'static str },
    /// Ledger rejected `create_entity` and the node still does not exist.
    NodeCreation { node: String, parent: String },
    /// Ledger rejected `set_quota` for one attribute.
    QuotaRejected {
        /// Attribute name as supplied by the caller.
        attribute: String,
        /// Flat ledger resource name actually written.
        computed_attribute: String,
        node: String,
        resource: String,
    },
    /// Ledger rejected `release_entity`.
    EntityRelease { entity: String },
    /// A group resource was defined against an unknown global resource.
    MissingGlobalResource { resource: String, group: String },
    /// A group resource was defined against an unknown group.
    MissingGroup { group: String, resource: String },
    /// Ledger returned more than one owner for a single entity.
    AmbiguousNode { node: String, owners: usize },
    /// No ledger endpoint could be resolved at construction time.
    Configuration(String),
    /// Ledger transport, storage or commission failure.
    Ledger(LedgerError),
}

impl Display for HlApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName { label, value } => write!(f, "invalid name for `{label}`: `{value}`"),
            Self::InvalidKey { label } => write!(f, "invalid node key for `{label}`"),
            Self::NodeCreation { node, parent } => {
                write!(f, "could not create node `{node}` under `{parent}`")
            }
            Self::QuotaRejected {
                attribute,
                computed_attribute,
                node,
                resource,
            } => write!(
                f,
                "could not set attribute `{attribute}` [=`{computed_attribute}`] for node `{node}`, related to resource `{resource}`"
            ),
            Self::EntityRelease { entity } => write!(f, "could not release entity `{entity}`"),
            Self::MissingGlobalResource { resource, group } => write!(
                f,
                "cannot define resource `{resource}` for group `{group}`: global resource does not exist"
            ),
            Self::MissingGroup { group, resource } => write!(
                f,
                "cannot define resource `{resource}` for group `{group}`: group does not exist"
            ),
            Self::AmbiguousNode { node, owners } => {
                write!(f, "ledger reported {owners} owners for node `{node}`")
            }
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::Ledger(err) => write!(f, "{err}"),
        }
    }
}

impl Error for HlApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ledger(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LedgerError> for HlApiError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

pub(crate) fn invalid_name(label: &'static str, value: &str) -> HlApiError {
    HlApiError::InvalidName {
        label,
        value: value.to_string(),
    }
}
