//! Quota ledger contract.
//!
//! # Responsibility
//! - Define the low-level primitives the high-level API is built on.
//! - Keep transport and storage details behind one trait.
//!
//! # Invariants
//! - Batched mutations report rejected request items instead of failing.
//! - Transport, storage and commission failures use `LedgerError`.
//! - `LedgerContext` is passed through unchanged on every call.

use crate::db::DbError;
use crate::model::quota::QuotaTuple;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;

pub use sqlite::SqliteLedger;

/// Opaque per-call context forwarded to the ledger.
pub type LedgerContext = BTreeMap<String, String>;

/// Transaction identifier returned by `issue_commission`.
pub type CommissionSerial = i64;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors raised on the ledger's own error channel.
#[derive(Debug)]
pub enum LedgerError {
    /// Backing store failure of a local ledger.
    Db(DbError),
    /// Local ledger connection is not at the expected schema version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Remote ledger unreachable or protocol failure.
    Transport(String),
    /// The ledger refused to issue a commission.
    CommissionRejected { reason: String },
    /// Accept referenced a serial that is not pending for this client.
    UnknownCommission { serial: CommissionSerial },
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "ledger requires schema version {expected_version}, got {actual_version}"
            ),
            Self::Transport(message) => write!(f, "ledger transport error: {message}"),
            Self::CommissionRejected { reason } => write!(f, "commission rejected: {reason}"),
            Self::UnknownCommission { serial } => {
                write!(f, "no pending commission with serial {serial}")
            }
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for LedgerError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// `(entity, resource, key)` lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetQuotaRequest {
    pub entity: String,
    pub resource: String,
    pub key: String,
}

/// `(entity, resource, key, quantity, capacity, import_limit, export_limit, flags)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetQuotaRequest {
    pub entity: String,
    pub resource: String,
    pub key: String,
    pub quantity: i64,
    pub capacity: i64,
    pub import_limit: i64,
    pub export_limit: i64,
    pub flags: i64,
}

/// `(entity, owner, key, owner_key)`; `key` becomes the new entity's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEntityRequest {
    pub entity: String,
    pub owner: String,
    pub key: String,
    pub owner_key: String,
}

/// `(entity, key)` used by `get_entity` and `release_entity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKeyRequest {
    pub entity: String,
    pub key: String,
}

/// One `(entity, resource, quantity)` line of a commission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provision {
    pub entity: String,
    pub resource: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCommissionRequest {
    pub target: String,
    pub key: String,
    pub client_key: String,
    pub owner: String,
    pub owner_key: String,
    pub provisions: Vec<Provision>,
}

/// Low-level quota holder primitives.
pub trait QuotaLedger {
    /// Lists entities owned by `entity`.
    fn list_entities(
        &self,
        context: &LedgerContext,
        entity: &str,
        key: &str,
    ) -> LedgerResult<Vec<String>>;
    /// Lists resource names with a quota row on `entity`.
    fn list_resources(
        &self,
        context: &LedgerContext,
        entity: &str,
        key: &str,
    ) -> LedgerResult<Vec<String>>;
    /// Returns one tuple per found row; unknown rows are omitted.
    fn get_quota(
        &self,
        context: &LedgerContext,
        requests: &[GetQuotaRequest],
    ) -> LedgerResult<Vec<QuotaTuple>>;
    /// Returns the rejected requests.
    fn set_quota(
        &self,
        context: &LedgerContext,
        requests: &[SetQuotaRequest],
    ) -> LedgerResult<Vec<SetQuotaRequest>>;
    /// Returns the rejected requests.
    fn create_entity(
        &self,
        context: &LedgerContext,
        requests: &[CreateEntityRequest],
    ) -> LedgerResult<Vec<CreateEntityRequest>>;
    /// Returns the owner of every found entity whose key matched.
    fn get_entity(
        &self,
        context: &LedgerContext,
        requests: &[EntityKeyRequest],
    ) -> LedgerResult<Vec<String>>;
    /// Returns the rejected requests.
    fn release_entity(
        &self,
        context: &LedgerContext,
        requests: &[EntityKeyRequest],
    ) -> LedgerResult<Vec<EntityKeyRequest>>;
    /// Reserves provisions for `target` and returns the pending serial.
    fn issue_commission(
        &self,
        context: &LedgerContext,
        request: &IssueCommissionRequest,
    ) -> LedgerResult<CommissionSerial>;
    /// Finalizes pending commissions issued with `client_key`.
    fn accept_commission(
        &self,
        context: &LedgerContext,
        client_key: &str,
        serials: &[CommissionSerial],
    ) -> LedgerResult<()>;
}
