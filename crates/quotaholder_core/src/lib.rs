//! High-level quota holder API.
//!
//! Defines global resources, groups and users as a node hierarchy over a
//! quota ledger, attaches quota attributes to them, and transfers quota with
//! the ledger's issue/accept commissioning protocol.

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod naming;
pub mod node_keys;
pub mod service;

pub use config::{HlApiConfig, LedgerEndpoint};
pub use error::{HlApiError, HlApiResult};
pub use ledger::{
    CommissionSerial, CreateEntityRequest, EntityKeyRequest, GetQuotaRequest,
    IssueCommissionRequest, LedgerContext, LedgerError, LedgerResult, Provision, QuotaLedger,
    SetQuotaRequest, SqliteLedger,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::quota::{Quota, QuotaTuple, QuotaValue};
pub use naming::{GROUPS_NODE, RESOURCES_NODE, SYSTEM_NODE, USERS_NODE};
pub use node_keys::NodeKeyCache;
pub use service::commission::OneCommission;
pub use service::definitions::{
    attribute_key, AttributeScope, GroupResourceLimits, QuotaLimits, DEF_PERGROUP, DEF_PERUSER,
    OPERATIONAL,
};
pub use service::hlapi::HighLevelApi;
