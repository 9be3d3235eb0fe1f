#![allow(dead_code)]

use quotaholder_core::db::open_db_in_memory;
use quotaholder_core::{
    CommissionSerial, CreateEntityRequest, EntityKeyRequest, GetQuotaRequest, HighLevelApi,
    HlApiConfig, IssueCommissionRequest, LedgerContext, LedgerError, LedgerResult, QuotaLedger,
    QuotaTuple, SetQuotaRequest, SqliteLedger,
};
use std::cell::{Cell, RefCell};

pub const RESOURCES_KEY: &str = "res-key";
pub const GROUPS_KEY: &str = "grp-key";
pub const USERS_KEY: &str = "usr-key";

/// Wraps a ledger and records every primitive call.
pub struct RecordingLedger<L> {
    pub inner: L,
    pub calls: RefCell<Vec<&'static str>>,
    pub accepted: RefCell<Vec<CommissionSerial>>,
    pub contexts: RefCell<Vec<LedgerContext>>,
    pub fail_accept: Cell<bool>,
    pub duplicate_owners: Cell<bool>,
}

impl<L> RecordingLedger<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            calls: RefCell::new(Vec::new()),
            accepted: RefCell::new(Vec::new()),
            contexts: RefCell::new(Vec::new()),
            fail_accept: Cell::new(false),
            duplicate_owners: Cell::new(false),
        }
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.borrow().iter().filter(|call| **call == op).count()
    }

    pub fn reset(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, op: &'static str, context: &LedgerContext) {
        self.calls.borrow_mut().push(op);
        self.contexts.borrow_mut().push(context.clone());
    }
}

impl<L: QuotaLedger> QuotaLedger for RecordingLedger<L> {
    fn list_entities(
        &self,
        context: &LedgerContext,
        entity: &str,
        key: &str,
    ) -> LedgerResult<Vec<String>> {
        self.record("list_entities", context);
        self.inner.list_entities(context, entity, key)
    }

    fn list_resources(
        &self,
        context: &LedgerContext,
        entity: &str,
        key: &str,
    ) -> LedgerResult<Vec<String>> {
        self.record("list_resources", context);
        self.inner.list_resources(context, entity, key)
    }

    fn get_quota(
        &self,
        context: &LedgerContext,
        requests: &[GetQuotaRequest],
    ) -> LedgerResult<Vec<QuotaTuple>> {
        self.record("get_quota", context);
        self.inner.get_quota(context, requests)
    }

    fn set_quota(
        &self,
        context: &LedgerContext,
        requests: &[SetQuotaRequest],
    ) -> LedgerResult<Vec<SetQuotaRequest>> {
        self.record("set_quota", context);
        self.inner.set_quota(context, requests)
    }

    fn create_entity(
        &self,
        context: &LedgerContext,
        requests: &[CreateEntityRequest],
    ) -> LedgerResult<Vec<CreateEntityRequest>> {
        self.record("create_entity", context);
        self.inner.create_entity(context, requests)
    }

    fn get_entity(
        &self,
        context: &LedgerContext,
        requests: &[EntityKeyRequest],
    ) -> LedgerResult<Vec<String>> {
        self.record("get_entity", context);
        let mut owners = self.inner.get_entity(context, requests)?;
        if self.duplicate_owners.get() {
            owners.extend(owners.clone());
        }
        Ok(owners)
    }

    fn release_entity(
        &self,
        context: &LedgerContext,
        requests: &[EntityKeyRequest],
    ) -> LedgerResult<Vec<EntityKeyRequest>> {
        self.record("release_entity", context);
        self.inner.release_entity(context, requests)
    }

    fn issue_commission(
        &self,
        context: &LedgerContext,
        request: &IssueCommissionRequest,
    ) -> LedgerResult<CommissionSerial> {
        self.record("issue_commission", context);
        self.inner.issue_commission(context, request)
    }

    fn accept_commission(
        &self,
        context: &LedgerContext,
        client_key: &str,
        serials: &[CommissionSerial],
    ) -> LedgerResult<()> {
        self.record("accept_commission", context);
        self.accepted.borrow_mut().extend_from_slice(serials);
        if self.fail_accept.get() {
            return Err(LedgerError::Transport("connection reset".to_string()));
        }
        self.inner.accept_commission(context, client_key, serials)
    }
}

pub type TestApi<'conn> = HighLevelApi<RecordingLedger<SqliteLedger<'conn>>>;

pub fn setup() -> rusqlite::Connection {
    open_db_in_memory().unwrap()
}

pub fn root_config() -> HlApiConfig {
    HlApiConfig::new()
        .with_resources_key(RESOURCES_KEY)
        .with_groups_key(GROUPS_KEY)
        .with_users_key(USERS_KEY)
}

pub fn api(conn: &rusqlite::Connection) -> TestApi<'_> {
    api_with(conn, root_config())
}

pub fn api_with(conn: &rusqlite::Connection, config: HlApiConfig) -> TestApi<'_> {
    let ledger = RecordingLedger::new(SqliteLedger::try_new(conn).unwrap());
    HighLevelApi::new(ledger, config).unwrap()
}
