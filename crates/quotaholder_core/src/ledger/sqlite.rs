//! SQLite-backed quota ledger for local development and tests.
//!
//! # Responsibility
//! - Implement `QuotaLedger` over a migrated `db` connection.
//! - Enforce entity keys the way a production quota holder does.
//!
//! # Invariants
//! - `system` owns itself and can never be created or released.
//! - Every mutation requires the key of the entity it touches; creation
//!   requires the owner's key.
//! - Batched mutations run in one transaction per call.
//! - Accepting a commission moves each provision into the source row's
//!   `exported` counter and the target row's `imported` counter.

use super::{
    CommissionSerial, CreateEntityRequest, EntityKeyRequest, GetQuotaRequest,
    IssueCommissionRequest, LedgerContext, LedgerError, LedgerResult, QuotaLedger,
    SetQuotaRequest,
};
use crate::db::migrations::latest_version;
use crate::model::quota::QuotaTuple;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const ROOT_ENTITY: &str = "system";

/// Ledger implementation over a borrowed SQLite connection.
pub struct SqliteLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLedger<'conn> {
    /// Creates a ledger from a connection opened with `db::open_db*`.
    pub fn try_new(conn: &'conn Connection) -> LedgerResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(LedgerError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl QuotaLedger for SqliteLedger<'_> {
    fn list_entities(
        &self,
        _context: &LedgerContext,
        entity: &str,
        key: &str,
    ) -> LedgerResult<Vec<String>> {
        if !key_matches(self.conn, entity, key)? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT entity FROM entities
             WHERE owner = ?1 AND entity != owner
             ORDER BY entity ASC;",
        )?;
        let names = stmt
            .query_map([entity], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn list_resources(
        &self,
        _context: &LedgerContext,
        entity: &str,
        key: &str,
    ) -> LedgerResult<Vec<String>> {
        if !key_matches(self.conn, entity, key)? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT resource FROM quotas
             WHERE entity = ?1
             ORDER BY resource ASC;",
        )?;
        let names = stmt
            .query_map([entity], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn get_quota(
        &self,
        _context: &LedgerContext,
        requests: &[GetQuotaRequest],
    ) -> LedgerResult<Vec<QuotaTuple>> {
        let mut found = Vec::new();
        for request in requests {
            if !key_matches(self.conn, &request.entity, &request.key)? {
                continue;
            }
            let row = self
                .conn
                .query_row(
                    "SELECT entity, resource, quantity, capacity, import_limit, export_limit,
                            imported, exported, returned, released, flags
                     FROM quotas
                     WHERE entity = ?1 AND resource = ?2;",
                    params![request.entity, request.resource],
                    parse_quota_row,
                )
                .optional()?;
            found.extend(row);
        }
        Ok(found)
    }

    fn set_quota(
        &self,
        _context: &LedgerContext,
        requests: &[SetQuotaRequest],
    ) -> LedgerResult<Vec<SetQuotaRequest>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut rejected = Vec::new();
        for request in requests {
            if !key_matches(&tx, &request.entity, &request.key)? {
                warn!(
                    "event=ledger_reject module=ledger op=set_quota entity={} resource={}",
                    request.entity, request.resource
                );
                rejected.push(request.clone());
                continue;
            }
            tx.execute(
                "INSERT INTO quotas (
                    entity, resource, quantity, capacity, import_limit, export_limit, flags
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (entity, resource) DO UPDATE SET
                    quantity = excluded.quantity,
                    capacity = excluded.capacity,
                    import_limit = excluded.import_limit,
                    export_limit = excluded.export_limit,
                    flags = excluded.flags,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![
                    request.entity,
                    request.resource,
                    request.quantity,
                    request.capacity,
                    request.import_limit,
                    request.export_limit,
                    request.flags,
                ],
            )?;
        }
        tx.commit()?;
        Ok(rejected)
    }

    fn create_entity(
        &self,
        _context: &LedgerContext,
        requests: &[CreateEntityRequest],
    ) -> LedgerResult<Vec<CreateEntityRequest>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut rejected = Vec::new();
        for request in requests {
            let exists = entity_key(&tx, &request.entity)?.is_some();
            if exists || !key_matches(&tx, &request.owner, &request.owner_key)? {
                warn!(
                    "event=ledger_reject module=ledger op=create_entity entity={} owner={} exists={}",
                    request.entity, request.owner, exists
                );
                rejected.push(request.clone());
                continue;
            }
            tx.execute(
                "INSERT INTO entities (entity, owner, entity_key) VALUES (?1, ?2, ?3);",
                params![request.entity, request.owner, request.key],
            )?;
            debug!(
                "event=ledger_entity_created module=ledger entity={} owner={}",
                request.entity, request.owner
            );
        }
        tx.commit()?;
        Ok(rejected)
    }

    fn get_entity(
        &self,
        _context: &LedgerContext,
        requests: &[EntityKeyRequest],
    ) -> LedgerResult<Vec<String>> {
        let mut owners = Vec::new();
        for request in requests {
            let owner = self
                .conn
                .query_row(
                    "SELECT owner FROM entities WHERE entity = ?1 AND entity_key = ?2;",
                    params![request.entity, request.key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            owners.extend(owner);
        }
        Ok(owners)
    }

    fn release_entity(
        &self,
        _context: &LedgerContext,
        requests: &[EntityKeyRequest],
    ) -> LedgerResult<Vec<EntityKeyRequest>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut rejected = Vec::new();
        for request in requests {
            let releasable = request.entity != ROOT_ENTITY
                && key_matches(&tx, &request.entity, &request.key)?
                && !has_dependents(&tx, &request.entity)?;
            if !releasable {
                warn!(
                    "event=ledger_reject module=ledger op=release_entity entity={}",
                    request.entity
                );
                rejected.push(request.clone());
                continue;
            }
            tx.execute("DELETE FROM entities WHERE entity = ?1;", [&request.entity])?;
        }
        tx.commit()?;
        Ok(rejected)
    }

    fn issue_commission(
        &self,
        _context: &LedgerContext,
        request: &IssueCommissionRequest,
    ) -> LedgerResult<CommissionSerial> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !key_matches(&tx, &request.target, &request.key)? {
            return Err(rejected_commission(format!(
                "target `{}` not found or key mismatch",
                request.target
            )));
        }
        if !key_matches(&tx, &request.owner, &request.owner_key)? {
            return Err(rejected_commission(format!(
                "owner `{}` not found or key mismatch",
                request.owner
            )));
        }
        if request.provisions.is_empty() {
            return Err(rejected_commission("no provisions".to_string()));
        }

        for provision in &request.provisions {
            let available = tx
                .query_row(
                    "SELECT quantity + imported - exported FROM quotas
                     WHERE entity = ?1 AND resource = ?2;",
                    params![provision.entity, provision.resource],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            match available {
                None => {
                    return Err(rejected_commission(format!(
                        "no quota for `{}` on `{}`",
                        provision.resource, provision.entity
                    )));
                }
                Some(available) if available < provision.quantity => {
                    return Err(rejected_commission(format!(
                        "`{}` on `{}` has {available} available, {} requested",
                        provision.resource, provision.entity, provision.quantity
                    )));
                }
                Some(_) => {}
            }
        }

        tx.execute(
            "INSERT INTO commissions (target, client_key, owner) VALUES (?1, ?2, ?3);",
            params![request.target, request.client_key, request.owner],
        )?;
        let serial = tx.last_insert_rowid();
        for (position, provision) in request.provisions.iter().enumerate() {
            tx.execute(
                "INSERT INTO provisions (serial, position, entity, resource, quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    serial,
                    position as i64,
                    provision.entity,
                    provision.resource,
                    provision.quantity,
                ],
            )?;
        }
        tx.commit()?;
        debug!(
            "event=ledger_commission_issued module=ledger serial={serial} target={}",
            request.target
        );
        Ok(serial)
    }

    fn accept_commission(
        &self,
        _context: &LedgerContext,
        client_key: &str,
        serials: &[CommissionSerial],
    ) -> LedgerResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for &serial in serials {
            let target = tx
                .query_row(
                    "SELECT target FROM commissions
                     WHERE serial = ?1 AND client_key = ?2 AND state = 'pending';",
                    params![serial, client_key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
                .ok_or(LedgerError::UnknownCommission { serial })?;

            tx.execute(
                "UPDATE quotas
                 SET exported = exported + p.quantity
                 FROM provisions p
                 WHERE p.serial = ?1
                   AND quotas.entity = p.entity
                   AND quotas.resource = p.resource;",
                [serial],
            )?;
            tx.execute(
                "UPDATE quotas
                 SET imported = imported + p.quantity
                 FROM provisions p
                 WHERE p.serial = ?1
                   AND quotas.entity = ?2
                   AND quotas.resource = p.resource;",
                params![serial, target],
            )?;
            tx.execute(
                "UPDATE commissions
                 SET state = 'accepted',
                     accepted_at = (strftime('%s', 'now') * 1000)
                 WHERE serial = ?1;",
                [serial],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn rejected_commission(reason: String) -> LedgerError {
    warn!("event=ledger_reject module=ledger op=issue_commission reason={reason}");
    LedgerError::CommissionRejected { reason }
}

fn entity_key(conn: &Connection, entity: &str) -> LedgerResult<Option<String>> {
    let key = conn
        .query_row(
            "SELECT entity_key FROM entities WHERE entity = ?1;",
            [entity],
            |row| row.get(0),
        )
        .optional()?;
    Ok(key)
}

fn key_matches(conn: &Connection, entity: &str, key: &str) -> LedgerResult<bool> {
    Ok(entity_key(conn, entity)?.is_some_and(|stored| stored == key))
}

fn has_dependents(conn: &Connection, entity: &str) -> LedgerResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM entities WHERE owner = ?1 AND entity != owner)
             OR EXISTS(SELECT 1 FROM commissions WHERE target = ?1 OR owner = ?1);",
        [entity],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_quota_row(row: &Row<'_>) -> rusqlite::Result<QuotaTuple> {
    Ok((
        row.get("entity")?,
        row.get("resource")?,
        row.get("quantity")?,
        row.get("capacity")?,
        row.get("import_limit")?,
        row.get("export_limit")?,
        row.get("imported")?,
        row.get("exported")?,
        row.get("returned")?,
        row.get("released")?,
        row.get("flags")?,
    ))
}
