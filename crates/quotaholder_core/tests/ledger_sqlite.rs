use quotaholder_core::db::migrations::latest_version;
use quotaholder_core::db::{open_db, open_db_in_memory, DbError};
use quotaholder_core::{
    CreateEntityRequest, EntityKeyRequest, IssueCommissionRequest, LedgerContext, LedgerError,
    Provision, QuotaLedger, SetQuotaRequest, SqliteLedger,
};
use rusqlite::Connection;

fn create(entity: &str, owner: &str, key: &str, owner_key: &str) -> CreateEntityRequest {
    CreateEntityRequest {
        entity: entity.to_string(),
        owner: owner.to_string(),
        key: key.to_string(),
        owner_key: owner_key.to_string(),
    }
}

fn quota(entity: &str, resource: &str, key: &str, quantity: i64) -> SetQuotaRequest {
    SetQuotaRequest {
        entity: entity.to_string(),
        resource: resource.to_string(),
        key: key.to_string(),
        quantity,
        capacity: quantity,
        import_limit: 0,
        export_limit: 0,
        flags: 0,
    }
}

#[test]
fn fresh_database_has_only_the_system_root() {
    let conn = open_db_in_memory().unwrap();
    let ledger = SqliteLedger::try_new(&conn).unwrap();
    let ctx = LedgerContext::new();

    let owners = ledger
        .get_entity(
            &ctx,
            &[EntityKeyRequest {
                entity: "system".to_string(),
                key: String::new(),
            }],
        )
        .unwrap();
    assert_eq!(owners, vec!["system"]);
    assert!(ledger.list_entities(&ctx, "system", "").unwrap().is_empty());
}

#[test]
fn create_entity_checks_owner_key_and_duplicates() {
    let conn = open_db_in_memory().unwrap();
    let ledger = SqliteLedger::try_new(&conn).unwrap();
    let ctx = LedgerContext::new();

    let rejected = ledger
        .create_entity(
            &ctx,
            &[
                create("system/a", "system", "a-key", ""),
                create("system/a", "system", "other", ""),
                create("system/a/b", "system/a", "", "wrong"),
                create("system/a/c", "system/a", "", "a-key"),
            ],
        )
        .unwrap();
    let rejected_names: Vec<_> = rejected.iter().map(|r| r.entity.as_str()).collect();
    assert_eq!(rejected_names, vec!["system/a", "system/a/b"]);
    assert_eq!(
        ledger.list_entities(&ctx, "system/a", "a-key").unwrap(),
        vec!["system/a/c"]
    );
    assert!(ledger.list_entities(&ctx, "system/a", "").unwrap().is_empty());
}

#[test]
fn set_quota_upserts_and_keeps_counters() {
    let conn = open_db_in_memory().unwrap();
    let ledger = SqliteLedger::try_new(&conn).unwrap();
    let ctx = LedgerContext::new();
    ledger
        .create_entity(&ctx, &[create("system/g", "system", "k", "")])
        .unwrap();

    assert!(ledger
        .set_quota(&ctx, &[quota("system/g", "cpu", "k", 10)])
        .unwrap()
        .is_empty());
    conn.execute(
        "UPDATE quotas SET exported = 3 WHERE entity = 'system/g';",
        [],
    )
    .unwrap();
    assert!(ledger
        .set_quota(&ctx, &[quota("system/g", "cpu", "k", 20)])
        .unwrap()
        .is_empty());

    let exported: i64 = conn
        .query_row(
            "SELECT exported FROM quotas WHERE entity = 'system/g' AND resource = 'cpu';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exported, 3);
    assert_eq!(ledger.list_resources(&ctx, "system/g", "k").unwrap(), vec!["cpu"]);
}

#[test]
fn system_root_cannot_be_released() {
    let conn = open_db_in_memory().unwrap();
    let ledger = SqliteLedger::try_new(&conn).unwrap();
    let rejected = ledger
        .release_entity(
            &LedgerContext::new(),
            &[EntityKeyRequest {
                entity: "system".to_string(),
                key: String::new(),
            }],
        )
        .unwrap();
    assert_eq!(rejected.len(), 1);
}

#[test]
fn accept_requires_matching_client_key() {
    let conn = open_db_in_memory().unwrap();
    let ledger = SqliteLedger::try_new(&conn).unwrap();
    let ctx = LedgerContext::new();
    ledger
        .create_entity(
            &ctx,
            &[create("system/src", "system", "", ""), create("system/dst", "system", "", "")],
        )
        .unwrap();
    ledger
        .set_quota(&ctx, &[quota("system/src", "cpu", "", 10)])
        .unwrap();

    let serial = ledger
        .issue_commission(
            &ctx,
            &IssueCommissionRequest {
                target: "system/dst".to_string(),
                key: String::new(),
                client_key: "client".to_string(),
                owner: "system/src".to_string(),
                owner_key: String::new(),
                provisions: vec![Provision {
                    entity: "system/src".to_string(),
                    resource: "cpu".to_string(),
                    quantity: 4,
                }],
            },
        )
        .unwrap();

    let err = ledger
        .accept_commission(&ctx, "intruder", &[serial])
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnknownCommission { serial: s } if s == serial));

    ledger.accept_commission(&ctx, "client", &[serial]).unwrap();
    assert!(matches!(
        ledger.accept_commission(&ctx, "client", &[serial]),
        Err(LedgerError::UnknownCommission { .. })
    ));
}

#[test]
fn ledger_refuses_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteLedger::try_new(&conn).err().unwrap();
    match err {
        LedgerError::UninitializedConnection {
            expected_version,
            actual_version,
        } => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn reopening_a_ledger_file_keeps_entities() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let ctx = LedgerContext::new();

    let conn = open_db(&path).unwrap();
    SqliteLedger::try_new(&conn)
        .unwrap()
        .create_entity(&ctx, &[create("system/groups", "system", "gk", "")])
        .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    let ledger = SqliteLedger::try_new(&conn).unwrap();
    assert_eq!(
        ledger.list_entities(&ctx, "system", "").unwrap(),
        vec!["system/groups"]
    );
}

#[test]
fn newer_schema_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}
