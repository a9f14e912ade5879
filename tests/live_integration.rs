use std::time::{SystemTime, UNIX_EPOCH};

use rqlite_http::{
    BackupOptions, CancellationToken, QueryOptions, QueryResults, RqliteClient, RqliteError,
    Statement, Value,
};

fn live_host() -> Option<String> {
    std::env::var("RQLITE_HTTP_E2E_HOST")
        .ok()
        .filter(|host| !host.trim().is_empty())
}

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock must be after epoch")
        .as_millis()
}

#[tokio::test]
async fn live_roundtrip_and_error_promotion() {
    let Some(host) = live_host() else {
        eprintln!("skipping live test: RQLITE_HTTP_E2E_HOST is not set");
        return;
    };

    let db = RqliteClient::new(&host).expect("client must build");
    let cancel = CancellationToken::new();
    let table = format!("users_live_{}", unique_suffix());

    db.execute_single(
        &cancel,
        &format!("CREATE TABLE {table} (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"),
        (),
    )
    .await
    .expect("table creation must succeed");

    let inserted = db
        .execute_single(
            &cancel,
            &format!("INSERT INTO {table} (name) VALUES (?)"),
            vec![Value::text("fiona")],
        )
        .await
        .expect("insert must succeed");
    assert_eq!(inserted.results[0].rows_affected, 1);

    let query = db
        .query(
            &cancel,
            &[Statement::new(
                format!("SELECT id, name FROM {table} WHERE name = :name"),
                rqlite_http::Params::named([("name", Value::text("fiona"))]),
            )],
            Some(&QueryOptions {
                associative: true,
                ..QueryOptions::default()
            }),
        )
        .await
        .expect("query must succeed");
    let QueryResults::Associative(results) = query.results else {
        panic!("expected associative results");
    };
    assert_eq!(results[0].rows.len(), 1);
    assert_eq!(results[0].rows[0]["name"], Value::text("fiona"));

    db.promote_errors(true);
    let err = db
        .execute(
            &cancel,
            &Statement::from_sql([
                format!("INSERT INTO {table} (name) VALUES ('declan')"),
                format!("INSER INTO {table} (name) VALUES ('nope')"),
            ]),
            None,
        )
        .await
        .expect_err("syntax error must be promoted");
    assert!(matches!(err, RqliteError::Statement { index: 1, .. }));
    db.promote_errors(false);

    let dump = db
        .backup(
            &cancel,
            Some(&BackupOptions {
                format: "sql".to_owned(),
                ..BackupOptions::default()
            }),
        )
        .await
        .expect("backup must start")
        .bytes()
        .await
        .expect("backup must stream");
    assert!(String::from_utf8_lossy(&dump).contains(&table));

    let version = db.version(&cancel).await.expect("version must succeed");
    assert_ne!(version, "unknown");

    db.execute_single(&cancel, &format!("DROP TABLE IF EXISTS {table}"), ())
        .await
        .expect("cleanup must succeed");
}
