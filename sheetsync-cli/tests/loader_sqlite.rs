//! Bulk loader against an in-memory SQLite database

use pretty_assertions::assert_eq;
use sheetsync::db::{Executor, SqliteExecutor, Statement};
use sheetsync::load::{BatchFailurePolicy, BulkLoader, LoadError, LoadOptions};
use sheetsync::table::{Cell, Table};

async fn store() -> SqliteExecutor {
    let exec = SqliteExecutor::in_memory().await.unwrap();
    exec.execute(&Statement::new(
        "CREATE TABLE msgs (message_id BIGINT NOT NULL, status TEXT, content TEXT)",
    ))
    .await
    .unwrap();
    exec
}

fn sheet(rows: Vec<Vec<Cell>>) -> Table {
    Table::from_rows(["Message Id", "Status", "Content"], rows).unwrap()
}

async fn stored(exec: &SqliteExecutor) -> Table {
    exec.fetch(&Statement::new(
        "SELECT message_id, status, content FROM msgs ORDER BY rowid",
    ))
    .await
    .unwrap()
}

#[tokio::test]
async fn loads_rows_in_order_with_sanitized_values() {
    let exec = store().await;
    let table = sheet(vec![
        vec![Cell::Int(1), Cell::from("sent"), Cell::from("it's here")],
        vec![Cell::Int(2), Cell::from("None"), Cell::from("plain")],
        vec![Cell::Int(3), Cell::from("read"), Cell::Float(f64::NAN)],
    ]);

    let report = BulkLoader::new(&exec)
        .load(&table, "msgs", &LoadOptions::builder().chunk_size(2).build())
        .await
        .unwrap();

    assert_eq!(report.rows_loaded, 3);
    assert_eq!(report.batches.len(), 2);

    let rows = stored(&exec).await;
    assert_eq!(rows.columns(), ["message_id", "status", "content"]);
    assert_eq!(
        rows.rows(),
        [
            vec![Cell::Int(1), Cell::from("sent"), Cell::from("it\"s here")],
            vec![Cell::Int(2), Cell::Null, Cell::from("plain")],
            vec![Cell::Int(3), Cell::from("read"), Cell::Null],
        ]
    );
}

#[tokio::test]
async fn refresh_replaces_previous_contents() {
    let exec = store().await;
    let table = sheet(vec![
        vec![Cell::Int(1), Cell::from("sent"), Cell::Null],
        vec![Cell::Int(2), Cell::from("read"), Cell::Null],
    ]);
    let loader = BulkLoader::new(&exec);

    loader
        .load(&table, "msgs", &LoadOptions::default())
        .await
        .unwrap();
    loader
        .load(&table, "msgs", &LoadOptions::default())
        .await
        .unwrap();
    assert_eq!(stored(&exec).await.len(), 4);

    let report = loader
        .load(&table, "msgs", &LoadOptions::builder().refresh(true).build())
        .await
        .unwrap();
    assert!(report.refreshed);
    assert_eq!(stored(&exec).await.len(), 2);
}

#[tokio::test]
async fn rejected_batch_is_reported_and_others_land() {
    let exec = store().await;
    let table = sheet(vec![
        vec![Cell::Int(1), Cell::from("sent"), Cell::Null],
        vec![Cell::Null, Cell::from("broken"), Cell::Null],
        vec![Cell::Int(3), Cell::from("read"), Cell::Null],
    ]);

    let report = BulkLoader::new(&exec)
        .load(&table, "msgs", &LoadOptions::builder().chunk_size(1).build())
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.rows_loaded, 2);
    let failed: Vec<usize> = report.failed_batches().map(|b| b.index).collect();
    assert_eq!(failed, vec![1]);

    let ids: Vec<Cell> = stored(&exec)
        .await
        .column("message_id")
        .unwrap()
        .cloned()
        .collect();
    assert_eq!(ids, vec![Cell::Int(1), Cell::Int(3)]);
}

#[tokio::test]
async fn abort_policy_stops_at_rejected_batch() {
    let exec = store().await;
    let table = sheet(vec![
        vec![Cell::Int(1), Cell::from("sent"), Cell::Null],
        vec![Cell::Null, Cell::from("broken"), Cell::Null],
        vec![Cell::Int(3), Cell::from("read"), Cell::Null],
    ]);
    let options = LoadOptions::builder()
        .chunk_size(1)
        .on_batch_error(BatchFailurePolicy::Abort)
        .build();

    let err = BulkLoader::new(&exec)
        .load(&table, "msgs", &options)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LoadError::BatchAborted {
            batch: 1,
            rows_loaded: 1,
            ..
        }
    ));
    assert_eq!(stored(&exec).await.len(), 1);
}

#[tokio::test]
async fn empty_sheet_leaves_table_untouched() {
    let exec = store().await;
    exec.execute(
        &Statement::new("INSERT INTO msgs (message_id) VALUES (?1)").bind("7".to_string()),
    )
    .await
    .unwrap();

    let report = BulkLoader::new(&exec)
        .load(
            &sheet(Vec::new()),
            "msgs",
            &LoadOptions::builder().refresh(true).build(),
        )
        .await
        .unwrap();

    assert_eq!(report.rows_total, 0);
    assert_eq!(stored(&exec).await.len(), 1);
}

#[tokio::test]
async fn unknown_column_fails_the_batch() {
    let exec = store().await;
    let table = Table::from_rows(["Nope"], vec![vec![Cell::from("x")]]).unwrap();

    let report = BulkLoader::new(&exec)
        .load(&table, "msgs", &LoadOptions::default())
        .await
        .unwrap();

    assert_eq!(report.rows_loaded, 0);
    assert_eq!(report.failed_batches().count(), 1);
}

#[tokio::test]
async fn repeated_spaces_in_headers_are_kept() {
    let exec = store().await;
    exec.execute(&Statement::new("CREATE TABLE spaced (message__id BIGINT, \"_note_\" TEXT)"))
        .await
        .unwrap();
    let table = Table::from_rows(
        ["Message  Id", " Note "],
        vec![vec![Cell::Int(5), Cell::from("x")]],
    )
    .unwrap();

    let report = BulkLoader::new(&exec)
        .load(&table, "spaced", &LoadOptions::default())
        .await
        .unwrap();
    assert!(report.is_complete());

    let rows = exec
        .fetch(&Statement::new("SELECT message__id, \"_note_\" FROM spaced"))
        .await
        .unwrap();
    assert_eq!(rows.columns(), ["message__id", "_note_"]);
    assert_eq!(rows.rows(), [vec![Cell::Int(5), Cell::from("x")]]);
}
