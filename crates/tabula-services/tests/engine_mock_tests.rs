//! Engine behavior against a scripted connection
//!
//! The mock records every statement, so these tests assert both the SQL the
//! engine sends and the cases where it must send nothing at all.

mod common;

use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tabula_core::Value;
use tabula_services::{
    BeginOutcome, CommitOutcome, EditSessionManager, EditState, KeyMode, KeyResolver, RowId,
    RowStore, SchemaIntrospector, TableDescriptor, WarningState, test_connection,
};

use common::{MockConnection, MockSource, count_result, init_tracing, map, mock_query_result, row};

fn users_db() -> MockConnection {
    MockConnection::new("postgres")
        .with_table(
            "users",
            &[
                ("id", "integer", false),
                ("email", "text", false),
                ("name", "text", true),
            ],
        )
        .with_primary_key("users", &["id"])
        .with_unique("users", &["email"])
        .with_table("tags", &[("code", "text", false), ("label", "text", true)])
        .with_unique("tags", &["code"])
        .with_table("notes", &[("body", "text", true), ("author", "text", true)])
}

struct Engine {
    source: Arc<MockSource>,
    store: Arc<RowStore>,
    introspector: Arc<SchemaIntrospector>,
}

impl Engine {
    fn new(connection: MockConnection) -> Self {
        init_tracing();
        let source = Arc::new(MockSource::new(connection));
        Self {
            store: Arc::new(RowStore::new(source.clone())),
            introspector: Arc::new(SchemaIntrospector::new(source.clone())),
            source,
        }
    }

    fn manager(&self) -> EditSessionManager {
        EditSessionManager::new(self.store.clone(), self.introspector.clone())
    }

    fn executes(&self) -> Vec<common::Call> {
        self.source.connection().executes()
    }
}

// ============ Key resolution ============

#[rstest]
#[case::primary_key_wins_over_unique("users", KeyMode::PrimaryKey, vec!["id"])]
#[case::unique_without_primary_key("tags", KeyMode::Unique, vec!["code"])]
#[case::full_row_without_any_key("notes", KeyMode::FullRow, vec![])]
#[tokio::test]
async fn resolves_keys_in_priority_order(
    #[case] table: &str,
    #[case] mode: KeyMode,
    #[case] columns: Vec<&str>,
) {
    let engine = Engine::new(users_db());
    let keys = KeyResolver::new(engine.introspector.clone())
        .resolve_keys(table)
        .await;
    assert_eq!(keys.mode(), mode);
    assert_eq!(keys.columns(), columns.as_slice());
}

#[tokio::test]
async fn catalog_failures_degrade_to_empty_lookups() {
    let engine = Engine::new(users_db().with_catalog_failure());
    assert!(engine.introspector.list_columns("users").await.is_empty());
    assert!(engine.introspector.list_primary_key_columns("users").await.is_empty());
    assert!(engine.introspector.list_unique_columns("users").await.is_empty());
    assert!(engine.introspector.list_tables().await.is_err());
}

// ============ Schema introspector ============

#[tokio::test]
async fn list_tables_counts_rows_and_tolerates_count_failures() {
    let engine = Engine::new(
        users_db()
            .with_query_response("FROM \"users\"", count_result(42))
            .with_failing_query("FROM \"tags\""),
    );

    let tables = engine.introspector.list_tables().await.unwrap();
    let summary: Vec<(&str, i64)> = tables
        .iter()
        .map(|t| (t.name.as_str(), t.row_count))
        .collect();
    assert_eq!(summary, vec![("notes", 0), ("tags", 0), ("users", 42)]);
}

#[tokio::test]
async fn columns_come_back_in_ordinal_order() {
    let engine = Engine::new(users_db());
    assert_eq!(
        engine.introspector.list_column_names("users").await,
        vec!["id".to_string(), "email".to_string(), "name".to_string()]
    );
}

// ============ Row store ============

#[tokio::test]
async fn read_rows_fetches_one_past_the_cap_and_flags_truncation() {
    let rows = (0..4).map(|i| vec![Value::Int64(i)]).collect();
    let engine = Engine::new(
        users_db().with_query_response("SELECT *", mock_query_result(vec!["id"], rows)),
    );
    let store = RowStore::new(engine.source.clone()).with_row_cap(3);

    let data = store.read_rows("users").await.unwrap();
    assert_eq!(data.columns, vec!["id".to_string()]);
    assert_eq!(data.len(), 3);
    assert!(data.truncated);

    let calls = engine.source.connection().calls();
    assert_eq!(calls[0].sql(), "SELECT * FROM \"users\" LIMIT 4");
}

#[tokio::test]
async fn null_keys_match_with_is_null() {
    let engine = Engine::new(users_db());
    let deleted = engine
        .store
        .delete_row(
            "notes",
            &map(&[("body", Value::String("hi".into())), ("author", Value::Null)]),
        )
        .await;
    assert!(deleted);

    let executes = engine.executes();
    assert_eq!(
        executes[0].sql(),
        "DELETE FROM \"notes\" WHERE \"body\" = $1 AND \"author\" IS NULL"
    );
    assert_eq!(executes[0].params(), &[Value::String("hi".into())]);
}

#[tokio::test]
async fn zero_affected_rows_is_a_failed_update() {
    let engine = Engine::new(users_db().with_affected_rows(0));
    let updated = engine
        .store
        .update_row(
            "users",
            &map(&[("name", Value::String("x".into()))]),
            &map(&[("id", Value::Int64(9))]),
        )
        .await;
    assert!(!updated);
}

#[tokio::test]
async fn insert_requires_exactly_one_affected_row() {
    let engine = Engine::new(users_db().with_affected_rows(2));
    let values = map(&[("id", Value::Int64(1))]);
    assert!(!engine.store.insert_row("users", &values).await);
}

#[tokio::test]
async fn full_match_update_sets_only_changed_columns() {
    let engine = Engine::new(users_db());
    let original = map(&[
        ("body", Value::String("old".into())),
        ("author", Value::Null),
    ]);
    let new_values = map(&[
        ("body", Value::String("new".into())),
        ("author", Value::Null),
    ]);

    assert!(
        engine
            .store
            .update_row_by_full_match("notes", &new_values, &original)
            .await
    );
    let executes = engine.executes();
    assert_eq!(
        executes[0].sql(),
        "UPDATE \"notes\" SET \"body\" = $1 WHERE \"body\" = $2 AND \"author\" IS NULL"
    );

    // identical values: no statement at all
    assert!(
        !engine
            .store
            .update_row_by_full_match("notes", &original, &original)
            .await
    );
    assert_eq!(engine.executes().len(), 1);
}

#[rstest]
#[case::semicolon("users; DROP TABLE users")]
#[case::space("user accounts")]
#[case::quote("users\"")]
#[case::dotted("public.users")]
#[case::empty("")]
#[tokio::test]
async fn invalid_table_names_never_acquire_a_connection(#[case] table: &str) {
    let engine = Engine::new(users_db());
    let values = map(&[("id", Value::Int64(1))]);

    assert!(engine.store.read_rows(table).await.is_none());
    assert_eq!(engine.store.row_count(table).await, 0);
    assert!(!engine.store.insert_row(table, &values).await);
    assert!(!engine.store.update_row(table, &values, &values).await);
    assert!(!engine.store.delete_row(table, &values).await);
    assert!(engine.introspector.list_columns(table).await.is_empty());
    assert!(engine.introspector.list_primary_key_columns(table).await.is_empty());
    assert!(engine.introspector.list_unique_columns(table).await.is_empty());
    assert!(!engine.manager().add_row(table).await);

    assert_eq!(engine.source.acquisitions(), 0);
    assert!(engine.source.connection().calls().is_empty());
}

#[tokio::test]
async fn invalid_column_names_never_acquire_a_connection() {
    let engine = Engine::new(users_db());
    let bad = map(&[("name = name; --", Value::Int64(1))]);
    let good = map(&[("id", Value::Int64(1))]);

    assert!(!engine.store.insert_row("users", &bad).await);
    assert!(!engine.store.update_row("users", &bad, &good).await);
    assert!(!engine.store.update_row("users", &good, &bad).await);
    assert!(!engine.store.delete_row("users", &bad).await);
    assert_eq!(engine.source.acquisitions(), 0);
}

// ============ Edit sessions ============

fn user_row(name: &str) -> tabula_core::Row {
    row(&[
        ("id", Value::Int64(1)),
        ("email", Value::String("a@example.com".into())),
        ("name", Value::String(name.into())),
    ])
}

#[tokio::test]
async fn commit_without_changes_issues_no_statement() {
    let engine = Engine::new(users_db());
    let mut manager = engine.manager();
    let mut current = user_row("Ann");

    let table = TableDescriptor::named("users");
    assert_eq!(
        manager.begin_edit(&table, RowId(1), &current).await,
        BeginOutcome::Started
    );
    assert_eq!(manager.state(RowId(1)), EditState::Editing);

    assert_eq!(
        manager.commit_edit(RowId(1), &mut current).await,
        CommitOutcome::NoChanges
    );
    assert!(engine.executes().is_empty());
    assert_eq!(manager.state(RowId(1)), EditState::Idle);
}

#[tokio::test]
async fn commit_updates_changed_columns_by_primary_key() {
    let engine = Engine::new(users_db());
    let mut manager = engine.manager();
    let mut current = user_row("Ann");

    manager
        .begin_edit(&TableDescriptor::named("users"), RowId(1), &current)
        .await;
    current.set("name", Value::String("Bea".into()));

    assert_eq!(
        manager.commit_edit(RowId(1), &mut current).await,
        CommitOutcome::Committed {
            changed_columns: vec!["name".into()]
        }
    );
    let executes = engine.executes();
    assert_eq!(executes.len(), 1);
    assert_eq!(
        executes[0].sql(),
        "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = $2"
    );
    assert_eq!(
        executes[0].params(),
        &[Value::String("Bea".into()), Value::Int64(1)]
    );
}

#[tokio::test]
async fn editing_a_key_column_matches_on_the_full_original_row() {
    let engine = Engine::new(users_db());
    let mut manager = engine.manager();
    let mut current = user_row("Ann");

    manager
        .begin_edit(&TableDescriptor::named("users"), RowId(1), &current)
        .await;
    current.set("id", Value::Int64(2));

    assert!(matches!(
        manager.commit_edit(RowId(1), &mut current).await,
        CommitOutcome::Committed { .. }
    ));
    assert_eq!(
        engine.executes()[0].sql(),
        "UPDATE \"users\" SET \"id\" = $1 WHERE \"id\" = $2 AND \"email\" = $3 AND \"name\" = $4"
    );
}

#[tokio::test]
async fn failed_commit_restores_the_snapshot() {
    let engine = Engine::new(users_db().with_execute_error("23505"));
    let mut manager = engine.manager();
    let mut current = user_row("Ann");

    manager
        .begin_edit(&TableDescriptor::named("users"), RowId(1), &current)
        .await;
    current.set("name", Value::String("Bea".into()));
    current.set("email", Value::Null);

    assert_eq!(
        manager.commit_edit(RowId(1), &mut current).await,
        CommitOutcome::Failed
    );
    assert_eq!(current, user_row("Ann"));
    assert_eq!(manager.state(RowId(1)), EditState::Idle);
}

#[tokio::test]
async fn cancel_restores_every_column() {
    let engine = Engine::new(users_db());
    let mut manager = engine.manager();
    let mut current = user_row("Ann");

    manager
        .begin_edit(&TableDescriptor::named("users"), RowId(5), &current)
        .await;
    current.set("name", Value::Null);
    current.set("email", Value::String("changed@example.com".into()));

    assert!(manager.cancel_edit(RowId(5), &mut current));
    assert_eq!(current, user_row("Ann"));
    assert_eq!(manager.state(RowId(5)), EditState::Idle);
    assert!(!manager.cancel_edit(RowId(5), &mut current));
    assert!(engine.executes().is_empty());
}

#[tokio::test]
async fn second_begin_keeps_the_first_snapshot() {
    let engine = Engine::new(users_db());
    let mut manager = engine.manager();
    let table = TableDescriptor::named("users");

    manager.begin_edit(&table, RowId(1), &user_row("Ann")).await;
    assert_eq!(
        manager.begin_edit(&table, RowId(1), &user_row("Zed")).await,
        BeginOutcome::AlreadyEditing
    );

    let session = manager.session(RowId(1)).unwrap();
    assert_eq!(session.original.get("name"), Some(&Value::String("Ann".into())));
}

#[tokio::test]
async fn commit_without_session_is_reported() {
    let engine = Engine::new(users_db());
    let mut manager = engine.manager();
    let mut current = user_row("Ann");
    assert_eq!(
        manager.commit_edit(RowId(3), &mut current).await,
        CommitOutcome::NoSession
    );
}

#[tokio::test]
async fn keyless_tables_ask_once_and_respect_refusal() {
    let engine = Engine::new(users_db());
    let note = row(&[("body", Value::String("hi".into())), ("author", Value::Null)]);
    let table = TableDescriptor::named("notes");

    let mut refusing = engine.manager();
    assert_eq!(
        refusing.begin_edit(&table, RowId(1), &note).await,
        BeginOutcome::Declined
    );
    assert_eq!(refusing.state(RowId(1)), EditState::Idle);

    let asked = Arc::new(AtomicUsize::new(0));
    let counter = asked.clone();
    let mut accepting = engine.manager().with_prompt(move |_table: String| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }
    });
    assert_eq!(
        accepting.begin_edit(&table, RowId(1), &note).await,
        BeginOutcome::Started
    );
    assert_eq!(
        accepting.begin_edit(&table, RowId(2), &note).await,
        BeginOutcome::Started
    );
    assert_eq!(asked.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn suppressed_warnings_skip_the_prompt() {
    let engine = Engine::new(users_db());
    let note = row(&[("body", Value::String("hi".into())), ("author", Value::Null)]);
    let mut manager = engine
        .manager()
        .with_warning_state(WarningState::suppressed());

    assert_eq!(
        manager
            .begin_edit(&TableDescriptor::named("notes"), RowId(1), &note)
            .await,
        BeginOutcome::Started
    );
}

#[tokio::test]
async fn keyless_commit_matches_every_original_value() {
    let engine = Engine::new(users_db());
    let mut note = row(&[("body", Value::String("hi".into())), ("author", Value::Null)]);
    let mut manager = engine
        .manager()
        .with_warning_state(WarningState::suppressed());

    manager
        .begin_edit(&TableDescriptor::named("notes"), RowId(1), &note)
        .await;
    note.set("author", Value::String("kim".into()));
    manager.commit_edit(RowId(1), &mut note).await;

    let executes = engine.executes();
    assert_eq!(
        executes[0].sql(),
        "UPDATE \"notes\" SET \"author\" = $1 WHERE \"body\" = $2 AND \"author\" IS NULL"
    );
}

#[tokio::test]
async fn add_row_fills_required_columns_without_defaults() {
    let engine = Engine::new(
        MockConnection::new("sqlite")
            .with_table(
                "items",
                &[
                    ("id", "INTEGER", false),
                    ("qty", "integer", false),
                    ("price", "numeric", false),
                    ("active", "boolean", false),
                    ("title", "text", false),
                    ("note", "text", true),
                ],
            )
            .with_default("items", "id", "nextval('items_id_seq')"),
    );
    let mut manager = engine.manager();

    assert!(manager.add_row("items").await);
    let executes = engine.executes();
    assert_eq!(
        executes[0].sql(),
        "INSERT INTO \"items\" (\"qty\", \"price\", \"active\", \"title\") VALUES (?, ?, ?, ?)"
    );
    assert_eq!(
        executes[0].params(),
        &[
            Value::Int64(0),
            Value::Float64(0.0),
            Value::Bool(false),
            Value::String("new value".into()),
        ]
    );
}

#[tokio::test]
async fn add_row_without_required_columns_does_nothing() {
    let engine = Engine::new(users_db());
    let mut manager = engine.manager();
    assert!(!manager.add_row("notes").await);
    assert!(engine.executes().is_empty());
}

#[tokio::test]
async fn transitions_are_recorded_in_the_transaction_log() {
    let engine = Engine::new(users_db());
    let mut manager = engine.manager();
    let mut current = user_row("Ann");

    manager
        .begin_edit(&TableDescriptor::named("users"), RowId(1), &current)
        .await;
    current.set("name", Value::String("Bea".into()));
    manager.commit_edit(RowId(1), &mut current).await;

    let messages: Vec<String> = manager
        .transaction_log()
        .entries()
        .iter()
        .map(|e| e.message.clone())
        .collect();
    assert!(messages[0].starts_with("Begin edit of row #1 in users"));
    assert!(messages.iter().any(|m| m.contains("name: Ann -> Bea")));
    assert!(messages.last().unwrap().ends_with("committed"));

    manager.clear_log();
    assert!(manager.transaction_log().is_empty());
}

// ============ Connection test ============

#[tokio::test]
async fn connection_test_reports_server_details() {
    let source = MockSource::new(users_db());
    let report = test_connection(&source).await;
    assert!(report.connected);
    let info = report.info.unwrap();
    assert_eq!(info.driver, "postgres");
    assert_eq!(info.server_version.as_deref(), Some("Mock 1.0"));
}

#[test]
fn connection_test_failure_carries_the_native_code() {
    let source = MockSource::failing(users_db(), "28P01");
    let report = tokio_test::block_on(test_connection(&source));
    assert!(!report.connected);
    assert!(report.info.is_none());
    let failure = report.failure.unwrap();
    assert_eq!(failure.code.as_deref(), Some("28P01"));
    assert!(failure.message.contains("password authentication failed"));
}
