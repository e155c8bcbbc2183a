// ABOUTME: Tests for the table pipeline against an in-memory database session
// ABOUTME: Covers reload semantics, idempotence and the row level security restore rules

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use supabase_migrator::error::{MigrateError, Result};
use supabase_migrator::migration::{migrate_tables, TableRef};
use supabase_migrator::postgres::TableSession;
use tempfile::tempdir;

#[derive(Clone, Default)]
struct FakeTable {
    columns: String,
    rows: Vec<String>,
    row_security: bool,
}

/// Understands just enough SQL to play one end of the pipeline
#[derive(Default)]
struct FakeDatabase {
    tables: Mutex<HashMap<String, FakeTable>>,
    statements: Mutex<Vec<String>>,
    fail_copy_in: bool,
}

impl FakeDatabase {
    fn with_table(self, name: &str, columns: &str, rows: &[&str], row_security: bool) -> Self {
        let table = TableRef::parse(name).unwrap();
        self.tables.lock().unwrap().insert(
            table.quoted(),
            FakeTable {
                columns: columns.to_string(),
                rows: rows.iter().map(|r| r.to_string()).collect(),
                row_security,
            },
        );
        self
    }

    fn failing_copy_in(mut self) -> Self {
        self.fail_copy_in = true;
        self
    }

    fn table(&self, name: &str) -> FakeTable {
        let key = TableRef::parse(name).unwrap().quoted();
        self.tables.lock().unwrap().get(&key).cloned().unwrap()
    }

    fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    fn table_in<'a>(sql: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
        sql.strip_prefix(prefix)?
            .split_once(suffix)
            .map(|(name, _)| name)
    }

    fn missing(name: &str) -> MigrateError {
        MigrateError::InvalidInput(format!("relation {} does not exist", name))
    }
}

#[async_trait]
impl TableSession for FakeDatabase {
    async fn execute(&self, sql: &str) -> Result<()> {
        self.statements.lock().unwrap().push(sql.to_string());
        let mut tables = self.tables.lock().unwrap();

        if let Some(name) = Self::table_in(sql, "TRUNCATE TABLE ", " RESTART IDENTITY CASCADE") {
            let table = tables.get_mut(name).ok_or_else(|| Self::missing(name))?;
            table.rows.clear();
        } else if let Some(name) = Self::table_in(sql, "ALTER TABLE ", " DISABLE ROW LEVEL SECURITY") {
            tables.get_mut(name).ok_or_else(|| Self::missing(name))?.row_security = false;
        } else if let Some(name) = Self::table_in(sql, "ALTER TABLE ", " ENABLE ROW LEVEL SECURITY") {
            tables.get_mut(name).ok_or_else(|| Self::missing(name))?.row_security = true;
        } else {
            panic!("unexpected statement: {}", sql);
        }
        Ok(())
    }

    async fn copy_out(&self, sql: &str, sink: &Path) -> Result<u64> {
        self.statements.lock().unwrap().push(sql.to_string());
        let name = Self::table_in(sql, "COPY ", " TO STDOUT").unwrap();
        let table = self
            .tables
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Self::missing(name))?;

        let mut csv = format!("{}\n", table.columns);
        for row in &table.rows {
            csv.push_str(row);
            csv.push('\n');
        }
        std::fs::write(sink, &csv)?;
        Ok(csv.len() as u64)
    }

    async fn copy_in(&self, sql: &str, source: &Path) -> Result<u64> {
        self.statements.lock().unwrap().push(sql.to_string());
        if self.fail_copy_in {
            return Err(MigrateError::InvalidInput("COPY failed: bad row".into()));
        }

        let name = Self::table_in(sql, "COPY ", " FROM STDIN").unwrap();
        let csv = std::fs::read_to_string(source)?;
        let mut lines = csv.lines();
        let header = lines.next().unwrap_or_default().to_string();

        let mut tables = self.tables.lock().unwrap();
        let table = tables.get_mut(name).ok_or_else(|| Self::missing(name))?;
        assert_eq!(table.columns, header, "column header mismatch");
        let before = table.rows.len();
        table.rows.extend(lines.map(String::from));
        Ok((table.rows.len() - before) as u64)
    }

    async fn row_security_enabled(&self, table: &TableRef) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(&table.quoted())
            .map(|t| t.row_security)
            .unwrap_or(false))
    }
}

fn names(tables: &[&str]) -> Vec<String> {
    tables.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn test_destination_rows_are_replaced_in_order() {
    let source = FakeDatabase::default()
        .with_table("public.users", "id,email", &["1,a@x.io", "2,b@x.io"], false)
        .with_table("public.orders", "id,user_id", &["10,1"], false);
    let target = FakeDatabase::default()
        .with_table("public.users", "id,email", &["9,stale@x.io"], false)
        .with_table("public.orders", "id,user_id", &[], false);
    let staging = tempdir().unwrap();

    let transfers = migrate_tables(
        &source,
        &target,
        &names(&["public.users", "public.orders"]),
        staging.path(),
        |_| {},
    )
    .await
    .unwrap();

    assert_eq!(transfers.len(), 2);
    assert_eq!(transfers[0].table.to_string(), "public.users");
    assert_eq!(transfers[0].rows_loaded, 2);
    assert_eq!(transfers[1].rows_loaded, 1);
    assert_eq!(target.table("public.users").rows, vec!["1,a@x.io", "2,b@x.io"]);
    assert_eq!(target.table("public.orders").rows, vec!["10,1"]);

    let order: Vec<_> = target
        .statements()
        .into_iter()
        .filter(|s| s.starts_with("TRUNCATE"))
        .collect();
    assert_eq!(
        order,
        vec![
            "TRUNCATE TABLE \"public\".\"users\" RESTART IDENTITY CASCADE",
            "TRUNCATE TABLE \"public\".\"orders\" RESTART IDENTITY CASCADE",
        ]
    );

    let staged = std::fs::read_to_string(staging.path().join("public.users.csv")).unwrap();
    assert_eq!(staged, "id,email\n1,a@x.io\n2,b@x.io\n");
}

#[tokio::test]
async fn test_running_twice_yields_identical_destination() {
    let source =
        FakeDatabase::default().with_table("public.items", "id,name", &["1,a", "2,b"], false);
    let target = FakeDatabase::default().with_table("public.items", "id,name", &["3,c"], true);
    let staging = tempdir().unwrap();
    let tables = names(&["public.items"]);

    migrate_tables(&source, &target, &tables, staging.path(), |_| {})
        .await
        .unwrap();
    let first = target.table("public.items").rows;

    migrate_tables(&source, &target, &tables, staging.path(), |_| {})
        .await
        .unwrap();
    let second = target.table("public.items").rows;

    assert_eq!(first, vec!["1,a", "2,b"]);
    assert_eq!(first, second);
    assert!(target.table("public.items").row_security);
}

#[tokio::test]
async fn test_row_security_restored_after_successful_load() {
    let source = FakeDatabase::default().with_table("public.profiles", "id", &["1"], false);
    let target = FakeDatabase::default().with_table("public.profiles", "id", &[], true);
    let staging = tempdir().unwrap();

    let transfers = migrate_tables(
        &source,
        &target,
        &names(&["public.profiles"]),
        staging.path(),
        |_| {},
    )
    .await
    .unwrap();

    assert!(transfers[0].row_security_suspended);
    assert!(target.table("public.profiles").row_security);
    assert_eq!(
        target.statements(),
        vec![
            "ALTER TABLE \"public\".\"profiles\" DISABLE ROW LEVEL SECURITY",
            "TRUNCATE TABLE \"public\".\"profiles\" RESTART IDENTITY CASCADE",
            "COPY \"public\".\"profiles\" FROM STDIN WITH (FORMAT csv, HEADER true)",
            "ALTER TABLE \"public\".\"profiles\" ENABLE ROW LEVEL SECURITY",
        ]
    );
}

#[tokio::test]
async fn test_row_security_restored_after_failed_load_and_table_left_empty() {
    let source = FakeDatabase::default().with_table("public.profiles", "id", &["1", "2"], false);
    let target = FakeDatabase::default()
        .with_table("public.profiles", "id", &["7"], true)
        .failing_copy_in();
    let staging = tempdir().unwrap();

    let result = migrate_tables(
        &source,
        &target,
        &names(&["public.profiles"]),
        staging.path(),
        |_| {},
    )
    .await;

    assert!(matches!(result, Err(MigrateError::InvalidInput(msg)) if msg.contains("COPY failed")));
    let table = target.table("public.profiles");
    assert!(table.row_security);
    // truncate and import are not atomic
    assert!(table.rows.is_empty());
    assert_eq!(
        target.statements().last().map(String::as_str),
        Some("ALTER TABLE \"public\".\"profiles\" ENABLE ROW LEVEL SECURITY")
    );
}

#[tokio::test]
async fn test_row_security_not_enabled_when_it_was_off() {
    let source = FakeDatabase::default().with_table("public.logs", "id", &["1"], false);
    let target = FakeDatabase::default().with_table("public.logs", "id", &[], false);
    let staging = tempdir().unwrap();

    let transfers = migrate_tables(
        &source,
        &target,
        &names(&["public.logs"]),
        staging.path(),
        |_| {},
    )
    .await
    .unwrap();

    assert!(!transfers[0].row_security_suspended);
    assert!(!target.table("public.logs").row_security);
    assert!(!target
        .statements()
        .iter()
        .any(|s| s.contains("ROW LEVEL SECURITY")));

    // and not after a failed load either
    let failing = FakeDatabase::default()
        .with_table("public.logs", "id", &[], false)
        .failing_copy_in();
    let result = migrate_tables(&source, &failing, &names(&["public.logs"]), staging.path(), |_| {}).await;
    assert!(result.is_err());
    assert!(!failing.table("public.logs").row_security);
    assert!(!failing
        .statements()
        .iter()
        .any(|s| s.contains("ROW LEVEL SECURITY")));
}

#[tokio::test]
async fn test_extract_failure_aborts_before_touching_target() {
    let source = FakeDatabase::default();
    let target = FakeDatabase::default().with_table("public.ghost", "id", &["1"], true);
    let staging = tempdir().unwrap();

    let result = migrate_tables(
        &source,
        &target,
        &names(&["public.ghost", "public.other"]),
        staging.path(),
        |_| {},
    )
    .await;

    assert!(result.is_err());
    assert!(target.statements().is_empty());
    assert_eq!(target.table("public.ghost").rows, vec!["1"]);
}

#[tokio::test]
async fn test_unqualified_table_name_is_invalid_input() {
    let source = FakeDatabase::default();
    let target = FakeDatabase::default();
    let staging = tempdir().unwrap();

    let result = migrate_tables(&source, &target, &names(&["users"]), staging.path(), |_| {}).await;

    match result {
        Err(MigrateError::InvalidInput(msg)) => assert!(msg.contains("users")),
        other => panic!("expected invalid input, got {:?}", other.map(|t| t.len())),
    }
    assert!(source.statements().is_empty());
}

#[tokio::test]
async fn test_mixed_case_names_resolve_like_postgres() {
    let source = FakeDatabase::default()
        .with_table("public.users", "id", &["1"], false)
        .with_table("public.\"Orders\"", "id", &["7"], false);
    let target = FakeDatabase::default()
        .with_table("public.users", "id", &[], true)
        .with_table("public.\"Orders\"", "id", &[], false);
    let staging = tempdir().unwrap();

    let transfers = migrate_tables(
        &source,
        &target,
        &names(&["Public.Users", "public.\"Orders\""]),
        staging.path(),
        |_| {},
    )
    .await
    .unwrap();

    assert_eq!(transfers[0].table.quoted(), "\"public\".\"users\"");
    assert!(transfers[0].row_security_suspended);
    assert_eq!(target.table("public.users").rows, vec!["1"]);
    assert!(target.table("public.users").row_security);
    assert_eq!(target.table("public.\"Orders\"").rows, vec!["7"]);
    assert!(target
        .statements()
        .contains(&"TRUNCATE TABLE \"public\".\"Orders\" RESTART IDENTITY CASCADE".to_string()));
}
