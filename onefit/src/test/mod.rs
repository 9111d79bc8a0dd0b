
use crate::db::tables;
use crate::errors::ProvisionError;
use crate::init_with;
use async_trait::async_trait;
use fake_server::FakeServer;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn table_names() -> Vec<String> {
    tables::ALL.iter().map(|t| t.name.to_string()).collect()
}

/// End-to-end: empty server, bootstrap, then bootstrap again
#[test_log::test(tokio::test)]
async fn test_init_on_empty_server() {
    let server = FakeServer::new();

    init_with(&server, "OneFitDb", TIMEOUT).await.unwrap();

    assert_eq!(server.databases(), vec!["OneFitDb".to_string()]);
    assert_eq!(server.tables("OneFitDb"), table_names());
    assert!(server.all_connections_closed());

    init_with(&server, "OneFitDb", TIMEOUT).await.unwrap();

    assert_eq!(server.databases(), vec!["OneFitDb".to_string()]);
    assert_eq!(server.tables("OneFitDb"), table_names());
    // The second run found the database and skipped creating it
    assert_eq!(server.count_statements_starting_with("CREATE DATABASE"), 1);
    assert_eq!(server.count_statements_starting_with("CREATE TABLE IF NOT EXISTS"), 12);
}

#[test_log::test(tokio::test)]
async fn test_database_failure_skips_schema() {
    let server = FakeServer::new();
    server.fail_statements_containing("CREATE DATABASE", "42501", "permission denied to create database");

    let err = init_with(&server, "OneFitDb", TIMEOUT).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Permission { .. }));
    assert_eq!(server.count_statements_starting_with("CREATE TABLE"), 0);
}

#[test_log::test(tokio::test)]
async fn test_init_reports_partial_schema() {
    let server = FakeServer::new();
    server.fail_statements_containing("\"Facilities\"", "42601", "syntax error at or near \"(\"");

    let err = init_with(&server, "OneFitDb", TIMEOUT).await.unwrap_err();

    assert!(err.to_string().contains("Facilities"));
    assert_eq!(server.tables("OneFitDb").len(), 5);

    // Fixing the fault and rerunning completes the schema
    server.clear_faults();
    init_with(&server, "OneFitDb", TIMEOUT).await.unwrap();
    assert_eq!(server.tables("OneFitDb").len(), 6);
}

/// Connector whose connections never come up
struct HangingConnector;

#[async_trait]
impl crate::ServerConnector for HangingConnector {
    type Connection = fake_server::FakeConnection;

    async fn connect(&self, _target: &crate::db::connection::ConnectTarget) -> crate::Result<Self::Connection> {
        std::future::pending().await
    }
}

#[test_log::test(tokio::test)]
async fn test_deadline_is_reported_as_timeout() {
    let deadline = Duration::from_millis(50);
    let err = init_with(&HangingConnector, "OneFitDb", deadline).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Timeout { after } if after == deadline));
    assert!(!matches!(err, ProvisionError::Connectivity { .. }));
}

/// Tests against a live PostgreSQL server.
///
/// These read `DATABASE_URL` (a superuser or a role with CREATEDB) and work in uniquely named
/// databases which they drop afterwards. Run with `cargo test -- --ignored`.
mod postgres {
    use crate::config::{Config, DatabaseConfig};
    use crate::db::connection::{ConnectTarget, PgConnector, quote_identifier};
    use crate::db::provisioner::DatabaseProvisioner;
    use crate::db::tables;
    use sqlx::postgres::PgConnectOptions;
    use sqlx::{ConnectOptions, Connection, Executor, PgConnection};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    /// A database name reserved for one test, dropped by `cleanup`.
    struct TestDatabase {
        config: Config,
        admin: PgConnectOptions,
    }

    impl TestDatabase {
        fn new(prefix: &str) -> Self {
            let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for PostgreSQL tests");
            let mut database = DatabaseConfig::from_url(&url).expect("DATABASE_URL must be a postgres:// URL");
            database.name = format!("OneFit_{}_{}_{}", prefix, std::process::id(), NEXT_ID.fetch_add(1, Ordering::SeqCst));

            Self {
                admin: admin_options(&database),
                config: Config {
                    database,
                    startup_timeout: Duration::from_secs(30),
                    database_url: None,
                },
            }
        }

        fn name(&self) -> &str {
            &self.config.database.name
        }

        async fn server_connection(&self) -> PgConnection {
            self.admin.clone().database("postgres").connect().await.unwrap()
        }

        async fn database_connection(&self) -> PgConnection {
            self.admin.clone().database(self.name()).connect().await.unwrap()
        }

        async fn database_count(&self) -> i64 {
            let mut conn = self.server_connection().await;
            let count = sqlx::query_scalar("SELECT COUNT(*) FROM pg_database WHERE datname = $1")
                .bind(self.name())
                .fetch_one(&mut conn)
                .await
                .unwrap();
            conn.close().await.unwrap();
            count
        }

        async fn public_tables(&self) -> Vec<String> {
            let mut conn = self.database_connection().await;
            let tables = sqlx::query_scalar("SELECT table_name::text FROM information_schema.tables WHERE table_schema = 'public' ORDER BY table_name COLLATE \"C\"")
                .fetch_all(&mut conn)
                .await
                .unwrap();
            conn.close().await.unwrap();
            tables
        }

        async fn cleanup(self) {
            let mut conn = self.server_connection().await;
            conn.execute(format!("SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}'", self.name()).as_str())
                .await
                .ok(); // Ignore errors (database might not exist)
            conn.execute(format!("DROP DATABASE IF EXISTS {}", quote_identifier(self.name())).as_str())
                .await
                .unwrap();
            conn.close().await.unwrap();
        }
    }

    fn admin_options(database: &DatabaseConfig) -> PgConnectOptions {
        PgConnector::new(database).options_for(&ConnectTarget::Server)
    }

    fn sorted_table_names() -> Vec<String> {
        let mut names: Vec<String> = tables::ALL.iter().map(|t| t.name.to_string()).collect();
        names.sort();
        names
    }

    #[test_log::test(tokio::test)]
    #[ignore = "requires a running PostgreSQL server (DATABASE_URL)"]
    async fn test_init_is_idempotent() {
        let db = TestDatabase::new("idempotent");

        crate::init(&db.config).await.unwrap();
        assert_eq!(db.database_count().await, 1);
        assert_eq!(db.public_tables().await, sorted_table_names());

        crate::init(&db.config).await.unwrap();
        assert_eq!(db.database_count().await, 1);
        assert_eq!(db.public_tables().await, sorted_table_names());

        db.cleanup().await;
    }

    #[test_log::test(tokio::test)]
    #[ignore = "requires a running PostgreSQL server (DATABASE_URL)"]
    async fn test_tables_match_definitions() {
        let db = TestDatabase::new("columns");
        crate::init(&db.config).await.unwrap();

        let mut conn = db.database_connection().await;
        for table in &tables::ALL {
            let columns: Vec<(String, String, String)> = sqlx::query_as(
                "SELECT column_name::text, data_type::text, is_nullable::text
                 FROM information_schema.columns
                 WHERE table_schema = 'public' AND table_name = $1
                 ORDER BY ordinal_position",
            )
            .bind(table.name)
            .fetch_all(&mut conn)
            .await
            .unwrap();

            let names: Vec<&str> = columns.iter().map(|(name, _, _)| name.as_str()).collect();
            assert_eq!(names, table.column_names().collect::<Vec<_>>(), "{}", table.name);

            for ((name, data_type, _), column) in columns.iter().zip(table.columns) {
                let expected = match column.column_type.sql() {
                    "bigint" => "bigint",
                    "int" => "integer",
                    "varchar" => "character varying",
                    _ => "timestamp without time zone",
                };
                assert_eq!(data_type, expected, "{}.{}", table.name, name);
            }

            let key: Vec<String> = sqlx::query_scalar(
                "SELECT a.attname::text
                 FROM pg_index i
                 JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
                 WHERE i.indrelid = format('%I', $1::text)::regclass AND i.indisprimary",
            )
            .bind(table.name)
            .fetch_all(&mut conn)
            .await
            .unwrap();
            assert_eq!(key, vec!["Id".to_string()], "{}", table.name);
        }
        conn.close().await.unwrap();

        db.cleanup().await;
    }

    #[test_log::test(tokio::test)]
    #[ignore = "requires a running PostgreSQL server (DATABASE_URL)"]
    async fn test_category_timestamps_default() {
        let db = TestDatabase::new("defaults");
        crate::init(&db.config).await.unwrap();

        let mut conn = db.database_connection().await;
        conn.execute(r#"INSERT INTO "Categories" ("Id", "Name") VALUES (1, 'Yoga')"#)
            .await
            .unwrap();

        let (created_recently, updated_is_null): (bool, bool) = sqlx::query_as(
            r#"SELECT "CreatedAt" IS NOT NULL AND abs(extract(epoch FROM (LOCALTIMESTAMP - "CreatedAt"))) < 60,
                      "UpdatedAt" IS NULL
               FROM "Categories" WHERE "Id" = 1"#,
        )
        .fetch_one(&mut conn)
        .await
        .unwrap();
        assert!(created_recently);
        assert!(updated_is_null);

        // Keys are not generated
        assert!(conn.execute(r#"INSERT INTO "Categories" ("Name") VALUES ('Pilates')"#).await.is_err());
        conn.close().await.unwrap();

        db.cleanup().await;
    }

    #[test_log::test(tokio::test)]
    #[ignore = "requires a running PostgreSQL server (DATABASE_URL)"]
    async fn test_concurrent_ensure_database() {
        let db = TestDatabase::new("race");
        let first = PgConnector::new(&db.config.database);
        let second = PgConnector::new(&db.config.database);

        let (left, right) = (DatabaseProvisioner::new(&first), DatabaseProvisioner::new(&second));

        let (a, b) = tokio::join!(left.ensure_database(db.name()), right.ensure_database(db.name()));
        a.unwrap();
        b.unwrap();
        assert_eq!(db.database_count().await, 1);

        db.cleanup().await;
    }

    #[test_log::test(tokio::test)]
    #[ignore = "requires a running PostgreSQL server (DATABASE_URL)"]
    async fn test_schema_connection_targets_new_database() {
        let db = TestDatabase::new("target");
        crate::init(&db.config).await.unwrap();

        // Nothing leaked into the maintenance database
        let mut conn = db.server_connection().await;
        let leaked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'StudioFacilities'")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();
        assert_eq!(leaked, 0);

        db.cleanup().await;
    }
}
