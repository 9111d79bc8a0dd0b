//! Short-lived connections for bootstrap statements.
//!
//! Every statement runs on a connection of its own: [`ServerConnector::connect`] opens it and
//! [`DdlConnection::close`] releases it. Callers must close on every path, success or failure,
//! which [`run_scoped`] takes care of. Nothing here pools or shares connections.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{ConnectOptions, Connection, Executor, PgConnection};
use std::fmt;
use tracing::{debug, warn};

use crate::config::{DatabaseConfig, SslMode};
use crate::errors::Result;

/// Database every PostgreSQL server carries; used for server-level statements.
pub const MAINTENANCE_DATABASE: &str = "postgres";

/// What a connection is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// The server itself, for catalog queries and `CREATE DATABASE`
    Server,
    /// A specific database, for table DDL
    Database(String),
}

impl ConnectTarget {
    pub fn database_name(&self) -> &str {
        match self {
            ConnectTarget::Server => MAINTENANCE_DATABASE,
            ConnectTarget::Database(name) => name,
        }
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::Server => write!(f, "server"),
            ConnectTarget::Database(name) => write!(f, "database {name}"),
        }
    }
}

/// A single open connection able to run the bootstrap statements.
#[async_trait]
pub trait DdlConnection: Send {
    /// Run a scalar `COUNT(*)` query with one text parameter bound as `$1`.
    async fn count(&mut self, query: &str, bind: &str) -> Result<i64>;

    /// Execute a statement that returns no rows.
    async fn execute(&mut self, statement: &str) -> Result<()>;

    /// Release the connection.
    async fn close(self);
}

/// Opens connections to the database server.
#[async_trait]
pub trait ServerConnector: Send + Sync {
    type Connection: DdlConnection;

    async fn connect(&self, target: &ConnectTarget) -> Result<Self::Connection>;
}

/// Open a connection, execute `statement` on it, then release it whatever the outcome.
pub async fn run_scoped<C: ServerConnector>(connector: &C, target: &ConnectTarget, statement: &str) -> Result<()> {
    let mut conn = connector.connect(target).await?;
    let result = conn.execute(statement).await;
    conn.close().await;
    result
}

/// Open a connection, run a count query on it, then release it whatever the outcome.
pub async fn count_scoped<C: ServerConnector>(connector: &C, target: &ConnectTarget, query: &str, bind: &str) -> Result<i64> {
    let mut conn = connector.connect(target).await?;
    let result = conn.count(query, bind).await;
    conn.close().await;
    result
}

/// Connector backed by real PostgreSQL connections.
#[derive(Clone, Debug)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    pub fn new(config: &DatabaseConfig) -> Self {
        let mut options = PgConnectOptions::new()
            .port(config.server.port)
            .username(&config.credentials.username)
            .ssl_mode(config.ssl_mode.into())
            .application_name("onefit-bootstrap")
            // Statement logging is ours to do, via tracing spans
            .disable_statement_logging();

        // An absolute path is a Unix socket directory, as with libpq
        options = if config.server.host.starts_with('/') {
            options.socket(&config.server.host)
        } else {
            options.host(&config.server.host)
        };

        if let Some(password) = &config.credentials.password {
            options = options.password(password);
        }

        Self { options }
    }

    pub(crate) fn options_for(&self, target: &ConnectTarget) -> PgConnectOptions {
        self.options.clone().database(target.database_name())
    }
}

#[async_trait]
impl ServerConnector for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self, target: &ConnectTarget) -> Result<PgConnection> {
        debug!(%target, "Opening connection");
        let conn = self.options_for(target).connect().await?;
        Ok(conn)
    }
}

#[async_trait]
impl DdlConnection for PgConnection {
    async fn count(&mut self, query: &str, bind: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(query).bind(bind).fetch_one(&mut *self).await?;
        Ok(count)
    }

    async fn execute(&mut self, statement: &str) -> Result<()> {
        Executor::execute(&mut *self, statement).await?;
        Ok(())
    }

    async fn close(self) {
        if let Err(e) = Connection::close(self).await {
            // The server side is gone either way
            warn!("Error closing connection: {}", e);
        }
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Allow => PgSslMode::Allow,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes.
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
