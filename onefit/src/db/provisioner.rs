use tracing::{debug, info, instrument};

use super::connection::{ConnectTarget, ServerConnector, count_scoped, quote_identifier, run_scoped};
use crate::errors::Result;

pub const DATABASE_COUNT_QUERY: &str = "SELECT COUNT(*) FROM pg_database WHERE datname = $1";

/// Ensures the target database exists on the server.
///
/// Both the existence check and the `CREATE DATABASE` run on server-level connections; no
/// connection to the new database is opened here.
pub struct DatabaseProvisioner<'a, C> {
    connector: &'a C,
}

impl<'a, C: ServerConnector> DatabaseProvisioner<'a, C> {
    pub fn new(connector: &'a C) -> Self {
        Self { connector }
    }

    /// Whether a database named exactly `name` exists.
    pub async fn database_exists(&self, name: &str) -> Result<bool> {
        let count = count_scoped(self.connector, &ConnectTarget::Server, DATABASE_COUNT_QUERY, name).await?;
        Ok(count > 0)
    }

    /// Create the database if it is absent.
    ///
    /// Losing a creation race to another process is not an error: the database exists either way.
    #[instrument(skip(self), err)]
    pub async fn ensure_database(&self, name: &str) -> Result<()> {
        if self.database_exists(name).await? {
            debug!("Database already exists, skipping creation");
            return Ok(());
        }

        let statement = format!("CREATE DATABASE {}", quote_identifier(name));
        match run_scoped(self.connector, &ConnectTarget::Server, &statement).await {
            Ok(()) => {
                info!("Created database");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!("Database created concurrently by another process: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
