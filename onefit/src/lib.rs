//! # onefit: database bootstrap for the OneFit store
//!
//! `onefit` makes sure the OneFit PostgreSQL database and its tables exist before the host
//! application starts serving requests. It is meant to run once at startup and is safe to run
//! any number of times: every step is "create if absent".
//!
//! ## Overview
//!
//! Bootstrapping happens in two steps, always in this order:
//!
//! 1. The [`DatabaseProvisioner`] looks the target database up in `pg_database` over a
//!    server-level connection and issues `CREATE DATABASE` only when it is missing.
//! 2. The [`SchemaInitializer`] issues one `CREATE TABLE IF NOT EXISTS` per table, in a fixed
//!    order: `Users`, `Categories`, `Studios`, `Facilities`, `StudioFacilities`, `Enrollments`.
//!
//! A failure in the first step stops the sequence. In the second step each table is attempted
//! regardless of the others, and every failure is reported together. Losing a creation race to
//! another process is not a failure. Existing tables are never altered.
//!
//! Each statement runs on a short-lived connection of its own, closed as soon as the statement
//! finishes, successfully or not. The whole sequence runs under a deadline
//! ([`Config::startup_timeout`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use onefit::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = onefit::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     onefit::telemetry::init_telemetry()?;
//!
//!     // Fails if anything could not be provisioned; don't start serving in that case
//!     onefit::init(&config).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod config;
pub mod db;
pub mod errors;
pub mod telemetry;

#[cfg(test)]
mod test;

use std::time::Duration;
use tracing::{info, instrument};

pub use config::Config;
pub use db::connection::{PgConnector, ServerConnector};
pub use db::provisioner::DatabaseProvisioner;
pub use db::schema::SchemaInitializer;
pub use errors::{ProvisionError, Result};

/// Ensure the configured database and all of its tables exist.
///
/// Returns once everything is in place. Any error means the schema may be incomplete and the
/// host should not start.
pub async fn init(config: &Config) -> Result<()> {
    let connector = PgConnector::new(&config.database);
    init_with(&connector, &config.database.name, config.startup_timeout).await
}

/// [`init`] against any connector, under an explicit deadline.
#[instrument(skip(connector), err)]
pub async fn init_with<C: ServerConnector>(connector: &C, database: &str, deadline: Duration) -> Result<()> {
    let bootstrap = async {
        DatabaseProvisioner::new(connector).ensure_database(database).await?;
        SchemaInitializer::new(connector, database).ensure_schema().await
    };

    match tokio::time::timeout(deadline, bootstrap).await {
        Ok(result) => {
            result?;
            info!("Database bootstrap complete");
            Ok(())
        }
        Err(_) => Err(ProvisionError::Timeout { after: deadline }),
    }
}
