//! Database layer: everything that talks to PostgreSQL.
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────────┐
//! │ DatabaseProvisioner  │ ──▶ │  SchemaInitializer   │
//! │ (server connection)  │     │ (database connection)│
//! └──────────┬───────────┘     └──────────┬───────────┘
//!            │                            │
//!            ↓                            ↓
//! ┌─────────────────────────────────────────────────────┐
//! │ connection: ServerConnector, one connection per call│
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`connection`]: connector traits, the sqlx-backed [`connection::PgConnector`], scoped execution
//! - [`provisioner`]: `CREATE DATABASE` when the target database is missing
//! - [`schema`]: table definition types, DDL rendering, and the schema initializer
//! - [`tables`]: the OneFit table definitions

pub mod connection;
pub mod provisioner;
pub mod schema;
pub mod tables;
