use std::time::Duration;
use thiserror::Error;

/// SQLSTATE raised by `CREATE DATABASE` when the database already exists.
pub const DUPLICATE_DATABASE: &str = "42P04";
/// SQLSTATE raised by `CREATE TABLE` when the relation already exists.
pub const DUPLICATE_TABLE: &str = "42P07";
/// Raised on `pg_type` when two sessions race through `CREATE TABLE IF NOT EXISTS`.
pub const UNIQUE_VIOLATION: &str = "23505";
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Unified error type for the bootstrap sequence.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Server unreachable, transport failure, or authentication rejected
    #[error("Cannot reach database server: {message}")]
    Connectivity { message: String },

    /// Authenticated, but not allowed to create the object
    #[error("Permission denied: {message}")]
    Permission { message: String },

    /// Another session created the object first. The ensure operations swallow this.
    #[error("Object already exists: {message}")]
    AlreadyExists { message: String },

    /// Statement rejected for syntax or type reasons, i.e. a definition bug
    #[error("Malformed statement ({code}): {message}")]
    MalformedStatement { code: String, message: String },

    /// The overall startup deadline elapsed
    #[error("Database bootstrap did not finish within {}", format_deadline(.after))]
    Timeout { after: Duration },

    /// One or more tables could not be created
    #[error("{}", describe_failures(.failures))]
    Schema { failures: Vec<TableFailure> },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A single table's creation failure, attributed by name.
#[derive(Debug)]
pub struct TableFailure {
    pub table: &'static str,
    pub error: ProvisionError,
}

fn describe_failures(failures: &[TableFailure]) -> String {
    let details = failures
        .iter()
        .map(|f| format!("{}: {}", f.table, f.error))
        .collect::<Vec<_>>()
        .join("; ");
    format!("Failed to ensure {} table(s): {}", failures.len(), details)
}

fn format_deadline(after: &Duration) -> String {
    humantime::format_duration(*after).to_string()
}

impl ProvisionError {
    /// Build an error from a server-reported SQLSTATE and message.
    pub fn from_sqlstate(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            DUPLICATE_DATABASE | DUPLICATE_TABLE | UNIQUE_VIOLATION => ProvisionError::AlreadyExists { message },
            INSUFFICIENT_PRIVILEGE => ProvisionError::Permission { message },
            // connection_exception, invalid_authorization_specification, cannot_connect_now
            c if c.starts_with("08") || c.starts_with("28") || c == "57P03" => ProvisionError::Connectivity { message },
            // database "x" does not exist
            "3D000" => ProvisionError::Connectivity { message },
            c if c.starts_with("42") => ProvisionError::MalformedStatement {
                code: c.to_string(),
                message,
            },
            c => ProvisionError::Other(anyhow::anyhow!("{message} (SQLSTATE {c})")),
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ProvisionError::AlreadyExists { .. })
    }

    /// Whether the failure comes from the environment rather than from a definition bug.
    pub fn is_environmental(&self) -> bool {
        matches!(
            self,
            ProvisionError::Connectivity { .. } | ProvisionError::Permission { .. } | ProvisionError::Timeout { .. }
        )
    }
}

/// Classify sqlx errors by SQLSTATE where the server provided one
impl From<sqlx::Error> for ProvisionError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned());
                match code {
                    Some(code) => ProvisionError::from_sqlstate(&code, db_err.message()),
                    None => ProvisionError::Other(anyhow::Error::from(err)),
                }
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                ProvisionError::Connectivity { message: err.to_string() }
            }
            sqlx::Error::Configuration(_) => ProvisionError::Connectivity { message: err.to_string() },
            _ => ProvisionError::Other(anyhow::Error::from(err)),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
