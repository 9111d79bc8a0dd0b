//! Table definitions and the [`SchemaInitializer`] that creates them.
//!
//! A [`TableDefinition`] is a static description of a table: its columns in order, their types,
//! nullability and defaults, and its primary key. [`create_table_statement`] renders one into a
//! `CREATE TABLE IF NOT EXISTS` statement; [`ensure_table`] runs that statement on a connection
//! of its own.
//!
//! Tables that already exist are left exactly as they are, even if their structure has drifted
//! from the definition.

use std::fmt::Write as _;
use tracing::{debug, error, info, instrument};

use super::connection::{ConnectTarget, ServerConnector, quote_identifier, run_scoped};
use super::tables;
use crate::errors::{ProvisionError, Result, TableFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Int32,
    String,
    Timestamp,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Int64 => "bigint",
            ColumnType::Int32 => "int",
            ColumnType::String => "varchar",
            ColumnType::Timestamp => "timestamp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    /// Time of insertion
    Now,
    Null,
}

impl DefaultValue {
    pub fn sql(&self) -> &'static str {
        match self {
            DefaultValue::Now => "current_timestamp",
            DefaultValue::Null => "null",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
}

impl ColumnDefinition {
    /// Nullable column without a default.
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: true,
            default: None,
        }
    }

    pub const fn default_to(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: &'static str,
    pub columns: &'static [ColumnDefinition],
    /// Name of the single primary key column. Values are supplied by callers, never generated.
    pub primary_key: &'static str,
}

impl TableDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

/// Render the `CREATE TABLE IF NOT EXISTS` statement for a definition.
pub fn create_table_statement(table: &TableDefinition) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (", quote_identifier(table.name));

    for (i, column) in table.columns.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        let _ = write!(sql, "\n    {} {}", quote_identifier(column.name), column.column_type.sql());

        if column.name == table.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = column.default {
            let _ = write!(sql, " DEFAULT {}", default.sql());
        }
    }

    sql.push_str("\n)");
    sql
}

/// Create one table if it is absent.
///
/// Runs on its own connection to `database`. A concurrent creator beating us to it counts as
/// success.
#[instrument(skip_all, fields(table = table.name))]
pub async fn ensure_table<C: ServerConnector>(connector: &C, database: &str, table: &TableDefinition) -> Result<()> {
    let target = ConnectTarget::Database(database.to_string());
    let statement = create_table_statement(table);

    match run_scoped(connector, &target, &statement).await {
        Ok(()) => {
            debug!("Table ensured");
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            debug!("Table created concurrently by another session: {}", e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Ensures every table of the schema exists in the target database.
pub struct SchemaInitializer<'a, C> {
    connector: &'a C,
    database: &'a str,
    tables: &'a [TableDefinition],
}

impl<'a, C: ServerConnector> SchemaInitializer<'a, C> {
    /// Initializer for the full OneFit schema.
    pub fn new(connector: &'a C, database: &'a str) -> Self {
        Self::with_tables(connector, database, &tables::ALL)
    }

    pub fn with_tables(connector: &'a C, database: &'a str, tables: &'a [TableDefinition]) -> Self {
        Self {
            connector,
            database,
            tables,
        }
    }

    /// Ensure every table, in order.
    ///
    /// A failing table does not stop the others from being attempted. All failures are
    /// returned together as [`ProvisionError::Schema`].
    #[instrument(skip_all, fields(database = self.database, tables = self.tables.len()))]
    pub async fn ensure_schema(&self) -> Result<()> {
        let mut failures = Vec::new();

        for table in self.tables {
            if let Err(e) = ensure_table(self.connector, self.database, table).await {
                error!(table = table.name, "Failed to ensure table: {}", e);
                failures.push(TableFailure {
                    table: table.name,
                    error: e,
                });
            }
        }

        if failures.is_empty() {
            info!("Schema ensured");
            Ok(())
        } else {
            Err(ProvisionError::Schema { failures })
        }
    }
}
