//! The OneFit tables.
//!
//! `CategoryId`, `StudioId`, `FacilityId` and `UserId` reference other tables by value only;
//! no foreign key constraints are declared.

use super::schema::{ColumnDefinition, ColumnType, DefaultValue, TableDefinition};

const ID: ColumnDefinition = ColumnDefinition::new("Id", ColumnType::Int64);
const CREATED_AT: ColumnDefinition = ColumnDefinition::new("CreatedAt", ColumnType::Timestamp).default_to(DefaultValue::Now);
const UPDATED_AT: ColumnDefinition = ColumnDefinition::new("UpdatedAt", ColumnType::Timestamp).default_to(DefaultValue::Null);

pub const USERS: TableDefinition = TableDefinition {
    name: "Users",
    columns: &[
        ID,
        ColumnDefinition::new("FirstName", ColumnType::String),
        ColumnDefinition::new("LastName", ColumnType::String),
        ColumnDefinition::new("Phone", ColumnType::String),
        ColumnDefinition::new("Password", ColumnType::String),
    ],
    primary_key: "Id",
};

pub const CATEGORIES: TableDefinition = TableDefinition {
    name: "Categories",
    columns: &[ID, ColumnDefinition::new("Name", ColumnType::String), CREATED_AT, UPDATED_AT],
    primary_key: "Id",
};

pub const STUDIOS: TableDefinition = TableDefinition {
    name: "Studios",
    columns: &[
        ID,
        ColumnDefinition::new("Name", ColumnType::String),
        ColumnDefinition::new("Description", ColumnType::String),
        ColumnDefinition::new("Address", ColumnType::String),
        ColumnDefinition::new("Type", ColumnType::Int32),
        ColumnDefinition::new("CategoryId", ColumnType::Int64),
        CREATED_AT,
        UPDATED_AT,
    ],
    primary_key: "Id",
};

pub const FACILITIES: TableDefinition = TableDefinition {
    name: "Facilities",
    columns: &[ID, ColumnDefinition::new("Name", ColumnType::String), CREATED_AT, UPDATED_AT],
    primary_key: "Id",
};

pub const STUDIO_FACILITIES: TableDefinition = TableDefinition {
    name: "StudioFacilities",
    columns: &[
        ID,
        ColumnDefinition::new("StudioId", ColumnType::Int64),
        ColumnDefinition::new("FacilityId", ColumnType::Int64),
        CREATED_AT,
        UPDATED_AT,
    ],
    primary_key: "Id",
};

pub const ENROLLMENTS: TableDefinition = TableDefinition {
    name: "Enrollments",
    columns: &[
        ID,
        ColumnDefinition::new("StudioId", ColumnType::Int64),
        ColumnDefinition::new("UserId", ColumnType::Int64),
        CREATED_AT,
        UPDATED_AT,
    ],
    primary_key: "Id",
};

/// Every table, in creation order.
pub static ALL: [TableDefinition; 6] = [USERS, CATEGORIES, STUDIOS, FACILITIES, STUDIO_FACILITIES, ENROLLMENTS];
