//! Store operation enum.

use std::fmt;

/// The item operations a store transport serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    // Item CRUD
    /// Read one item by primary key.
    GetItem,
    /// Insert or replace an item.
    PutItem,
    /// Apply an update expression to an item.
    UpdateItem,
    /// Delete an item by primary key.
    DeleteItem,

    // Query & Scan
    /// Read items of one partition by key condition.
    Query,
    /// Read every item of a table.
    Scan,

    // Batch operations
    /// Read several items by primary key.
    BatchGetItem,
    /// Put and delete several items.
    BatchWriteItem,
}

impl StoreOperation {
    /// Returns the wire operation name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetItem => "GetItem",
            Self::PutItem => "PutItem",
            Self::UpdateItem => "UpdateItem",
            Self::DeleteItem => "DeleteItem",
            Self::Query => "Query",
            Self::Scan => "Scan",
            Self::BatchGetItem => "BatchGetItem",
            Self::BatchWriteItem => "BatchWriteItem",
        }
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
