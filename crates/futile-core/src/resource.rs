//! Resource capability trait

use serde::{Deserialize, Serialize};

use crate::Result;

/// Outcome of a single unit of work executed on a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    /// Rows affected by a modifying statement
    pub affected_rows: u64,
    /// Rows returned by a query, one JSON object per row
    pub rows: Vec<serde_json::Value>,
}

impl StatementResult {
    /// Result of a statement that returned no rows
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            rows: Vec::new(),
        }
    }

    /// Result of a query
    pub fn rows(rows: Vec<serde_json::Value>) -> Self {
        Self {
            affected_rows: 0,
            rows,
        }
    }
}

/// A reusable, expensive-to-create handle such as a live database connection.
///
/// Callers only ever use a resource through these named operations, so the
/// behavioural surface of anything the pool lends out is known up front.
/// Methods take `&self`: implementations guard their own handle, which lets
/// the pool close resources during teardown while a caller still holds them.
pub trait Resource: Send + Sync {
    /// Short name of the backing implementation (e.g. "mysql")
    fn kind(&self) -> &str;

    /// Execute one statement
    fn execute(&self, statement: &str) -> Result<StatementResult>;

    /// Start a transaction
    fn begin(&self) -> Result<()>;

    /// Commit the current transaction
    fn commit(&self) -> Result<()>;

    /// Roll back the current transaction
    fn rollback(&self) -> Result<()>;

    /// Tear down the resource. Must be idempotent.
    fn close(&self) -> Result<()>;

    /// Whether `close` has already run or the peer hung up
    fn is_closed(&self) -> bool;
}
