//! Database access
//!
//! The [`DataHandler`] turns rows of a mapped table into SQL statements and
//! runs them over a [`Connection`]. Vendor differences are limited to the
//! [`Dialect`] used to build statements and the [`KeyRetrieval`] strategy
//! for database-generated keys.

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;
pub mod handler;
pub mod pool;

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};
use crate::sql::Dialect;

pub use handler::{DataHandler, Outcome};
pub use pool::{Pool, Pooled};

/// Column value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Integer
    Integer(i64),
    /// Character data
    Text(String),
}

impl Value {
    /// Whether the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer content, if any
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Column name to value, in column order
pub type Row = IndexMap<String, Value>;

/// A database connection
///
/// Implementations run one statement at a time. Transactions are under the
/// caller's control through [`commit`](Connection::commit) and
/// [`rollback`](Connection::rollback).
pub trait Connection {
    /// Run a statement and return the number of affected rows
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Run a query and return the first column of its first row
    fn query_value(&mut self, sql: &str, params: &[Value]) -> Result<Option<Value>>;

    /// Commit the current transaction
    fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction
    fn rollback(&mut self) -> Result<()>;

    /// Key generated by the last insert, through the driver's own API
    fn generated_key(&mut self) -> Result<Value> {
        Err(Error::NotImplemented(
            "this connection cannot report generated keys".to_string(),
        ))
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn query_value(&mut self, sql: &str, params: &[Value]) -> Result<Option<Value>> {
        (**self).query_value(sql, params)
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<()> {
        (**self).rollback()
    }

    fn generated_key(&mut self) -> Result<Value> {
        (**self).generated_key()
    }
}

/// When the DataHandler commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CommitMode {
    /// After every statement
    AfterStatement,
    /// Once per document, in `end_document`
    #[default]
    AfterDocument,
    /// Never; the caller commits
    None,
}

/// How database-generated keys are read back after an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyRetrieval {
    /// `INSERT ... RETURNING key`
    Returning,
    /// A follow-up query such as `SELECT LAST_INSERT_ID()`
    LastInsertId,
    /// The connection's [`generated_key`](Connection::generated_key)
    Driver,
    /// Generated keys cannot be retrieved
    Unsupported,
}

impl KeyRetrieval {
    /// Strategy for a dialect
    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::PostgreSql | Dialect::DuckDb => Self::Returning,
            Dialect::MySql => Self::LastInsertId,
            Dialect::Standard => Self::Driver,
            Dialect::Oracle => Self::Unsupported,
        }
    }
}
