//! SQL generation
//!
//! Database differences are captured by [`Dialect`]: identifier quoting,
//! type names, parameter placeholders and how generated keys come back.
//! [`DdlWriter`] turns a map's tables into `CREATE TABLE` statements and
//! [`dml`] builds the parameterised statements the DataHandler runs.

pub mod ddl;
pub mod dml;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::mapping::SqlType;

pub use ddl::DdlWriter;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Dialect {
    /// ANSI SQL
    #[default]
    Standard,
    /// MySQL / MariaDB
    MySql,
    /// PostgreSQL
    PostgreSql,
    /// Oracle
    Oracle,
    /// DuckDB
    DuckDb,
}

impl Dialect {
    /// All dialects
    pub const ALL: [Dialect; 5] = [
        Dialect::Standard,
        Dialect::MySql,
        Dialect::PostgreSql,
        Dialect::Oracle,
        Dialect::DuckDb,
    ];

    /// Short name accepted by [`FromStr`]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::MySql => "mysql",
            Self::PostgreSql => "postgresql",
            Self::Oracle => "oracle",
            Self::DuckDb => "duckdb",
        }
    }

    /// Quote and escape an identifier
    ///
    /// Embedded quote characters are doubled.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", identifier.replace('`', "``")),
            _ => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }

    /// Column type as written in DDL
    pub fn type_name(&self, data_type: SqlType) -> String {
        match (self, data_type) {
            (_, SqlType::Integer) => "INTEGER".to_string(),
            (Self::Oracle, SqlType::Varchar(len)) => format!("VARCHAR2({})", len),
            (_, SqlType::Varchar(len)) => format!("VARCHAR({})", len),
            (Self::Standard | Self::Oracle, SqlType::Text) => "CLOB".to_string(),
            (_, SqlType::Text) => "TEXT".to_string(),
        }
    }

    /// Placeholder for the `index`th (1-based) statement parameter
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::PostgreSql => format!("${}", index),
            _ => "?".to_string(),
        }
    }

    /// Whether `INSERT ... RETURNING` hands back generated keys
    pub fn supports_returning(&self) -> bool {
        matches!(self, Self::PostgreSql | Self::DuckDb)
    }

    /// Whether foreign keys can be added after `CREATE TABLE`
    pub fn supports_alter_foreign_key(&self) -> bool {
        !matches!(self, Self::DuckDb)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "ansi" | "sql" => Ok(Self::Standard),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgresql" | "postgres" | "pg" => Ok(Self::PostgreSql),
            "oracle" => Ok(Self::Oracle),
            "duckdb" => Ok(Self::DuckDb),
            other => Err(Error::Config(format!(
                "Unknown SQL dialect '{}' (expected one of standard, mysql, postgresql, oracle, duckdb)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::PostgreSql.quote_identifier("Order"), "\"Order\"");
        assert_eq!(Dialect::MySql.quote_identifier("Order"), "`Order`");
        assert_eq!(Dialect::Standard.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::MySql.quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Dialect::Oracle.type_name(SqlType::Varchar(40)), "VARCHAR2(40)");
        assert_eq!(Dialect::MySql.type_name(SqlType::Varchar(40)), "VARCHAR(40)");
        assert_eq!(Dialect::Standard.type_name(SqlType::Text), "CLOB");
        assert_eq!(Dialect::DuckDb.type_name(SqlType::Text), "TEXT");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::PostgreSql.placeholder(3), "$3");
        assert_eq!(Dialect::MySql.placeholder(3), "?");
    }

    #[test]
    fn test_parse_names() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.name().parse::<Dialect>().unwrap(), dialect);
        }
        assert_eq!("Postgres".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert!("sybase".parse::<Dialect>().is_err());
    }
}
