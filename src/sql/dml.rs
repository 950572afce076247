//! Parameterised DML statements
//!
//! Parameters are numbered left to right: for `update` the SET values come
//! first, then the key values.

use super::Dialect;

fn columns<S: AsRef<str>>(dialect: Dialect, names: &[S]) -> String {
    names
        .iter()
        .map(|c| dialect.quote_identifier(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn conditions<S: AsRef<str>>(dialect: Dialect, names: &[S], first: usize, separator: &str) -> String {
    names
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{} = {}",
                dialect.quote_identifier(c.as_ref()),
                dialect.placeholder(first + i)
            )
        })
        .collect::<Vec<_>>()
        .join(separator)
}

/// `INSERT INTO table (...) VALUES (...)`, optionally returning a column
pub fn insert<S: AsRef<str>>(dialect: Dialect, table: &str, names: &[S], returning: Option<&str>) -> String {
    let table = dialect.quote_identifier(table);
    let mut sql = if names.is_empty() {
        match dialect {
            Dialect::MySql => format!("INSERT INTO {} () VALUES ()", table),
            _ => format!("INSERT INTO {} DEFAULT VALUES", table),
        }
    } else {
        let placeholders = (1..=names.len())
            .map(|i| dialect.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns(dialect, names),
            placeholders
        )
    };
    if let Some(column) = returning.filter(|_| dialect.supports_returning()) {
        sql.push_str(" RETURNING ");
        sql.push_str(&dialect.quote_identifier(column));
    }
    sql
}

/// `UPDATE table SET ... WHERE key = ...`
pub fn update<S: AsRef<str>, K: AsRef<str>>(dialect: Dialect, table: &str, names: &[S], key: &[K]) -> String {
    format!(
        "UPDATE {} SET {} WHERE {}",
        dialect.quote_identifier(table),
        conditions(dialect, names, 1, ", "),
        conditions(dialect, key, names.len() + 1, " AND ")
    )
}

/// `DELETE FROM table WHERE key = ...`
pub fn delete<K: AsRef<str>>(dialect: Dialect, table: &str, key: &[K]) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        dialect.quote_identifier(table),
        conditions(dialect, key, 1, " AND ")
    )
}

/// `SELECT COUNT(*) FROM table WHERE key = ...`
pub fn exists<K: AsRef<str>>(dialect: Dialect, table: &str, key: &[K]) -> String {
    format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        dialect.quote_identifier(table),
        conditions(dialect, key, 1, " AND ")
    )
}

/// Query returning the key generated by the last insert, where the
/// dialect has one
pub fn last_insert_id(dialect: Dialect) -> Option<&'static str> {
    match dialect {
        Dialect::MySql => Some("SELECT LAST_INSERT_ID()"),
        _ => None,
    }
}
