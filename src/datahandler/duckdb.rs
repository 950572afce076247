//! DuckDB connection
//!
//! Statements run inside a transaction that is opened on first use and
//! closed by `commit` or `rollback`.

use std::path::Path;

use duckdb::types::{ToSqlOutput, Value as DuckValue};
use duckdb::{params_from_iter, ToSql};
use tracing::debug;

use super::{Connection, Value};
use crate::error::{Error, Result};

fn db_error(err: duckdb::Error) -> Error {
    Error::Database(err.to_string())
}

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(match self {
            Value::Null => DuckValue::Null,
            Value::Integer(n) => DuckValue::BigInt(*n),
            Value::Text(s) => DuckValue::Text(s.clone()),
        }))
    }
}

fn from_duckdb(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Integer(i64::from(b)),
        DuckValue::TinyInt(n) => Value::Integer(n.into()),
        DuckValue::SmallInt(n) => Value::Integer(n.into()),
        DuckValue::Int(n) => Value::Integer(n.into()),
        DuckValue::BigInt(n) => Value::Integer(n),
        DuckValue::UTinyInt(n) => Value::Integer(n.into()),
        DuckValue::USmallInt(n) => Value::Integer(n.into()),
        DuckValue::UInt(n) => Value::Integer(n.into()),
        DuckValue::UBigInt(n) => match i64::try_from(n) {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Text(n.to_string()),
        },
        DuckValue::Text(s) => Value::Text(s),
        other => Value::Text(format!("{:?}", other)),
    }
}

/// [`Connection`] over an embedded DuckDB database
pub struct DuckDbConnection {
    conn: duckdb::Connection,
    in_transaction: bool,
}

impl DuckDbConnection {
    /// Open or create a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = duckdb::Connection::open(path).map_err(db_error)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = duckdb::Connection::open_in_memory().map_err(db_error)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing DuckDB connection
    pub fn from_connection(conn: duckdb::Connection) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    /// Run a batch of statements, such as generated DDL, outside any transaction
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.commit()?;
        self.conn.execute_batch(sql).map_err(db_error)
    }

    fn begin(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.conn
                .execute_batch("BEGIN TRANSACTION")
                .map_err(db_error)?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

impl Connection for DuckDbConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.begin()?;
        let mut stmt = self.conn.prepare_cached(sql).map_err(db_error)?;
        let count = stmt
            .execute(params_from_iter(params.iter()))
            .map_err(db_error)?;
        Ok(count as u64)
    }

    fn query_value(&mut self, sql: &str, params: &[Value]) -> Result<Option<Value>> {
        self.begin()?;
        let mut stmt = self.conn.prepare_cached(sql).map_err(db_error)?;
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(db_error)?;
        match rows.next().map_err(db_error)? {
            Some(row) => {
                let value: DuckValue = row.get(0).map_err(db_error)?;
                Ok(Some(from_duckdb(value)))
            }
            None => Ok(None),
        }
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT").map_err(db_error)?;
            self.in_transaction = false;
            debug!("duckdb transaction committed");
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn.execute_batch("ROLLBACK").map_err(db_error)?;
            self.in_transaction = false;
            debug!("duckdb transaction rolled back");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datahandler::{CommitMode, DataHandler, Row};
    use crate::dtd::DtdParser;
    use crate::mapping::{Map, MapFactory, MapOptions};
    use crate::sql::{Dialect, DdlWriter};

    fn orders_map() -> Map {
        let dtd = DtdParser::new()
            .parse_str(
                "<!ELEMENT Order (Line*)>\n<!ATTLIST Order number CDATA #REQUIRED>\n<!ELEMENT Line EMPTY>\n<!ATTLIST Line sku CDATA #REQUIRED>",
                None,
            )
            .unwrap();
        MapFactory::new(MapOptions::default()).create_map(&dtd).unwrap()
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn open_with_schema(map: &Map) -> DuckDbConnection {
        let ddl = DdlWriter::new(Dialect::DuckDb).to_string(map).unwrap();
        let mut conn = DuckDbConnection::open_in_memory().unwrap();
        conn.execute_batch(&ddl).unwrap();
        conn
    }

    #[test]
    fn test_store_rows_with_generated_keys() {
        let map = orders_map();
        let order = map.table("Order").unwrap();
        let line = map.table("Line").unwrap();
        let mut handler = DataHandler::new(
            open_with_schema(&map),
            Dialect::DuckDb,
            CommitMode::AfterDocument,
        );

        handler.start_document().unwrap();
        let order_key = handler
            .insert(order, row(&[("number", "A-1".into())]))
            .unwrap()
            .unwrap();
        let line_key = handler
            .insert(line, row(&[("OrderFK", order_key.clone()), ("sku", "X".into())]))
            .unwrap();
        assert!(line_key.is_some());
        handler.end_document().unwrap();

        assert!(handler.exists(order, &[order_key]).unwrap());
        let count = handler
            .connection_mut()
            .query_value("SELECT COUNT(*) FROM \"Line\"", &[])
            .unwrap();
        assert_eq!(count, Some(Value::Integer(1)));
    }

    #[test]
    fn test_rollback_discards_rows() {
        let map = orders_map();
        let order = map.table("Order").unwrap();
        let mut handler =
            DataHandler::new(open_with_schema(&map), Dialect::DuckDb, CommitMode::AfterDocument);

        handler.start_document().unwrap();
        handler
            .insert(order, row(&[("number", "A-1".into())]))
            .unwrap();
        handler.abort_document().unwrap();

        let count = handler
            .connection_mut()
            .query_value("SELECT COUNT(*) FROM \"Order\"", &[])
            .unwrap();
        assert_eq!(count, Some(Value::Integer(0)));
    }

    #[test]
    fn test_update_and_soft_delete() {
        let map = orders_map();
        let order = map.table("Order").unwrap();
        let mut handler =
            DataHandler::new(open_with_schema(&map), Dialect::DuckDb, CommitMode::AfterStatement);

        let key = handler
            .insert(order, row(&[("number", "A-1".into())]))
            .unwrap()
            .unwrap();
        assert_eq!(
            handler
                .update(order, &[key.clone()], row(&[("number", "A-2".into())]))
                .unwrap(),
            1
        );
        let number = handler
            .connection_mut()
            .query_value("SELECT \"number\" FROM \"Order\"", &[])
            .unwrap();
        assert_eq!(number, Some(Value::from("A-2")));

        assert_eq!(handler.soft_delete(order, &[key.clone()]).unwrap(), 1);
        assert_eq!(handler.soft_delete(order, &[key]).unwrap(), 0);
    }
}
