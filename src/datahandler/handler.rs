//! Row storage through a [`Connection`]
//!
//! A [`DataHandler`] turns table rows into dialect-specific statements,
//! caches the SQL per table and column set, reads back generated keys and
//! commits according to its [`CommitMode`].

use std::collections::HashMap;

use tracing::{debug, trace};

use super::{CommitMode, Connection, KeyRetrieval, Row, Value};
use crate::actions::{ActionKind, UpdateProperty};
use crate::error::{Error, Result};
use crate::mapping::{ClassMap, PropertySource, PropertyTarget, Table};
use crate::sql::{dml, Dialect};

/// What [`DataHandler::apply`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was run, or a soft action found nothing to do
    Skipped,
    /// A row was inserted; carries the generated key, if any
    Inserted(Option<Value>),
    /// Rows were updated
    Updated(u64),
    /// Rows were deleted
    Deleted(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Operation {
    Insert,
    Update,
    Delete,
    Exists,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StatementKey {
    operation: Operation,
    table: String,
    columns: Vec<String>,
}

/// Runs inserts, updates and deletes for mapped tables
pub struct DataHandler<C: Connection> {
    connection: C,
    dialect: Dialect,
    commit_mode: CommitMode,
    key_retrieval: KeyRetrieval,
    statements: HashMap<StatementKey, String>,
    in_document: bool,
}

impl<C: Connection> DataHandler<C> {
    /// Create a handler; the key strategy follows the dialect
    pub fn new(connection: C, dialect: Dialect, commit_mode: CommitMode) -> Self {
        Self {
            connection,
            dialect,
            commit_mode,
            key_retrieval: KeyRetrieval::for_dialect(dialect),
            statements: HashMap::new(),
            in_document: false,
        }
    }

    /// Override the generated-key strategy
    pub fn with_key_retrieval(mut self, key_retrieval: KeyRetrieval) -> Self {
        self.key_retrieval = key_retrieval;
        self
    }

    /// The dialect statements are built in
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The underlying connection
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// The underlying connection, mutably
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Give back the connection
    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Number of distinct statements built so far
    pub fn cached_statements(&self) -> usize {
        self.statements.len()
    }

    /// Begin storing a document
    pub fn start_document(&mut self) -> Result<()> {
        if self.in_document {
            return Err(Error::Database(
                "start_document called while a document is in progress".to_string(),
            ));
        }
        self.in_document = true;
        Ok(())
    }

    /// Finish storing a document, committing when the mode says so
    pub fn end_document(&mut self) -> Result<()> {
        if !self.in_document {
            return Err(Error::Database(
                "end_document called without start_document".to_string(),
            ));
        }
        self.in_document = false;
        if self.commit_mode == CommitMode::AfterDocument {
            self.connection.commit()?;
        }
        Ok(())
    }

    /// Abandon the current document and roll back
    pub fn abort_document(&mut self) -> Result<()> {
        self.in_document = false;
        self.connection.rollback()
    }

    /// Insert a row
    ///
    /// Returns the generated key when the table's key is database-generated
    /// and the row does not supply it.
    pub fn insert(&mut self, table: &Table, mut row: Row) -> Result<Option<Value>> {
        // A NULL generated key counts as absent
        if let Some(key) = table.primary_key.as_ref().filter(|_| table.has_generated_key()) {
            for column in &key.columns {
                if row.get(column).is_some_and(Value::is_null) {
                    row.shift_remove(column);
                }
            }
        }

        let generated_column = table
            .primary_key
            .as_ref()
            .filter(|_| table.has_generated_key())
            .filter(|key| key.columns.len() == 1 && !row.contains_key(&key.columns[0]))
            .map(|key| key.columns[0].clone());

        let columns: Vec<String> = row.keys().cloned().collect();
        let params: Vec<Value> = row.into_values().collect();

        let Some(key_column) = generated_column else {
            let sql = self.statement(Operation::Insert, table, &columns, None);
            self.connection.execute(&sql, &params)?;
            self.after_statement()?;
            return Ok(None);
        };

        let key = match self.key_retrieval {
            KeyRetrieval::Returning => {
                let sql = self.statement(Operation::Insert, table, &columns, Some(&key_column));
                self.connection.query_value(&sql, &params)?
            }
            KeyRetrieval::LastInsertId => {
                let sql = self.statement(Operation::Insert, table, &columns, None);
                self.connection.execute(&sql, &params)?;
                let query = dml::last_insert_id(self.dialect).ok_or_else(|| {
                    Error::NotImplemented(format!("no last-insert-id query for {}", self.dialect))
                })?;
                self.connection.query_value(query, &[])?
            }
            KeyRetrieval::Driver => {
                let sql = self.statement(Operation::Insert, table, &columns, None);
                self.connection.execute(&sql, &params)?;
                Some(self.connection.generated_key()?)
            }
            KeyRetrieval::Unsupported => {
                return Err(Error::NotImplemented(format!(
                    "retrieving generated keys for table '{}' is not supported on {}",
                    table.name, self.dialect
                )))
            }
        };
        let key = key.filter(|k| !k.is_null()).ok_or_else(|| {
            Error::Database(format!("No key was generated for table '{}'", table.name))
        })?;

        self.after_statement()?;
        debug!(table = %table.name, key = %key, "row inserted");
        Ok(Some(key))
    }

    /// Update the row with the given key; returns the number of rows changed
    pub fn update(&mut self, table: &Table, key: &[Value], mut row: Row) -> Result<u64> {
        let key_columns = key_columns(table, key)?;
        row.retain(|column, _| !key_columns.contains(column));
        if row.is_empty() {
            return Ok(0);
        }

        let mut columns: Vec<String> = row.keys().cloned().collect();
        let mut params: Vec<Value> = row.into_values().collect();
        params.extend(key.iter().cloned());
        columns.extend(key_columns.iter().cloned());

        let sql = self.statement(Operation::Update, table, &columns, None);
        let count = self.connection.execute(&sql, &params)?;
        self.after_statement()?;
        Ok(count)
    }

    /// Delete the row with the given key; a missing row is an error
    pub fn delete(&mut self, table: &Table, key: &[Value]) -> Result<u64> {
        let count = self.delete_rows(table, key)?;
        if count == 0 {
            return Err(Error::Database(format!(
                "No row with key ({}) in table '{}'",
                display_key(key),
                table.name
            )));
        }
        Ok(count)
    }

    /// Delete the row with the given key if it exists
    pub fn soft_delete(&mut self, table: &Table, key: &[Value]) -> Result<u64> {
        if !self.exists(table, key)? {
            return Ok(0);
        }
        self.delete_rows(table, key)
    }

    /// Whether a row with the given key exists
    pub fn exists(&mut self, table: &Table, key: &[Value]) -> Result<bool> {
        let columns = key_columns(table, key)?;
        let sql = self.statement(Operation::Exists, table, &columns, None);
        let count = self.connection.query_value(&sql, key)?;
        Ok(match count {
            Some(Value::Integer(n)) => n > 0,
            Some(Value::Text(n)) => n.trim() != "0",
            _ => false,
        })
    }

    /// Insert a row unless its key is already present
    pub fn soft_insert(&mut self, table: &Table, row: Row) -> Result<Option<Value>> {
        if let Some(key) = row_key(table, &row) {
            if self.exists(table, &key)? {
                trace!(table = %table.name, "soft insert skipped; row exists");
                return Ok(None);
            }
        }
        self.insert(table, row)
    }

    /// Update the row if its key is present, otherwise insert it
    pub fn update_or_insert(&mut self, table: &Table, row: Row) -> Result<Option<Value>> {
        if let Some(key) = row_key(table, &row) {
            if self.exists(table, &key)? {
                self.update(table, &key, row)?;
                return Ok(None);
            }
        }
        self.insert(table, row)
    }

    /// Run a compiled action for one row of a class table
    ///
    /// `Update` with named properties only touches their columns; the key
    /// columns must be present in the row for every action except inserts.
    pub fn apply(&mut self, action: &ActionKind, class_map: &ClassMap, table: &Table, row: Row) -> Result<Outcome> {
        match action {
            ActionKind::None => Ok(Outcome::Skipped),
            ActionKind::Insert => Ok(Outcome::Inserted(self.insert(table, row)?)),
            ActionKind::SoftInsert => {
                if let Some(key) = row_key(table, &row) {
                    if self.exists(table, &key)? {
                        return Ok(Outcome::Skipped);
                    }
                }
                Ok(Outcome::Inserted(self.insert(table, row)?))
            }
            ActionKind::UpdateOrInsert => {
                if let Some(key) = row_key(table, &row) {
                    if self.exists(table, &key)? {
                        return Ok(Outcome::Updated(self.update(table, &key, row)?));
                    }
                }
                Ok(Outcome::Inserted(self.insert(table, row)?))
            }
            ActionKind::Delete => {
                let key = require_row_key(table, &row)?;
                Ok(Outcome::Deleted(self.delete(table, &key)?))
            }
            ActionKind::SoftDelete => {
                let key = require_row_key(table, &row)?;
                match self.soft_delete(table, &key)? {
                    0 => Ok(Outcome::Skipped),
                    n => Ok(Outcome::Deleted(n)),
                }
            }
            ActionKind::Update(properties) => {
                let key = require_row_key(table, &row)?;
                let row = if properties.is_empty() {
                    row
                } else {
                    let columns = update_columns(class_map, properties);
                    row.into_iter()
                        .filter(|(column, _)| columns.contains(column))
                        .collect()
                };
                Ok(Outcome::Updated(self.update(table, &key, row)?))
            }
        }
    }

    fn delete_rows(&mut self, table: &Table, key: &[Value]) -> Result<u64> {
        let columns = key_columns(table, key)?;
        let sql = self.statement(Operation::Delete, table, &columns, None);
        let count = self.connection.execute(&sql, key)?;
        self.after_statement()?;
        Ok(count)
    }

    fn after_statement(&mut self) -> Result<()> {
        if self.commit_mode == CommitMode::AfterStatement {
            self.connection.commit()?;
        }
        Ok(())
    }

    /// SQL for an operation, built once per table and column set
    ///
    /// For updates `columns` holds the SET columns followed by the key
    /// columns of the table.
    fn statement(&mut self, operation: Operation, table: &Table, columns: &[String], returning: Option<&str>) -> String {
        let mut cache_columns = columns.to_vec();
        if let Some(returning) = returning {
            cache_columns.push(format!("RETURNING {}", returning));
        }
        let key = StatementKey {
            operation,
            table: table.name.clone(),
            columns: cache_columns,
        };
        if let Some(sql) = self.statements.get(&key) {
            return sql.clone();
        }

        let dialect = self.dialect;
        let sql = match operation {
            Operation::Insert => dml::insert(dialect, &table.name, columns, returning),
            Operation::Update => {
                let key_len = table.primary_key.as_ref().map_or(0, |k| k.columns.len());
                let (set, key) = columns.split_at(columns.len() - key_len.min(columns.len()));
                dml::update(dialect, &table.name, set, key)
            }
            Operation::Delete => dml::delete(dialect, &table.name, columns),
            Operation::Exists => dml::exists(dialect, &table.name, columns),
        };
        trace!(sql = %sql, "statement built");
        self.statements.insert(key, sql.clone());
        sql
    }
}

fn key_columns(table: &Table, key: &[Value]) -> Result<Vec<String>> {
    let primary_key = table
        .primary_key
        .as_ref()
        .ok_or_else(|| Error::InvalidMap(format!("Table '{}' has no primary key", table.name)))?;
    if primary_key.columns.len() != key.len() {
        return Err(Error::InvalidMap(format!(
            "Key '{}' has {} columns but {} values were given",
            primary_key.name,
            primary_key.columns.len(),
            key.len()
        )));
    }
    Ok(primary_key.columns.clone())
}

/// Key values taken from a row, when every key column is present and not NULL
fn row_key(table: &Table, row: &Row) -> Option<Vec<Value>> {
    table.primary_key.as_ref()?.columns.iter().map(|c| {
        row.get(c).filter(|v| !v.is_null()).cloned()
    }).collect()
}

fn require_row_key(table: &Table, row: &Row) -> Result<Vec<Value>> {
    row_key(table, row).ok_or_else(|| {
        Error::Database(format!(
            "Row for table '{}' does not contain its key",
            table.name
        ))
    })
}

/// Class-table columns holding the given properties
fn update_columns(class_map: &ClassMap, properties: &[UpdateProperty]) -> Vec<String> {
    class_map
        .property_maps
        .iter()
        .filter(|p| {
            properties.iter().any(|u| match (u, &p.source) {
                (UpdateProperty::Attribute(a), PropertySource::Attribute(b))
                | (UpdateProperty::ElementType(a), PropertySource::ElementType(b)) => {
                    a.universal() == b.universal()
                }
                (UpdateProperty::PCData, PropertySource::PCData) => true,
                _ => false,
            })
        })
        .filter_map(|p| match &p.target {
            PropertyTarget::Column(column) => Some(column.clone()),
            PropertyTarget::PropertyTable { .. } => None,
        })
        .collect()
}

fn display_key(key: &[Value]) -> String {
    key.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtd::DtdParser;
    use crate::mapping::{Map, MapFactory, MapOptions};
    use crate::namespaces::XmlName;
    use std::collections::VecDeque;

    /// Records statements and answers queries from a script
    #[derive(Default)]
    struct MockConnection {
        executed: Vec<(String, Vec<Value>)>,
        answers: VecDeque<Option<Value>>,
        affected: u64,
        commits: usize,
        rollbacks: usize,
        next_key: Option<i64>,
    }

    impl MockConnection {
        fn answering(answers: Vec<Option<Value>>) -> Self {
            Self {
                answers: answers.into(),
                affected: 1,
                ..Self::default()
            }
        }

        fn sql(&self) -> Vec<&str> {
            self.executed.iter().map(|(sql, _)| sql.as_str()).collect()
        }
    }

    impl Connection for MockConnection {
        fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
            self.executed.push((sql.to_string(), params.to_vec()));
            Ok(self.affected)
        }

        fn query_value(&mut self, sql: &str, params: &[Value]) -> Result<Option<Value>> {
            self.executed.push((sql.to_string(), params.to_vec()));
            Ok(self.answers.pop_front().flatten())
        }

        fn commit(&mut self) -> Result<()> {
            self.commits += 1;
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            self.rollbacks += 1;
            Ok(())
        }

        fn generated_key(&mut self) -> Result<Value> {
            self.next_key
                .map(Value::Integer)
                .ok_or_else(|| Error::Database("no key".to_string()))
        }
    }

    fn orders_map() -> Map {
        let dtd = DtdParser::new()
            .parse_str(
                "<!ELEMENT Order (Customer, Note?)>\n<!ATTLIST Order number CDATA #REQUIRED>\n<!ELEMENT Customer (#PCDATA)>\n<!ELEMENT Note (#PCDATA)>",
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

    #[test]
    fn test_insert_returning() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let conn = MockConnection::answering(vec![Some(Value::Integer(41))]);
        let mut handler = DataHandler::new(conn, Dialect::PostgreSql, CommitMode::AfterStatement);

        let key = handler
            .insert(table, row(&[("number", "A-1".into()), ("Customer", "ACME".into())]))
            .unwrap();
        assert_eq!(key, Some(Value::Integer(41)));

        let conn = handler.into_connection();
        assert_eq!(
            conn.sql(),
            vec![r#"INSERT INTO "Order" ("number", "Customer") VALUES ($1, $2) RETURNING "OrderPK""#]
        );
        assert_eq!(conn.commits, 1);
    }

    #[test]
    fn test_insert_last_insert_id() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let conn = MockConnection::answering(vec![Some(Value::Integer(7))]);
        let mut handler = DataHandler::new(conn, Dialect::MySql, CommitMode::None);

        let key = handler.insert(table, row(&[("number", "A-1".into())])).unwrap();
        assert_eq!(key, Some(Value::Integer(7)));
        assert_eq!(
            handler.connection().sql(),
            vec![
                "INSERT INTO `Order` (`number`) VALUES (?)",
                "SELECT LAST_INSERT_ID()"
            ]
        );
        assert_eq!(handler.connection().commits, 0);
    }

    #[test]
    fn test_insert_driver_key() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let mut conn = MockConnection::answering(vec![]);
        conn.next_key = Some(3);
        let mut handler = DataHandler::new(conn, Dialect::Standard, CommitMode::None);
        assert_eq!(
            handler.insert(table, row(&[("number", "A-1".into())])).unwrap(),
            Some(Value::Integer(3))
        );
    }

    #[test]
    fn test_insert_unsupported_key_retrieval() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let mut handler =
            DataHandler::new(MockConnection::default(), Dialect::Oracle, CommitMode::None);
        let err = handler.insert(table, row(&[("number", "A-1".into())])).unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
        assert!(handler.connection().executed.is_empty());
    }

    #[test]
    fn test_insert_with_explicit_key() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let mut handler =
            DataHandler::new(MockConnection::answering(vec![]), Dialect::Oracle, CommitMode::None);
        let key = handler
            .insert(table, row(&[("OrderPK", Value::Integer(5)), ("number", "A-1".into())]))
            .unwrap();
        assert_eq!(key, None);
        assert_eq!(
            handler.connection().sql(),
            vec![r#"INSERT INTO "Order" ("OrderPK", "number") VALUES (?, ?)"#]
        );
    }

    #[test]
    fn test_insert_null_key_is_generated() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let conn = MockConnection::answering(vec![Some(Value::Integer(12))]);
        let mut handler = DataHandler::new(conn, Dialect::PostgreSql, CommitMode::None);

        let key = handler
            .insert(table, row(&[("OrderPK", Value::Null), ("number", "A".into())]))
            .unwrap();
        assert_eq!(key, Some(Value::Integer(12)));
        assert_eq!(
            handler.connection().executed,
            vec![(
                r#"INSERT INTO "Order" ("number") VALUES ($1) RETURNING "OrderPK""#.to_string(),
                vec![Value::from("A")]
            )]
        );
    }

    #[test]
    fn test_update_or_insert_null_key_inserts() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let conn = MockConnection::answering(vec![Some(Value::Integer(3))]);
        let mut handler = DataHandler::new(conn, Dialect::PostgreSql, CommitMode::None);

        let key = handler
            .update_or_insert(table, row(&[("OrderPK", Value::Null), ("number", "A".into())]))
            .unwrap();
        assert_eq!(key, Some(Value::Integer(3)));
        assert_eq!(
            handler.connection().sql(),
            vec![r#"INSERT INTO "Order" ("number") VALUES ($1) RETURNING "OrderPK""#]
        );
    }

    #[test]
    fn test_update_and_delete() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let mut handler = DataHandler::new(
            MockConnection::answering(vec![]),
            Dialect::PostgreSql,
            CommitMode::None,
        );
        let key = [Value::Integer(9)];

        assert_eq!(handler.update(table, &key, row(&[("number", "B".into())])).unwrap(), 1);
        assert_eq!(handler.delete(table, &key).unwrap(), 1);

        let (sql, params) = &handler.connection().executed[0];
        assert_eq!(sql, r#"UPDATE "Order" SET "number" = $1 WHERE "OrderPK" = $2"#);
        assert_eq!(params, &vec![Value::from("B"), Value::Integer(9)]);
        assert_eq!(
            handler.connection().executed[1].0,
            r#"DELETE FROM "Order" WHERE "OrderPK" = $1"#
        );
    }

    #[test]
    fn test_delete_missing_row_fails() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let mut conn = MockConnection::default();
        conn.affected = 0;
        let mut handler = DataHandler::new(conn, Dialect::Standard, CommitMode::None);
        assert!(handler.delete(table, &[Value::Integer(1)]).is_err());
    }

    #[test]
    fn test_wrong_key_arity() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let mut handler =
            DataHandler::new(MockConnection::default(), Dialect::Standard, CommitMode::None);
        let err = handler.exists(table, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidMap(_)));
    }

    #[test]
    fn test_soft_insert_skips_existing_row() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let conn = MockConnection::answering(vec![Some(Value::Integer(1))]);
        let mut handler = DataHandler::new(conn, Dialect::Standard, CommitMode::None);

        let key = handler
            .soft_insert(table, row(&[("OrderPK", Value::Integer(1)), ("number", "A".into())]))
            .unwrap();
        assert_eq!(key, None);
        assert_eq!(
            handler.connection().sql(),
            vec![r#"SELECT COUNT(*) FROM "Order" WHERE "OrderPK" = ?"#]
        );
    }

    #[test]
    fn test_update_or_insert() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let conn = MockConnection::answering(vec![Some(Value::Integer(1)), Some(Value::Integer(0))]);
        let mut handler = DataHandler::new(conn, Dialect::Standard, CommitMode::None);
        let existing = row(&[("OrderPK", Value::Integer(1)), ("number", "A".into())]);
        let fresh = row(&[("OrderPK", Value::Integer(2)), ("number", "B".into())]);

        handler.update_or_insert(table, existing).unwrap();
        handler.update_or_insert(table, fresh).unwrap();

        assert_eq!(
            handler.connection().sql(),
            vec![
                r#"SELECT COUNT(*) FROM "Order" WHERE "OrderPK" = ?"#,
                r#"UPDATE "Order" SET "number" = ? WHERE "OrderPK" = ?"#,
                r#"SELECT COUNT(*) FROM "Order" WHERE "OrderPK" = ?"#,
                r#"INSERT INTO "Order" ("OrderPK", "number") VALUES (?, ?)"#,
            ]
        );
        assert_eq!(handler.cached_statements(), 3);
    }

    #[test]
    fn test_soft_delete() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let conn = MockConnection::answering(vec![Some(Value::Integer(0))]);
        let mut handler = DataHandler::new(conn, Dialect::Standard, CommitMode::None);
        assert_eq!(handler.soft_delete(table, &[Value::Integer(4)]).unwrap(), 0);
        assert_eq!(handler.connection().executed.len(), 1);
    }

    #[test]
    fn test_commit_after_document() {
        let map = orders_map();
        let table = map.table("Order").unwrap();
        let conn = MockConnection::answering(vec![]);
        let mut handler = DataHandler::new(conn, Dialect::Standard, CommitMode::AfterDocument);

        handler.start_document().unwrap();
        assert!(handler.start_document().is_err());
        handler
            .update(table, &[Value::Integer(1)], row(&[("number", "A".into())]))
            .unwrap();
        handler
            .update(table, &[Value::Integer(2)], row(&[("number", "B".into())]))
            .unwrap();
        assert_eq!(handler.connection().commits, 0);
        handler.end_document().unwrap();
        assert_eq!(handler.connection().commits, 1);
        assert!(handler.end_document().is_err());
        assert_eq!(handler.cached_statements(), 1);
    }

    #[test]
    fn test_apply_update_with_properties() {
        let map = orders_map();
        let class_map = map.class_map("Order").unwrap();
        let table = map.table("Order").unwrap();
        let mut handler = DataHandler::new(
            MockConnection::answering(vec![]),
            Dialect::Standard,
            CommitMode::None,
        );
        let action = ActionKind::Update(vec![UpdateProperty::ElementType(XmlName::local("Customer"))]);

        let outcome = handler
            .apply(
                &action,
                class_map,
                table,
                row(&[
                    ("OrderPK", Value::Integer(1)),
                    ("number", "A".into()),
                    ("Customer", "ACME".into()),
                ]),
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Updated(1));
        assert_eq!(
            handler.connection().sql(),
            vec![r#"UPDATE "Order" SET "Customer" = ? WHERE "OrderPK" = ?"#]
        );
    }

    #[test]
    fn test_apply_dispatch() {
        let map = orders_map();
        let class_map = map.class_map("Order").unwrap();
        let table = map.table("Order").unwrap();
        let conn = MockConnection::answering(vec![Some(Value::Integer(12))]);
        let mut handler = DataHandler::new(conn, Dialect::DuckDb, CommitMode::None);

        assert_eq!(
            handler
                .apply(&ActionKind::None, class_map, table, Row::new())
                .unwrap(),
            Outcome::Skipped
        );
        assert_eq!(
            handler
                .apply(&ActionKind::Insert, class_map, table, row(&[("number", "A".into())]))
                .unwrap(),
            Outcome::Inserted(Some(Value::Integer(12)))
        );
        assert_eq!(
            handler
                .apply(
                    &ActionKind::Delete,
                    class_map,
                    table,
                    row(&[("OrderPK", Value::Integer(12))])
                )
                .unwrap(),
            Outcome::Deleted(1)
        );
        assert!(handler
            .apply(&ActionKind::Delete, class_map, table, Row::new())
            .is_err());
    }
}
