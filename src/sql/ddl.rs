//! `CREATE TABLE` output
//!
//! Tables are written in map order. A foreign key is declared inside its
//! table when the referenced table already exists (or is the table
//! itself). Forward references are added with `ALTER TABLE` once every
//! table has been created.

use std::collections::HashSet;
use std::io::Write;

use tracing::{debug, warn};

use super::Dialect;
use crate::error::{Error, Result};
use crate::mapping::{ForeignKey, Map, Table};

/// Writes SQL DDL for a map's tables
#[derive(Debug, Clone, Copy, Default)]
pub struct DdlWriter {
    dialect: Dialect,
}

impl DdlWriter {
    /// Create a writer for a dialect
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// The dialect statements are written in
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Write the DDL to a string
    pub fn to_string(&self, map: &Map) -> Result<String> {
        let mut buf = Vec::new();
        self.write(map, &mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::Other(e.to_string()))
    }

    /// Write one `CREATE TABLE` statement per table
    pub fn write<W: Write>(&self, map: &Map, mut out: W) -> Result<()> {
        let mut created: HashSet<&str> = HashSet::new();
        let mut deferred: Vec<(&Table, &ForeignKey)> = Vec::new();

        for (i, table) in map.tables.values().enumerate() {
            if i > 0 {
                writeln!(out)?;
            }
            created.insert(table.name.as_str());

            let (inline, later): (Vec<&ForeignKey>, Vec<&ForeignKey>) = table
                .foreign_keys
                .iter()
                .partition(|fk| created.contains(fk.remote_table.as_str()));
            deferred.extend(later.into_iter().map(|fk| (table, fk)));

            out.write_all(self.create_table(map, table, &inline)?.as_bytes())?;
            debug!(table = %table.name, "wrote CREATE TABLE");
        }

        for (table, fk) in deferred {
            if !self.dialect.supports_alter_foreign_key() {
                warn!(
                    foreign_key = %fk.name,
                    dialect = %self.dialect,
                    "foreign key references a later table and cannot be added afterwards; omitted"
                );
                writeln!(
                    out,
                    "\n-- {} omitted: {} cannot add foreign keys to existing tables",
                    fk.name, self.dialect
                )?;
                continue;
            }
            writeln!(
                out,
                "\nALTER TABLE {} ADD {};",
                self.dialect.quote_identifier(&table.name),
                self.foreign_key_clause(map, fk)?
            )?;
        }
        Ok(())
    }

    fn create_table(&self, map: &Map, table: &Table, foreign_keys: &[&ForeignKey]) -> Result<String> {
        let dialect = self.dialect;
        let mut sql = String::new();
        let generated = table
            .primary_key
            .as_ref()
            .filter(|_| table.has_generated_key());

        // DuckDB has no identity columns; keys come from a sequence.
        if let (Some(key), Dialect::DuckDb) = (generated, dialect) {
            sql.push_str(&format!("CREATE SEQUENCE {};\n", sequence_name(&key.name)));
        }

        sql.push_str(&format!(
            "CREATE TABLE {} (\n",
            dialect.quote_identifier(&table.name)
        ));

        let mut definitions = Vec::new();
        for column in table.columns.values() {
            let mut definition = format!(
                "  {} {}",
                dialect.quote_identifier(&column.name),
                dialect.type_name(column.data_type)
            );
            if let Some(key) = generated {
                if key.columns.len() == 1 && key.columns[0] == column.name {
                    definition.push_str(&identity_clause(dialect, &key.name));
                }
            }
            if !column.nullable {
                definition.push_str(" NOT NULL");
            }
            definitions.push(definition);
        }

        if let Some(key) = &table.primary_key {
            definitions.push(format!("  PRIMARY KEY ({})", self.column_list(&key.columns)));
        }

        for fk in foreign_keys {
            definitions.push(format!("  {}", self.foreign_key_clause(map, fk)?));
        }

        sql.push_str(&definitions.join(",\n"));
        sql.push_str("\n);\n");
        Ok(sql)
    }

    fn foreign_key_clause(&self, map: &Map, fk: &ForeignKey) -> Result<String> {
        let remote = map
            .table(&fk.remote_table)
            .and_then(|t| t.primary_key.as_ref())
            .filter(|key| key.name == fk.remote_key)
            .ok_or_else(|| {
                Error::InvalidMap(format!(
                    "Foreign key '{}' references unknown key '{}' of table '{}'",
                    fk.name, fk.remote_key, fk.remote_table
                ))
            })?;
        Ok(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.dialect.quote_identifier(&fk.name),
            self.column_list(&fk.columns),
            self.dialect.quote_identifier(&fk.remote_table),
            self.column_list(&remote.columns)
        ))
    }

    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Sequence backing a generated key on DuckDB
pub fn sequence_name(key_name: &str) -> String {
    format!("{}_seq", key_name)
}

fn identity_clause(dialect: Dialect, key_name: &str) -> String {
    match dialect {
        Dialect::MySql => " AUTO_INCREMENT".to_string(),
        Dialect::DuckDb => format!(" DEFAULT nextval('{}')", sequence_name(key_name)),
        _ => " GENERATED BY DEFAULT AS IDENTITY".to_string(),
    }
}
