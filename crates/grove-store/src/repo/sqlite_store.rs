//! SQLite implementation of the record store contract
//!
//! Collections are tables, fields are columns. Column declared types drive
//! value decoding: `BOOLEAN` columns read back as JSON booleans and `JSON`
//! columns are parsed.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, unknown_collection, unknown_field, Result};
use crate::{db, migrations};
use grove_core::model::Record;
use grove_core::ops::{CollectionSchema, Condition, Filter, RecordStore};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

/// Column metadata read from `PRAGMA table_info`
#[derive(Debug, Clone)]
struct Column {
    name: String,
    decl_type: String,
}

impl Column {
    fn is_boolean(&self) -> bool {
        self.decl_type.contains("BOOL")
    }

    fn is_json(&self) -> bool {
        self.decl_type.contains("JSON")
    }
}

#[derive(Debug, Clone)]
struct TableInfo {
    name: String,
    primary_key: String,
    columns: Vec<Column>,
}

impl TableInfo {
    fn column(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == field)
    }

    fn require(&self, op: &str, field: &str) -> Result<&Column> {
        self.column(field)
            .ok_or_else(|| unknown_field(op, &self.name, field))
    }

    fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Record store over a single SQLite connection
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Open (or create) a database file and apply pending migrations
    ///
    /// # Errors
    ///
    /// Returns `Store` if the file cannot be opened or a migration fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut conn = db::open(path)?;
        migrations::apply_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database with the default schema applied
    ///
    /// # Errors
    ///
    /// Returns `Store` if a migration fails.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = db::open_in_memory()?;
        migrations::apply_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection without touching its schema
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Borrow the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consume the store and return its connection
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn table_info(&self, collection: &str) -> Result<Option<TableInfo>> {
        let exists: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                [collection],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(collection)))
            .map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let decl_type: Option<String> = row.get(2)?;
                let pk: i64 = row.get(5)?;
                Ok((name, decl_type.unwrap_or_default().to_uppercase(), pk))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        let primary_key = rows
            .iter()
            .find(|(_, _, pk)| *pk == 1)
            .map(|(name, _, _)| name.clone())
            .unwrap_or_else(|| "rowid".to_string());
        let columns = rows
            .into_iter()
            .map(|(name, decl_type, _)| Column { name, decl_type })
            .collect();

        Ok(Some(TableInfo {
            name: collection.to_string(),
            primary_key,
            columns,
        }))
    }

    fn require_table(&self, op: &str, collection: &str) -> Result<TableInfo> {
        self.table_info(collection)?
            .ok_or_else(|| unknown_collection(op, collection))
    }

    fn select(
        &self,
        info: &TableInfo,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        let (clause, params) = where_clause("find", info, filter)?;
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY rowid",
            info.select_list(),
            quote_ident(&info.name),
            clause
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql).map_err(from_rusqlite)?;
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(from_rusqlite)? {
            let mut record = Record::new();
            for (i, column) in info.columns.iter().enumerate() {
                let value = row.get_ref(i).map_err(from_rusqlite)?;
                record.insert(column.name.clone(), decode(column, value));
            }
            records.push(record);
        }
        Ok(records)
    }
}

impl RecordStore for SqliteRecordStore {
    fn describe(&self, collection: &str) -> Result<Option<CollectionSchema>> {
        Ok(self.table_info(collection)?.map(|info| CollectionSchema {
            name: info.name,
            primary_key: info.primary_key,
            fields: info.columns.into_iter().map(|c| c.name).collect(),
        }))
    }

    fn find_many(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>> {
        let info = self.require_table("find_many", collection)?;
        self.select(&info, filter, None)
    }

    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Record>> {
        let info = self.require_table("find_one", collection)?;
        Ok(self.select(&info, filter, Some(1))?.into_iter().next())
    }

    fn create(&mut self, collection: &str, record: Record) -> Result<Record> {
        let info = self.require_table("create", collection)?;

        let mut columns = Vec::new();
        let mut params = Vec::new();
        for (field, value) in &record {
            info.require("create", field)?;
            // Null lets column defaults and AUTOINCREMENT apply
            if value.is_null() {
                continue;
            }
            columns.push(quote_ident(field));
            params.push(encode(value));
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(collection))
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(collection),
                columns.join(", "),
                placeholders(columns.len())
            )
        };
        self.conn
            .execute(&sql, params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;

        let rowid = self.conn.last_insert_rowid();
        let sql = format!(
            "SELECT {} FROM {} WHERE rowid = ?",
            info.select_list(),
            quote_ident(collection)
        );
        let created = self
            .conn
            .query_row(&sql, [rowid], |row| {
                let mut created = Record::new();
                for (i, column) in info.columns.iter().enumerate() {
                    created.insert(column.name.clone(), decode(column, row.get_ref(i)?));
                }
                Ok(created)
            })
            .map_err(from_rusqlite)?;

        tracing::trace!(collection, rowid, "record created");
        Ok(created)
    }

    fn update_many(&mut self, collection: &str, filter: &Filter, patch: &Record) -> Result<usize> {
        let info = self.require_table("update_many", collection)?;
        if patch.is_empty() {
            return Ok(0);
        }

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (field, value) in patch {
            info.require("update_many", field)?;
            assignments.push(format!("{} = ?", quote_ident(field)));
            params.push(encode(value));
        }
        let (clause, where_params) = where_clause("update_many", &info, filter)?;
        params.extend(where_params);

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(collection),
            assignments.join(", "),
            clause
        );
        self.conn
            .execute(&sql, params_from_iter(params.iter()))
            .map_err(from_rusqlite)
    }

    fn delete_many(&mut self, collection: &str, filter: &Filter) -> Result<usize> {
        let info = self.require_table("delete_many", collection)?;
        let (clause, params) = where_clause("delete_many", &info, filter)?;
        let sql = format!("DELETE FROM {} WHERE {}", quote_ident(collection), clause);
        self.conn
            .execute(&sql, params_from_iter(params.iter()))
            .map_err(from_rusqlite)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn where_clause(op: &str, info: &TableInfo, filter: &Filter) -> Result<(String, Vec<SqlValue>)> {
    let mut parts = Vec::new();
    let mut params = Vec::new();

    for condition in filter.conditions() {
        match condition {
            Condition::Eq(field, value) => {
                info.require(op, field)?;
                if value.is_null() {
                    parts.push(format!("{} IS NULL", quote_ident(field)));
                } else {
                    parts.push(format!("{} = ?", quote_ident(field)));
                    params.push(encode(value));
                }
            }
            Condition::In(field, values) => {
                info.require(op, field)?;
                if values.is_empty() {
                    parts.push("0".to_string());
                } else {
                    parts.push(format!(
                        "{} IN ({})",
                        quote_ident(field),
                        placeholders(values.len())
                    ));
                    params.extend(values.iter().map(encode));
                }
            }
        }
    }

    if parts.is_empty() {
        return Ok(("1".to_string(), params));
    }
    Ok((parts.join(" AND "), params))
}

fn encode(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

fn decode(column: &Column, value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if column.is_boolean() => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if column.is_json() {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            } else {
                Value::String(text)
            }
        }
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}
