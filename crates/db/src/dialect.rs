//! The handful of places where SQLite and PostgreSQL SQL differ.
//!
//! Queries are written once in the common subset (`$n` placeholders,
//! `RETURNING`, text dates, explicit BIGINT casts on aggregates) and only the
//! constructs listed here vary.

use std::fmt;

use sqlx::{
    Any,
    any::AnyArguments,
    query::{Query, QueryAs, QueryScalar},
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DialectError {
    #[error("unsupported database url '{0}' (expected sqlite: or postgres://)")]
    UnsupportedUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Sqlite => write!(f, "sqlite"),
            Dialect::Postgres => write!(f, "postgres"),
        }
    }
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self, DialectError> {
        let scheme = url.trim().to_ascii_lowercase();
        if scheme.starts_with("sqlite:") {
            Ok(Dialect::Sqlite)
        } else if scheme.starts_with("postgres://") || scheme.starts_with("postgresql://") {
            Ok(Dialect::Postgres)
        } else {
            Err(DialectError::UnsupportedUrl(url.to_string()))
        }
    }

    /// SQLite serialises writers, so extra connections only add lock contention.
    pub fn default_max_connections(&self) -> u32 {
        match self {
            Dialect::Sqlite => 5,
            Dialect::Postgres => 10,
        }
    }

    /// SQLite's LIKE is already case-insensitive for ASCII.
    pub fn case_insensitive_like(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "LIKE",
            Dialect::Postgres => "ILIKE",
        }
    }

    /// Statement that makes every later writer to `table` wait until the
    /// current transaction ends. SQLite takes its database-wide write lock on
    /// the first write statement, even one that matches no rows.
    pub fn write_lock_sql(&self, table: &str) -> String {
        match self {
            Dialect::Sqlite => format!("UPDATE {table} SET id = id WHERE 1 = 0"),
            Dialect::Postgres => format!("LOCK TABLE {table} IN SHARE ROW EXCLUSIVE MODE"),
        }
    }

    /// Scalar query counting tables named `$1`.
    pub fn table_exists_sql(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
            Dialect::Postgres => {
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = $1"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Text(String),
}

/// Builds a WHERE clause whose placeholders are numbered as they are added.
#[derive(Debug, Clone)]
pub struct Filter {
    dialect: Dialect,
    clauses: Vec<String>,
    values: Vec<FilterValue>,
}

impl Filter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            clauses: Vec::new(),
            values: Vec::new(),
        }
    }

    fn next_placeholder(&mut self, value: FilterValue) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    pub fn eq_i64(mut self, column: &str, value: Option<i64>) -> Self {
        if let Some(value) = value {
            let p = self.next_placeholder(FilterValue::Int(value));
            self.clauses.push(format!("{column} = {p}"));
        }
        self
    }

    pub fn eq_text(mut self, column: &str, value: Option<String>) -> Self {
        if let Some(value) = value {
            let p = self.next_placeholder(FilterValue::Text(value));
            self.clauses.push(format!("{column} = {p}"));
        }
        self
    }

    /// Substring match on any of `columns`; blank terms are ignored.
    pub fn like_ci(mut self, columns: &[&str], term: Option<&str>) -> Self {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return self;
        };
        let pattern = format!("%{}%", term.replace('%', "").replace('_', ""));
        let p = self.next_placeholder(FilterValue::Text(pattern));
        let like = self.dialect.case_insensitive_like();
        let parts: Vec<String> = columns.iter().map(|c| format!("{c} {like} {p}")).collect();
        self.clauses.push(format!("({})", parts.join(" OR ")));
        self
    }

    /// `column < value` on `YYYY-MM-DD` text, which orders lexically.
    pub fn date_before(mut self, column: &str, date: Option<String>) -> Self {
        if let Some(date) = date {
            let p = self.next_placeholder(FilterValue::Text(date));
            self.clauses.push(format!("{column} IS NOT NULL AND {column} < {p}"));
        }
        self
    }

    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn values(&self) -> &[FilterValue] {
        &self.values
    }

    pub fn bind_as<'q, O>(
        &self,
        mut query: QueryAs<'q, Any, O, AnyArguments<'q>>,
    ) -> QueryAs<'q, Any, O, AnyArguments<'q>> {
        for value in &self.values {
            query = match value {
                FilterValue::Int(v) => query.bind(*v),
                FilterValue::Text(v) => query.bind(v.clone()),
            };
        }
        query
    }

    pub fn bind_scalar<'q, O>(
        &self,
        mut query: QueryScalar<'q, Any, O, AnyArguments<'q>>,
    ) -> QueryScalar<'q, Any, O, AnyArguments<'q>> {
        for value in &self.values {
            query = match value {
                FilterValue::Int(v) => query.bind(*v),
                FilterValue::Text(v) => query.bind(v.clone()),
            };
        }
        query
    }

    pub fn bind<'q>(&self, mut query: Query<'q, Any, AnyArguments<'q>>) -> Query<'q, Any, AnyArguments<'q>> {
        for value in &self.values {
            query = match value {
                FilterValue::Int(v) => query.bind(*v),
                FilterValue::Text(v) => query.bind(v.clone()),
            };
        }
        query
    }
}
