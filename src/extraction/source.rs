// src/extraction/source.rs
//! Ports to the relational source and the tabular data it yields.

use crate::error::AppError;
use crate::types::{Encoding, Secret};
use chrono::NaiveDateTime;
use indexmap::IndexSet;
use std::fmt;

/// Everything needed to open a session against the source database.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub username: String,
    pub password: Secret,
    pub encoding: Encoding,
}

impl ConnectionDescriptor {
    /// Easy Connect string, `//host:port/service_name`.
    pub fn connect_string(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.service_name)
    }

    /// `host:port` of the listener, for reachability probes.
    pub fn listener_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.connect_string())
    }
}

/// A single value of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// The text a reader sees in the cell; column widths are measured on it.
    pub fn rendered(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Width of the rendered value in characters.
    pub fn rendered_width(&self) -> usize {
        match self {
            Self::Text(s) => s.chars().count(),
            other => other.rendered().chars().count(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Materialized result of the configured statement.
///
/// Column names are unique and every row carries exactly one value per
/// column.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self, AppError> {
        let mut seen = IndexSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(AppError::Query {
                    message: format!("duplicate column name '{}' in result", column),
                });
            }
        }

        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(AppError::Query {
                message: format!(
                    "row {} has {} values but the result has {} columns",
                    index,
                    row.len(),
                    columns.len()
                ),
            });
        }

        Ok(Self { columns, rows })
    }

    /// A result with columns and no rows.
    pub fn empty(columns: Vec<String>) -> Result<Self, AppError> {
        Self::new(columns, Vec::new())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Opens sessions against the source database.
pub trait DataSource: Send + Sync {
    /// Establishes a session. Makes exactly one attempt.
    fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn SourceSession>, AppError>;
}

/// A live database session owned by whoever opened it.
pub trait SourceSession: Send {
    /// Executes one statement and materializes every row.
    fn query(&mut self, statement: &str) -> Result<QueryResult, AppError>;

    /// Releases the session. Called exactly once per session.
    fn close(self: Box<Self>) -> Result<(), AppError>;
}
