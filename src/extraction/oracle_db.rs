// src/extraction/oracle_db.rs
//! Oracle backend for the source ports, built on the `oracle` crate (ODPI-C).
//!
//! The Oracle client library is loaded at connect time, so a missing
//! Instant Client surfaces as a connection error rather than a build error.

use super::source::{CellValue, ConnectionDescriptor, DataSource, QueryResult, SourceSession};
use crate::error::AppError;
use chrono::NaiveDateTime;
use oracle::sql_type::OracleType;
use oracle::{Connection, Row};

/// Opens Oracle sessions from a [`ConnectionDescriptor`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OracleSource;

impl OracleSource {
    pub fn new() -> Self {
        Self
    }
}

impl DataSource for OracleSource {
    fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn SourceSession>, AppError> {
        let target = descriptor.to_string();
        log::debug!(
            "Opening Oracle session {} (client encoding {})",
            target,
            descriptor.encoding
        );

        let connection = Connection::connect(
            &descriptor.username,
            descriptor.password.expose(),
            descriptor.connect_string(),
        )
        .map_err(|e| AppError::Connection {
            target,
            message: e.to_string(),
        })?;

        Ok(Box::new(OracleSession { connection }))
    }
}

/// How a column's values are pulled out of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnReader {
    Integer,
    /// Any other `NUMBER`; fetched as text so no digit is lost on the way.
    Decimal,
    Float,
    DateTime,
    Text,
}

impl ColumnReader {
    fn for_type(oracle_type: &OracleType) -> Self {
        match oracle_type {
            OracleType::Int64 => Self::Integer,
            OracleType::Number(precision, 0) if (1..=18).contains(precision) => Self::Integer,
            OracleType::Number(..) => Self::Decimal,
            OracleType::Float(_) | OracleType::BinaryFloat | OracleType::BinaryDouble => Self::Float,
            OracleType::Date
            | OracleType::Timestamp(_)
            | OracleType::TimestampTZ(_)
            | OracleType::TimestampLTZ(_) => Self::DateTime,
            _ => Self::Text,
        }
    }

    fn read(self, row: &Row, index: usize) -> oracle::Result<CellValue> {
        Ok(match self {
            Self::Integer => row.get::<usize, Option<i64>>(index)?.into(),
            Self::Decimal => row
                .get::<usize, Option<String>>(index)?
                .map(decimal_cell)
                .unwrap_or(CellValue::Null),
            Self::Float => row.get::<usize, Option<f64>>(index)?.into(),
            Self::DateTime => row
                .get::<usize, Option<NaiveDateTime>>(index)?
                .map(CellValue::DateTime)
                .unwrap_or(CellValue::Null),
            Self::Text => row.get::<usize, Option<String>>(index)?.into(),
        })
    }
}

/// Integers that fit stay integers, fractions that survive an `f64` round
/// trip become floats, and everything else keeps Oracle's digits as text.
fn decimal_cell(digits: String) -> CellValue {
    if let Ok(integer) = digits.parse::<i64>() {
        return CellValue::Integer(integer);
    }
    let is_integral = !digits.contains(&['.', 'e', 'E'][..]);
    match digits.parse::<f64>() {
        Ok(float) if !is_integral && float.is_finite() && float_keeps_digits(&digits, float) => {
            CellValue::Float(float)
        }
        _ => CellValue::Text(digits),
    }
}

fn float_keeps_digits(digits: &str, float: f64) -> bool {
    let significant = |s: &str| -> String {
        s.chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .trim_start_matches('0')
            .trim_end_matches('0')
            .to_string()
    };
    significant(digits) == significant(&float.to_string())
}

struct OracleSession {
    connection: Connection,
}

impl SourceSession for OracleSession {
    fn query(&mut self, statement: &str) -> Result<QueryResult, AppError> {
        let query_error = |e: oracle::Error| AppError::Query {
            message: e.to_string(),
        };

        let result_set = self.connection.query(statement, &[]).map_err(query_error)?;

        let (columns, readers): (Vec<String>, Vec<ColumnReader>) = result_set
            .column_info()
            .iter()
            .map(|info| {
                (
                    info.name().to_string(),
                    ColumnReader::for_type(info.oracle_type()),
                )
            })
            .unzip();

        log::debug!("Result columns: {:?}", columns);

        let mut rows = Vec::new();
        for row in result_set {
            let row = row.map_err(query_error)?;
            let values = readers
                .iter()
                .enumerate()
                .map(|(index, reader)| reader.read(&row, index))
                .collect::<oracle::Result<Vec<_>>>()
                .map_err(query_error)?;
            rows.push(values);
        }

        QueryResult::new(columns, rows)
    }

    fn close(self: Box<Self>) -> Result<(), AppError> {
        self.connection.close().map_err(|e| AppError::Connection {
            target: "oracle session".to_string(),
            message: format!("close failed: {}", e),
        })
    }
}
