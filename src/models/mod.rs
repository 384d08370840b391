//! Scan requests and classification results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod level;

pub use level::{RawLevel, SensitivityLevel, normalize};

use crate::cache::key::cache_key;

/// Where a scan request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerSource {
    /// Opened from a table viewer
    TableView,
    /// Opened from a SQL result grid
    SqlResult,
}

/// A column the caller knows about before scanning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl ColumnDescriptor {
    /// Parse `name` or `name:type`.
    pub fn parse(arg: &str) -> Self {
        match arg.split_once(':') {
            Some((name, ty)) if !ty.trim().is_empty() => Self {
                name: name.trim().to_string(),
                data_type: Some(ty.trim().to_string()),
            },
            Some((name, _)) => Self {
                name: name.trim().to_string(),
                data_type: None,
            },
            None => Self {
                name: arg.trim().to_string(),
                data_type: None,
            },
        }
    }
}

/// One request to classify a table
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub table_name: String,
    pub database_name: String,
    /// Opaque handle resolved through the session provider
    pub session: String,
    pub columns: Vec<ColumnDescriptor>,
    pub source: TriggerSource,
}

impl ScanRequest {
    pub fn new(
        database_name: impl Into<String>,
        table_name: impl Into<String>,
        session: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            database_name: database_name.into(),
            session: session.into(),
            columns: Vec::new(),
            source: TriggerSource::TableView,
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnDescriptor>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_source(mut self, source: TriggerSource) -> Self {
        self.source = source;
        self
    }

    pub fn cache_key(&self) -> String {
        cache_key(&self.database_name, &self.table_name)
    }
}

/// Sensitivity verdict for a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnClassification {
    pub column_name: String,
    pub level: SensitivityLevel,
    pub reason: String,
    pub confidence: f64,
}

impl ColumnClassification {
    /// Build a classification from a raw service verdict.
    pub fn from_raw(column_name: String, raw: &RawLevel, reason: String, confidence: f64) -> Self {
        Self {
            column_name,
            level: normalize(raw),
            reason,
            confidence: clamp_confidence(confidence),
        }
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Completed classification of one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub table_name: String,
    pub database_name: String,
    pub columns: Vec<ColumnClassification>,
    pub scanned_at: DateTime<Utc>,
    pub scan_id: String,
}

impl ScanResult {
    pub fn cache_key(&self) -> String {
        cache_key(&self.database_name, &self.table_name)
    }

    /// Columns at or above the given level.
    pub fn at_least(&self, level: SensitivityLevel) -> impl Iterator<Item = &ColumnClassification> {
        self.columns.iter().filter(move |c| c.level >= level)
    }
}
