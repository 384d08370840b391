//! Classification service wire models

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::RawLevel;

/// How the service should classify columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanMode {
    /// Pattern rules only
    Rule,
    /// Model inference only
    Model,
    /// Rules first, model for the rest
    #[default]
    Hybrid,
}

/// Body of a job submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub database_id: String,
    pub table_name: String,
    pub mode: ScanMode,
}

/// Reply to a job submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// Missing when the service accepted the call but did not start a job
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Remote job status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Submitted,
    Running,
    Success,
    Completed,
    Failed,
    Cancelled,
    /// Anything else; treated as still in progress
    Other(String),
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Completed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "SUBMITTED" | "PENDING" | "QUEUED" => JobStatus::Submitted,
            "RUNNING" | "IN_PROGRESS" | "PROCESSING" => JobStatus::Running,
            "SUCCESS" | "SUCCEEDED" => JobStatus::Success,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" | "ERROR" => JobStatus::Failed,
            "CANCELLED" | "CANCELED" => JobStatus::Cancelled,
            _ => JobStatus::Other(raw),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Submitted => f.write_str("SUBMITTED"),
            JobStatus::Running => f.write_str("RUNNING"),
            JobStatus::Success => f.write_str("SUCCESS"),
            JobStatus::Completed => f.write_str("COMPLETED"),
            JobStatus::Failed => f.write_str("FAILED"),
            JobStatus::Cancelled => f.write_str("CANCELLED"),
            JobStatus::Other(raw) => f.write_str(raw),
        }
    }
}

/// One column verdict as reported by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClassification {
    #[serde(alias = "column", alias = "name")]
    pub column_name: String,

    #[serde(alias = "sensitivityLevel", alias = "riskLevel")]
    pub level: RawLevel,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Reply to a status poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub status: JobStatus,

    #[serde(default)]
    pub results: Option<Vec<RawClassification>>,

    #[serde(default)]
    pub error_code: Option<String>,

    #[serde(default)]
    pub error_message: Option<String>,
}

impl PollResponse {
    #[cfg(test)]
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status,
            results: None,
            error_code: None,
            error_message: None,
        }
    }
}
