//! Remote classification service client

use async_trait::async_trait;

use crate::error::Result;

pub mod http;
#[cfg(test)]
pub mod mock;
pub mod models;

pub use http::HttpClassificationClient;
#[cfg(test)]
pub use mock::MockClassificationClient;
pub use models::{
    JobStatus, PollResponse, RawClassification, ScanMode, SubmitRequest, SubmitResponse,
};

/// Classification service contract
///
/// Jobs are asynchronous: `submit` starts one and `poll` reports its status
/// until it reaches a terminal state.
#[async_trait]
pub trait ClassificationApi: Send + Sync {
    /// Start a classification job for one table
    async fn submit(&self, project_id: &str, request: &SubmitRequest) -> Result<SubmitResponse>;

    /// Fetch the current status of a job
    async fn poll(&self, project_id: &str, job_id: &str) -> Result<PollResponse>;
}
