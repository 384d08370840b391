//! Mock classification client for testing
//!
//! Scripted implementation of [`ClassificationApi`] so engine tests can run
//! whole submit/poll cycles without a server.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ClassificationApi, JobStatus, PollResponse, SubmitRequest, SubmitResponse};
use crate::error::{ApiError, Result};

/// Mock classification client.
///
/// Configure the submit reply and a queue of poll replies via builder
/// methods. Once the queue is drained every poll reports `RUNNING`.
///
/// # Example
/// ```ignore
/// let mock = MockClassificationClient::new()
///     .with_job_id("job-1").await
///     .with_polls(vec![Ok(PollResponse::with_status(JobStatus::Success))]).await;
/// ```
pub struct MockClassificationClient {
    /// Reply to `submit`
    submit_response: Arc<Mutex<SubmitResponse>>,
    /// Error to return from `submit` (if any) - consumed on first use
    submit_error: Arc<Mutex<Option<ApiError>>>,
    /// Poll replies, consumed front to back
    polls: Arc<Mutex<VecDeque<std::result::Result<PollResponse, ApiError>>>>,
    /// Track number of calls for verification
    call_count: Arc<Mutex<CallCounts>>,
    /// Captured submissions for test assertions
    submissions: Arc<Mutex<Vec<CapturedSubmit>>>,
}

impl Default for MockClassificationClient {
    fn default() -> Self {
        Self {
            submit_response: Arc::new(Mutex::new(SubmitResponse {
                job_id: Some("mock-job".to_string()),
            })),
            submit_error: Arc::new(Mutex::new(None)),
            polls: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(Mutex::new(CallCounts::default())),
            submissions: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Tracks API call counts for test verification
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CallCounts {
    pub submit: usize,
    pub poll: usize,
}

/// A captured submission for test assertions.
#[derive(Debug, Clone)]
pub struct CapturedSubmit {
    pub project_id: String,
    pub request: SubmitRequest,
}

impl MockClassificationClient {
    /// Create a new mock client whose jobs never finish.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the job id returned by `submit`.
    pub async fn with_job_id(self, job_id: &str) -> Self {
        *self.submit_response.lock().await = SubmitResponse {
            job_id: Some(job_id.to_string()),
        };
        self
    }

    /// Configure the full submit reply (e.g. without a job id).
    pub async fn with_submit_response(self, response: SubmitResponse) -> Self {
        *self.submit_response.lock().await = response;
        self
    }

    /// Configure an error to return from the next `submit`.
    pub async fn with_submit_error(self, error: ApiError) -> Self {
        *self.submit_error.lock().await = Some(error);
        self
    }

    /// Queue poll replies.
    pub async fn with_polls(
        self,
        polls: Vec<std::result::Result<PollResponse, ApiError>>,
    ) -> Self {
        self.polls.lock().await.extend(polls);
        self
    }

    /// Queue `n` RUNNING replies followed by `last`.
    pub async fn running_then(self, n: usize, last: PollResponse) -> Self {
        let mut polls: Vec<_> = (0..n)
            .map(|_| Ok(PollResponse::with_status(JobStatus::Running)))
            .collect();
        polls.push(Ok(last));
        self.with_polls(polls).await
    }

    /// Get the call counts for verification in tests.
    pub async fn call_counts(&self) -> CallCounts {
        self.call_count.lock().await.clone()
    }

    /// Get all captured submissions.
    pub async fn submissions(&self) -> Vec<CapturedSubmit> {
        self.submissions.lock().await.clone()
    }
}

#[async_trait]
impl ClassificationApi for MockClassificationClient {
    async fn submit(&self, project_id: &str, request: &SubmitRequest) -> Result<SubmitResponse> {
        self.call_count.lock().await.submit += 1;
        self.submissions.lock().await.push(CapturedSubmit {
            project_id: project_id.to_string(),
            request: request.clone(),
        });

        if let Some(e) = self.submit_error.lock().await.take() {
            return Err(e.into());
        }
        Ok(self.submit_response.lock().await.clone())
    }

    async fn poll(&self, _project_id: &str, _job_id: &str) -> Result<PollResponse> {
        self.call_count.lock().await.poll += 1;

        match self.polls.lock().await.pop_front() {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(e)) => Err(e.into()),
            None => Ok(PollResponse::with_status(JobStatus::Running)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScanMode;
    use crate::error::Error;

    fn request() -> SubmitRequest {
        SubmitRequest {
            database_id: "db".into(),
            table_name: "t".into(),
            mode: ScanMode::Rule,
        }
    }

    #[tokio::test]
    async fn test_mock_scripted_polls_then_running() {
        let mock = MockClassificationClient::new()
            .with_polls(vec![
                Err(ApiError::Network("flaky".into())),
                Ok(PollResponse::with_status(JobStatus::Success)),
            ])
            .await;

        assert!(matches!(mock.poll("p", "j").await, Err(Error::Api(_))));
        assert!(mock.poll("p", "j").await.unwrap().status.is_success());
        assert_eq!(mock.poll("p", "j").await.unwrap().status, JobStatus::Running);
        assert_eq!(mock.call_counts().await.poll, 3);
    }

    #[tokio::test]
    async fn test_mock_submit_error_consumed_once() {
        let mock = MockClassificationClient::new()
            .with_job_id("job-5")
            .await
            .with_submit_error(ApiError::Unauthorized)
            .await;

        assert!(mock.submit("p", &request()).await.is_err());
        let ok = mock.submit("p", &request()).await.unwrap();
        assert_eq!(ok.job_id.as_deref(), Some("job-5"));

        let captured = mock.submissions().await;
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].project_id, "p");
    }
}
