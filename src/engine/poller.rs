//! Drives one remote classification job to a terminal state
//!
//! Submit once, then poll at a fixed interval for a bounded number of
//! attempts. The interval elapses before every poll, including the first.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::client::{ClassificationApi, JobStatus, RawClassification, ScanMode, SubmitRequest};
use crate::error::{Result, ScanError};
use crate::models::ScanRequest;
use crate::session::SessionProvider;

/// Polling behaviour for classification jobs
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Log progress every N non-terminal polls
    pub progress_every: u32,
    pub mode: ScanMode,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
            progress_every: 10,
            mode: ScanMode::Hybrid,
        }
    }
}

pub struct ClassificationPoller {
    api: Arc<dyn ClassificationApi>,
    sessions: Arc<dyn SessionProvider>,
    settings: PollSettings,
}

impl ClassificationPoller {
    pub fn new(
        api: Arc<dyn ClassificationApi>,
        sessions: Arc<dyn SessionProvider>,
        settings: PollSettings,
    ) -> Self {
        Self {
            api,
            sessions,
            settings,
        }
    }

    /// Run a job for `request` and return the raw per-column verdicts.
    pub async fn run(&self, request: &ScanRequest) -> Result<Vec<RawClassification>> {
        let ctx = self
            .sessions
            .resolve(&request.session)
            .map_err(ScanError::MissingContext)?;

        let submit = SubmitRequest {
            database_id: ctx.database_id.clone(),
            table_name: request.table_name.clone(),
            mode: self.settings.mode,
        };
        let response = self.api.submit(&ctx.project_id, &submit).await?;
        let job_id = response
            .job_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ScanError::Submission(format!(
                    "no job id returned for {}",
                    request.cache_key()
                ))
            })?;

        info!(
            "Submitted classification job {} for {} ({:?}, connection {:?})",
            job_id,
            request.cache_key(),
            request.source,
            ctx.connection_id
        );

        let max_attempts = self.settings.max_attempts.max(1);
        let progress_every = self.settings.progress_every.max(1);

        for attempt in 1..=max_attempts {
            tokio::time::sleep(self.settings.interval).await;

            let poll = match self.api.poll(&ctx.project_id, &job_id).await {
                Ok(poll) => poll,
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "Poll {}/{} for job {} failed, retrying: {}",
                        attempt, max_attempts, job_id, e
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            if poll.status.is_success() {
                let results = poll.results.unwrap_or_default();
                debug!(
                    "Job {} finished after {} polls with {} columns",
                    job_id,
                    attempt,
                    results.len()
                );
                return Ok(results);
            }

            if poll.status.is_failure() {
                return Err(ScanError::JobFailed {
                    job_id,
                    status: poll.status.to_string(),
                    code: poll.error_code.unwrap_or_default(),
                    message: poll.error_message.unwrap_or_default(),
                }
                .into());
            }

            if attempt % progress_every == 0 {
                info!(
                    "Job {} still {} after {}/{} polls",
                    job_id, poll.status, attempt, max_attempts
                );
            } else if let JobStatus::Other(raw) = &poll.status {
                debug!("Job {} reported unknown status {}", job_id, raw);
            }
        }

        Err(ScanError::Timeout {
            job_id,
            attempts: max_attempts,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::client::{MockClassificationClient, PollResponse, SubmitResponse};
    use crate::error::{ApiError, Error, SessionError};
    use crate::models::RawLevel;
    use crate::session::{ConfigSessionProvider, SessionEntry};

    fn sessions() -> Arc<dyn SessionProvider> {
        let mut map = BTreeMap::new();
        map.insert(
            "s1".to_string(),
            SessionEntry {
                project_id: Some("p-1".into()),
                connection_id: None,
                database_id: Some("db-1".into()),
            },
        );
        Arc::new(ConfigSessionProvider::new(map))
    }

    fn fast() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(1),
            max_attempts: 60,
            progress_every: 10,
            mode: ScanMode::Rule,
        }
    }

    fn success(results: Vec<RawClassification>) -> PollResponse {
        PollResponse {
            status: JobStatus::Success,
            results: Some(results),
            error_code: None,
            error_message: None,
        }
    }

    fn email() -> RawClassification {
        RawClassification {
            column_name: "email".into(),
            level: RawLevel::Code(2),
            reason: Some("email pattern".into()),
            confidence: Some(0.9),
        }
    }

    fn request() -> ScanRequest {
        ScanRequest::new("sales", "customers", "s1")
    }

    #[tokio::test]
    async fn test_success_after_three_running_polls() {
        let mock = Arc::new(
            MockClassificationClient::new()
                .with_job_id("job-1")
                .await
                .running_then(3, success(vec![email()]))
                .await,
        );
        let poller = ClassificationPoller::new(mock.clone(), sessions(), fast());

        let results = poller.run(&request()).await.unwrap();
        assert_eq!(results, vec![email()]);

        let counts = mock.call_counts().await;
        assert_eq!(counts.submit, 1);
        assert_eq!(counts.poll, 4);

        let submitted = &mock.submissions().await[0];
        assert_eq!(submitted.project_id, "p-1");
        assert_eq!(submitted.request.database_id, "db-1");
        assert_eq!(submitted.request.mode, ScanMode::Rule);
    }

    #[tokio::test]
    async fn test_failed_on_first_poll_carries_remote_detail() {
        let failed = PollResponse {
            status: JobStatus::Failed,
            results: None,
            error_code: Some("E_LOCKED".into()),
            error_message: Some("table is locked".into()),
        };
        let mock = Arc::new(MockClassificationClient::new().with_polls(vec![Ok(failed)]).await);
        let poller = ClassificationPoller::new(mock.clone(), sessions(), fast());

        match poller.run(&request()).await {
            Err(Error::Scan(ScanError::JobFailed { code, message, .. })) => {
                assert_eq!(code, "E_LOCKED");
                assert_eq!(message, "table is locked");
            }
            other => panic!("expected job failure, got {:?}", other),
        }
        assert_eq!(mock.call_counts().await.poll, 1);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_is_timeout() {
        let mock = Arc::new(MockClassificationClient::new().with_job_id("job-t").await);
        let poller = ClassificationPoller::new(mock.clone(), sessions(), fast());

        match poller.run(&request()).await {
            Err(Error::Scan(ScanError::Timeout { job_id, attempts })) => {
                assert_eq!(job_id, "job-t");
                assert_eq!(attempts, 60);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(mock.call_counts().await.poll, 60);
    }

    #[tokio::test]
    async fn test_missing_results_is_empty_list() {
        let mock = Arc::new(
            MockClassificationClient::new()
                .with_polls(vec![Ok(PollResponse::with_status(JobStatus::Completed))])
                .await,
        );
        let poller = ClassificationPoller::new(mock, sessions(), fast());
        assert!(poller.run(&request()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_job_id_is_submission_error() {
        let mock = Arc::new(
            MockClassificationClient::new()
                .with_submit_response(SubmitResponse {
                    job_id: Some("  ".into()),
                })
                .await,
        );
        let poller = ClassificationPoller::new(mock.clone(), sessions(), fast());

        assert!(matches!(
            poller.run(&request()).await,
            Err(Error::Scan(ScanError::Submission(_)))
        ));
        assert_eq!(mock.call_counts().await.poll, 0);
    }

    #[tokio::test]
    async fn test_unknown_session_fails_before_submit() {
        let mock = Arc::new(MockClassificationClient::new());
        let poller = ClassificationPoller::new(mock.clone(), sessions(), fast());

        let req = ScanRequest::new("sales", "customers", "missing");
        assert!(matches!(
            poller.run(&req).await,
            Err(Error::Scan(ScanError::MissingContext(SessionError::NotFound(_))))
        ));
        assert_eq!(mock.call_counts().await.submit, 0);
    }

    #[tokio::test]
    async fn test_transient_poll_error_is_retried() {
        let mock = Arc::new(
            MockClassificationClient::new()
                .with_polls(vec![
                    Err(ApiError::Network("reset".into())),
                    Ok(success(vec![email()])),
                ])
                .await,
        );
        let poller = ClassificationPoller::new(mock.clone(), sessions(), fast());

        assert_eq!(poller.run(&request()).await.unwrap().len(), 1);
        assert_eq!(mock.call_counts().await.poll, 2);
    }

    #[tokio::test]
    async fn test_error_on_final_attempt_is_returned() {
        let mut polls: Vec<_> = (0..2)
            .map(|_| Ok(PollResponse::with_status(JobStatus::Running)))
            .collect();
        polls.push(Err(ApiError::ServerError("down".into())));
        let mock = Arc::new(MockClassificationClient::new().with_polls(polls).await);
        let settings = PollSettings {
            max_attempts: 3,
            ..fast()
        };
        let poller = ClassificationPoller::new(mock, sessions(), settings);

        assert!(matches!(
            poller.run(&request()).await,
            Err(Error::Api(ApiError::ServerError(_)))
        ));
    }
}
