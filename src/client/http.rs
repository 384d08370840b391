//! HTTP implementation of the classification service client

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{ClassificationApi, PollResponse, SubmitRequest, SubmitResponse};
use crate::error::{ApiError, Result};

/// Default classification service host
pub const DEFAULT_API_HOST: &str = "https://api.sensiscan.dev";

/// Requests per second allowed against the service
const RATE_LIMIT_PER_SECOND: u32 = 10;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Classification service client over HTTP
pub struct HttpClassificationClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl HttpClassificationClient {
    /// Create a client for `api_host` (scheme + host, no trailing path)
    pub fn new(api_host: &str, api_key: Option<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let quota = Quota::per_second(NonZeroU32::new(RATE_LIMIT_PER_SECOND).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            http,
            base_url: format!("{}/api/v1", api_host.trim_end_matches('/')),
            api_key,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    fn jobs_path(project_id: &str) -> String {
        format!("/projects/{}/classification/jobs", project_id)
    }

    /// Make an API request and decode the JSON reply
    async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method.clone(), &url);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        log::debug!("{} {}", method, url);
        let response = builder.send().await.map_err(ApiError::from)?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                let data = response.json::<T>().await.map_err(|e| {
                    ApiError::InvalidResponse(format!("Failed to parse response: {}", e))
                })?;
                Ok(data)
            }
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized.into()),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden.into()),
            StatusCode::NOT_FOUND => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Resource not found".to_string());
                Err(ApiError::NotFound(error_msg).into())
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                Err(ApiError::RateLimit(Duration::from_secs(retry_after)).into())
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Bad request".to_string());
                Err(ApiError::BadRequest(error_msg).into())
            }
            status if status.is_server_error() => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| format!("Server error: {}", status));
                Err(ApiError::ServerError(error_msg).into())
            }
            _ => {
                let error_msg = format!("Unexpected status code: {}", status);
                Err(ApiError::InvalidResponse(error_msg).into())
            }
        }
    }
}

#[async_trait]
impl ClassificationApi for HttpClassificationClient {
    async fn submit(&self, project_id: &str, request: &SubmitRequest) -> Result<SubmitResponse> {
        self.request(Method::POST, &Self::jobs_path(project_id), Some(request))
            .await
    }

    async fn poll(&self, project_id: &str, job_id: &str) -> Result<PollResponse> {
        let path = format!("{}/{}", Self::jobs_path(project_id), job_id);
        self.request::<PollResponse, ()>(Method::GET, &path, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{JobStatus, ScanMode};
    use crate::error::Error;

    fn submit_request() -> SubmitRequest {
        SubmitRequest {
            database_id: "db-42".to_string(),
            table_name: "customers".to_string(),
            mode: ScanMode::Hybrid,
        }
    }

    #[test]
    fn test_client_creation() {
        let client = HttpClassificationClient::new("http://localhost:1/", None);
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url, "http://localhost:1/api/v1");
    }

    #[tokio::test]
    async fn test_submit_posts_job_and_reads_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/projects/p-1/classification/jobs")
            .match_header("authorization", "Bearer secret")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "databaseId": "db-42",
                "tableName": "customers",
                "mode": "HYBRID"
            })))
            .with_status(200)
            .with_body(r#"{"jobId":"job-9"}"#)
            .create_async()
            .await;

        let client = HttpClassificationClient::new(&server.url(), Some("secret".into())).unwrap();
        let resp = client.submit("p-1", &submit_request()).await.unwrap();

        assert_eq!(resp.job_id.as_deref(), Some("job-9"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_poll_decodes_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/projects/p-1/classification/jobs/job-9")
            .with_status(200)
            .with_body(r#"{"status":"RUNNING"}"#)
            .create_async()
            .await;

        let client = HttpClassificationClient::new(&server.url(), None).unwrap();
        let resp = client.poll("p-1", "job-9").await.unwrap();
        assert_eq!(resp.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let mut server = mockito::Server::new_async().await;
        let _unauthorized = server
            .mock("GET", "/api/v1/projects/p-1/classification/jobs/a")
            .with_status(401)
            .create_async()
            .await;
        let _limited = server
            .mock("GET", "/api/v1/projects/p-1/classification/jobs/b")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/api/v1/projects/p-1/classification/jobs/c")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = HttpClassificationClient::new(&server.url(), None).unwrap();

        assert!(matches!(
            client.poll("p-1", "a").await,
            Err(Error::Api(ApiError::Unauthorized))
        ));
        match client.poll("p-1", "b").await {
            Err(Error::Api(ApiError::RateLimit(d))) => assert_eq!(d, Duration::from_secs(7)),
            other => panic!("expected rate limit, got {:?}", other),
        }
        match client.poll("p-1", "c").await {
            Err(Error::Api(ApiError::ServerError(msg))) => assert_eq!(msg, "maintenance"),
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/projects/p-1/classification/jobs/x")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = HttpClassificationClient::new(&server.url(), None).unwrap();
        assert!(matches!(
            client.poll("p-1", "x").await,
            Err(Error::Api(ApiError::InvalidResponse(_)))
        ));
    }
}
