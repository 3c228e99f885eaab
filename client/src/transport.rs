//! Delivery of encoded reports to the leader, and classification of the leader's response.

use async_trait::async_trait;
use divviup_core::http::HttpErrorResponse;
use divviup_messages::{MediaType, Report};
use http::header::CONTENT_TYPE;
use reqwest::RequestBuilder;
use std::{
    fmt::{self, Debug, Display, Formatter},
    time::Duration as StdDuration,
};
use tracing::debug;
use url::Url;

/// The result of a single upload attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The leader accepted the report.
    Accepted,
    /// The leader rejected the report. Resubmitting it will not help.
    Rejected(Rejection),
    /// The attempt failed in a way that a later attempt may not.
    TransientFailure(FailureReason),
}

/// A rejection of a report by the leader, carrying the DAP problem type it reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    reason: String,
    status: u16,
    detail: Option<String>,
}

impl Rejection {
    pub fn new(reason: String, status: u16, detail: Option<String>) -> Self {
        Self {
            reason,
            status,
            detail,
        }
    }

    /// The short name of the DAP problem type, e.g. `reportRejected`.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The HTTP status code of the response.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The problem document's detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} (HTTP status {})", self.reason, self.status)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

/// Why an upload attempt failed transiently.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP response status {0}")]
    HttpStatus(u16),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Delivers encoded reports. Implementations never retry; they report what happened to a single
/// attempt.
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    async fn submit(&self, upload_url: &Url, encoded_report: &[u8]) -> SubmissionOutcome;
}

/// Uploads reports over HTTP(S) with [`reqwest`].
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    request_timeout: StdDuration,
}

impl HttpTransport {
    /// Create a transport. `request_timeout` bounds each attempt, including reading the response
    /// body.
    pub fn new(http_client: reqwest::Client, request_timeout: StdDuration) -> Self {
        Self {
            http_client,
            request_timeout,
        }
    }

    async fn send(request: RequestBuilder) -> SubmissionOutcome {
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) if error.is_timeout() => {
                return SubmissionOutcome::TransientFailure(FailureReason::Timeout);
            }
            Err(error) => {
                return SubmissionOutcome::TransientFailure(FailureReason::Network(
                    error.to_string(),
                ));
            }
        };

        let status = response.status();
        debug!(%status, "Leader responded to upload");
        if status.is_success() {
            return SubmissionOutcome::Accepted;
        }
        if !status.is_client_error() {
            return SubmissionOutcome::TransientFailure(FailureReason::HttpStatus(
                status.as_u16(),
            ));
        }

        let error_response = match HttpErrorResponse::from_response(response).await {
            Ok(error_response) => error_response,
            Err(error) => {
                return SubmissionOutcome::TransientFailure(FailureReason::MalformedResponse(
                    error.to_string(),
                ));
            }
        };
        match (error_response.dap_problem_type(), error_response.type_uri()) {
            (Some(problem_type), _) => SubmissionOutcome::Rejected(Rejection::new(
                problem_type.name().to_string(),
                status.as_u16(),
                error_response.detail().map(ToOwned::to_owned),
            )),
            (None, Some(type_uri)) if type_uri != "about:blank" => {
                SubmissionOutcome::TransientFailure(FailureReason::MalformedResponse(format!(
                    "unrecognized problem type {type_uri}"
                )))
            }
            (None, _) => {
                SubmissionOutcome::TransientFailure(FailureReason::HttpStatus(status.as_u16()))
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, upload_url: &Url, encoded_report: &[u8]) -> SubmissionOutcome {
        let request = self
            .http_client
            .post(upload_url.clone())
            .header(CONTENT_TYPE, Report::MEDIA_TYPE)
            .body(encoded_report.to_vec())
            .timeout(self.request_timeout);

        tokio::time::timeout(self.request_timeout, Self::send(request))
            .await
            .unwrap_or(SubmissionOutcome::TransientFailure(FailureReason::Timeout))
    }
}
