use divviup_messages::problem_type::DapProblemType;
use http::StatusCode;
use http_api_problem::{HttpApiProblem, PROBLEM_JSON_MEDIA_TYPE};
use reqwest::{Response, header::CONTENT_TYPE};
use std::fmt::{self, Display, Formatter};
use tracing::warn;

/// This captures an HTTP status code and parsed problem details document from an HTTP response.
#[derive(Debug)]
pub struct HttpErrorResponse {
    problem_details: HttpApiProblem,
    dap_problem_type: Option<DapProblemType>,
}

/// The response declared an `application/problem+json` body, but the body could not be read or
/// parsed as a problem details document.
#[derive(Debug, thiserror::Error)]
#[error("malformed problem details document: {0}")]
pub struct MalformedProblemDocument(#[from] reqwest::Error);

impl HttpErrorResponse {
    /// Turn a [`reqwest::Response`] into a [`HttpErrorResponse`]. If the response carries a JSON
    /// problem details document, it is parsed from the response's body, otherwise the result is
    /// solely constructed from the response's status code.
    /// (see [RFC 7807](https://www.rfc-editor.org/rfc/rfc7807.html))
    ///
    /// A response that declares a problem details document whose body does not parse is an error,
    /// so callers can tell it apart from a bare status code.
    pub async fn from_response(response: Response) -> Result<Self, MalformedProblemDocument> {
        let status = response.status();
        if !is_problem_document(&response) {
            return Ok(status.into());
        }

        match response.json::<HttpApiProblem>().await {
            Ok(mut problem) => {
                problem.status = Some(status);
                let dap_problem_type = problem
                    .type_url
                    .as_ref()
                    .and_then(|type_url| type_url.parse::<DapProblemType>().ok());
                Ok(Self {
                    problem_details: problem,
                    dap_problem_type,
                })
            }
            Err(error) => {
                warn!(%error, "Failed to parse problem details");
                Err(MalformedProblemDocument(error))
            }
        }
    }

    /// A URI that identifies the problem type.
    pub fn type_uri(&self) -> Option<&str> {
        self.problem_details.type_url.as_deref()
    }

    /// Specific details about this instance of a problem.
    pub fn detail(&self) -> Option<&str> {
        self.problem_details.detail.as_deref()
    }

    /// The DAP-specific problem type, if applicable.
    pub fn dap_problem_type(&self) -> Option<&DapProblemType> {
        self.dap_problem_type.as_ref()
    }
}

/// Checks whether the response's media type is `application/problem+json`, ignoring any
/// parameters such as `charset`.
fn is_problem_document(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|content_type| content_type.to_str().ok())
        .and_then(|content_type| content_type.parse::<mime::Mime>().ok())
        .is_some_and(|mime| mime.essence_str() == PROBLEM_JSON_MEDIA_TYPE)
}

impl From<StatusCode> for HttpErrorResponse {
    fn from(value: StatusCode) -> Self {
        Self {
            problem_details: HttpApiProblem::new(value),
            dap_problem_type: None,
        }
    }
}

impl Display for HttpErrorResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.problem_details.fmt(f)
    }
}
