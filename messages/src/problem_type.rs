use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// Prefix shared by the type URIs of all DAP problem documents.
const TYPE_URI_PREFIX: &str = "urn:ietf:params:ppm:dap:error:";

/// Representation of the problem types an aggregator may report in an RFC 7807 problem document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DapProblemType {
    InvalidMessage,
    UnrecognizedTask,
    StepMismatch,
    MissingTaskId,
    UnrecognizedAggregationJob,
    OutdatedConfig,
    ReportRejected,
    ReportTooEarly,
    BatchInvalid,
    InvalidBatchSize,
    BatchQueriedTooManyTimes,
    BatchMismatch,
    UnauthorizedRequest,
    BatchOverlap,
    InvalidTask,
}

impl DapProblemType {
    const ALL: [DapProblemType; 15] = [
        DapProblemType::InvalidMessage,
        DapProblemType::UnrecognizedTask,
        DapProblemType::StepMismatch,
        DapProblemType::MissingTaskId,
        DapProblemType::UnrecognizedAggregationJob,
        DapProblemType::OutdatedConfig,
        DapProblemType::ReportRejected,
        DapProblemType::ReportTooEarly,
        DapProblemType::BatchInvalid,
        DapProblemType::InvalidBatchSize,
        DapProblemType::BatchQueriedTooManyTimes,
        DapProblemType::BatchMismatch,
        DapProblemType::UnauthorizedRequest,
        DapProblemType::BatchOverlap,
        DapProblemType::InvalidTask,
    ];

    /// The short, machine-readable name of this problem type, as it appears at the end of its type
    /// URI (e.g. `reportRejected`).
    pub fn name(&self) -> &'static str {
        match self {
            DapProblemType::InvalidMessage => "invalidMessage",
            DapProblemType::UnrecognizedTask => "unrecognizedTask",
            DapProblemType::StepMismatch => "stepMismatch",
            DapProblemType::MissingTaskId => "missingTaskID",
            DapProblemType::UnrecognizedAggregationJob => "unrecognizedAggregationJob",
            DapProblemType::OutdatedConfig => "outdatedConfig",
            DapProblemType::ReportRejected => "reportRejected",
            DapProblemType::ReportTooEarly => "reportTooEarly",
            DapProblemType::BatchInvalid => "batchInvalid",
            DapProblemType::InvalidBatchSize => "invalidBatchSize",
            DapProblemType::BatchQueriedTooManyTimes => "batchQueriedTooManyTimes",
            DapProblemType::BatchMismatch => "batchMismatch",
            DapProblemType::UnauthorizedRequest => "unauthorizedRequest",
            DapProblemType::BatchOverlap => "batchOverlap",
            DapProblemType::InvalidTask => "invalidTask",
        }
    }

    /// Returns the problem type URI for a particular kind of error.
    pub fn type_uri(&self) -> String {
        format!("{TYPE_URI_PREFIX}{}", self.name())
    }

    /// Returns a human-readable summary of a problem type.
    pub fn description(&self) -> &'static str {
        match self {
            DapProblemType::InvalidMessage => {
                "The message type for a response was incorrect or the payload was malformed."
            }
            DapProblemType::UnrecognizedTask => {
                "An endpoint received a message with an unknown task ID."
            }
            DapProblemType::StepMismatch => {
                "The leader and helper are not on the same step of VDAF preparation."
            }
            DapProblemType::MissingTaskId => {
                "HPKE configuration was requested without specifying a task ID."
            }
            DapProblemType::UnrecognizedAggregationJob => {
                "An endpoint received a message with an unknown aggregation job ID."
            }
            DapProblemType::OutdatedConfig => {
                "The message was generated using an outdated configuration."
            }
            DapProblemType::ReportRejected => "Report could not be processed.",
            DapProblemType::ReportTooEarly => {
                "Report could not be processed because it arrived too early."
            }
            DapProblemType::BatchInvalid => "The batch implied by the query is invalid.",
            DapProblemType::InvalidBatchSize => {
                "The number of reports included in the batch is invalid."
            }
            DapProblemType::BatchQueriedTooManyTimes => {
                "The batch described by the query has been queried too many times."
            }
            DapProblemType::BatchMismatch => {
                "Leader and helper disagree on reports aggregated in a batch."
            }
            DapProblemType::UnauthorizedRequest => "The request's authorization is not valid.",
            DapProblemType::BatchOverlap => {
                "The queried batch overlaps with a previously queried batch."
            }
            DapProblemType::InvalidTask => "Aggregator has opted out of the indicated task.",
        }
    }
}

impl Display for DapProblemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error indicating a problem type URI was not recognized as a DAP problem type.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized DAP problem type {0:?}")]
pub struct DapProblemTypeParseError(String);

impl FromStr for DapProblemType {
    type Err = DapProblemTypeParseError;

    fn from_str(value: &str) -> Result<DapProblemType, DapProblemTypeParseError> {
        value
            .strip_prefix(TYPE_URI_PREFIX)
            .and_then(|name| {
                Self::ALL
                    .into_iter()
                    .find(|problem_type| problem_type.name() == name)
            })
            .ok_or_else(|| DapProblemTypeParseError(value.to_owned()))
    }
}
