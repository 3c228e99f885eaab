//! A [DAP](https://datatracker.ietf.org/doc/draft-ietf-ppm-dap/) client
//!
//! This library implements the client role of the DAP-PPM protocol. It shards measurements with a
//! VDAF, encrypts one input share to each of the task's aggregators, and uploads the resulting
//! report to the leader, which in turn computes a statistical aggregate over data from many
//! clients, while preserving the privacy of each client's data.
//!
//! # Examples
//!
//! ```no_run
//! use divviup_client::{Client, TaskConfig};
//! use divviup_core::vdaf::Measurement;
//!
//! #[tokio::main]
//! async fn main() {
//!     let task_config = TaskConfig::from_yaml(
//!         &std::fs::read_to_string("task.yaml").unwrap(),
//!     )
//!     .unwrap();
//!
//!     let client = Client::new(task_config).unwrap();
//!     client.submit(Measurement::Histogram(5)).await.unwrap();
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

use divviup_core::{
    initialize_rustls,
    retries::{self, RetryConfig},
    time::{Clock, RealClock},
    vdaf::Measurement,
};
use divviup_messages::Role;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration as StdDuration};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

pub mod encryptor;
pub mod report_builder;
pub mod sharder;
pub mod task_config;
pub mod transport;

#[cfg(test)]
mod tests;

pub use report_builder::{OsRandomSource, RandomSource};
pub use task_config::{AggregatorEndpoint, TaskConfig};
pub use transport::{FailureReason, HttpTransport, Rejection, SubmissionOutcome, Transport};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid parameter {0}")]
    InvalidParameter(&'static str),
    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),
    #[error("unsupported DAP version {0}")]
    UnsupportedVersion(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(#[source] divviup_core::hpke::Error),
    #[error("report ID generation failed: {0}")]
    IdGenerationFailed(String),
    #[error("VDAF error: {0}")]
    Vdaf(#[from] prio::vdaf::VdafError),
    #[error("codec error: {0}")]
    Codec(#[from] prio::codec::CodecError),
    #[error("URL parse: {0}")]
    Url(#[from] url::ParseError),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("{0}")]
    RetryConfig(#[from] retries::Error),
    #[error("report rejected: {0}")]
    Rejected(Rejection),
    #[error("report upload failed after {attempts} attempts: {last_failure}")]
    Exhausted {
        attempts: u32,
        last_failure: FailureReason,
    },
}

impl Error {
    /// Whether submitting the same measurement again later could succeed. Only exhausted
    /// transient failures qualify; validation, cryptographic and rejection errors would recur.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Exhausted { .. })
    }
}

static CLIENT_USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    "/",
    "client"
);

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Construct a [`reqwest::Client`] suitable for use in a DAP [`Client`].
pub fn default_http_client() -> Result<reqwest::Client, Error> {
    initialize_rustls();
    Ok(reqwest::Client::builder()
        // Clients wishing to override these timeouts may provide their own
        // values using ClientBuilder::with_http_client.
        .timeout(StdDuration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
        .connect_timeout(StdDuration::from_secs(10))
        .user_agent(CLIENT_USER_AGENT)
        .build()?)
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Client configuration, as loaded from a YAML file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// The task reports are submitted for.
    pub task: TaskConfig,
    /// How failed uploads are retried.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Upper bound on the duration of a single upload attempt, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ClientConfig {
    /// Parse a client configuration from YAML, and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.task = config.task.validate()?;
        config.retry.validate()?;
        Ok(config)
    }
}

/// Builder for configuring a [`Client`].
#[derive(Educe)]
#[educe(Debug)]
pub struct ClientBuilder<C: Clock = RealClock> {
    task_config: TaskConfig,
    retry_config: RetryConfig,
    transport: Option<Arc<dyn Transport>>,
    #[educe(Debug(ignore))]
    http_client: Option<reqwest::Client>,
    request_timeout: StdDuration,
    clock: C,
    random_source: Arc<dyn RandomSource>,
}

impl ClientBuilder<RealClock> {
    /// Construct a [`ClientBuilder`] for the given task, with default retry parameters, an HTTP
    /// transport, the system clock and the operating system's random number generator.
    pub fn new(task_config: TaskConfig) -> Self {
        Self {
            task_config,
            retry_config: RetryConfig::default(),
            transport: None,
            http_client: None,
            request_timeout: StdDuration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            clock: RealClock::default(),
            random_source: Arc::new(OsRandomSource),
        }
    }
}

impl<C: Clock> ClientBuilder<C> {
    /// Finalize construction of a [`Client`], validating the task and retry configurations.
    pub fn build(self) -> Result<Client<C>, Error> {
        let task_config = self.task_config.validate()?;
        self.retry_config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let http_client = match self.http_client {
                    Some(http_client) => http_client,
                    None => default_http_client()?,
                };
                Arc::new(HttpTransport::new(http_client, self.request_timeout))
            }
        };

        Ok(Client {
            task_config: Arc::new(RwLock::new(Arc::new(task_config))),
            retry_config: self.retry_config,
            transport,
            clock: self.clock,
            random_source: self.random_source,
        })
    }

    /// Override the parameters used when retrying failed uploads.
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Upload reports through the given transport instead of over HTTP.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Override the HTTPS client configuration to be used. Ignored if a transport is provided with
    /// [`Self::with_transport`].
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Override the bound on the duration of each upload attempt.
    pub fn with_request_timeout(mut self, request_timeout: StdDuration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Use the given clock to timestamp reports.
    pub fn with_clock<D: Clock>(self, clock: D) -> ClientBuilder<D> {
        ClientBuilder {
            task_config: self.task_config,
            retry_config: self.retry_config,
            transport: self.transport,
            http_client: self.http_client,
            request_timeout: self.request_timeout,
            clock,
            random_source: self.random_source,
        }
    }

    /// Use the given source of randomness to generate report IDs.
    pub fn with_random_source(mut self, random_source: Arc<dyn RandomSource>) -> Self {
        self.random_source = random_source;
        self
    }
}

/// A DAP client.
#[derive(Clone, Debug)]
pub struct Client<C: Clock = RealClock> {
    task_config: Arc<RwLock<Arc<TaskConfig>>>,
    retry_config: RetryConfig,
    transport: Arc<dyn Transport>,
    clock: C,
    random_source: Arc<dyn RandomSource>,
}

impl Client<RealClock> {
    /// Construct a new client for the given task, with default settings.
    pub fn new(task_config: TaskConfig) -> Result<Self, Error> {
        ClientBuilder::new(task_config).build()
    }

    /// Construct a [`ClientBuilder`] for the given task.
    pub fn builder(task_config: TaskConfig) -> ClientBuilder<RealClock> {
        ClientBuilder::new(task_config)
    }

    /// Construct a new client from a loaded [`ClientConfig`].
    pub fn from_config(config: ClientConfig) -> Result<Self, Error> {
        ClientBuilder::new(config.task)
            .with_retry_config(config.retry)
            .with_request_timeout(StdDuration::from_secs(config.request_timeout_secs))
            .build()
    }
}

impl<C: Clock> Client<C> {
    /// The task configuration new submissions will use.
    pub async fn task_config(&self) -> Arc<TaskConfig> {
        Arc::clone(&*self.task_config.read().await)
    }

    /// Validate `task_config`, then make it the configuration for subsequent submissions.
    /// Submissions already in progress finish with the configuration they started with.
    pub async fn replace_task_config(&self, task_config: TaskConfig) -> Result<(), Error> {
        let task_config = Arc::new(task_config.validate()?);
        info!(task_id = %task_config.task_id(), "Replacing task configuration");
        *self.task_config.write().await = task_config;
        Ok(())
    }

    /// Shard a measurement, encrypt its shares, and construct and encode a
    /// [`divviup_messages::Report`] to be uploaded.
    fn prepare_report(
        &self,
        measurement: &Measurement,
        task_config: &TaskConfig,
    ) -> Result<Vec<u8>, Error> {
        debug!("Building report");
        let report_id = report_builder::generate_report_id(self.random_source.as_ref())?;
        let randomness = report_builder::ReportRandomness::from_report_id(&report_id);
        let shards = sharder::shard(measurement, task_config, &randomness)?;
        let builder =
            report_builder::ReportBuilder::new(task_config, report_id, self.clock.now())?;
        let aad = builder.aad(&shards.public_share);

        debug!(%report_id, "Encrypting input shares");
        let encrypted_input_shares = task_config
            .aggregators()
            .iter()
            .zip(&shards.input_shares)
            .enumerate()
            .map(|(index, (aggregator, input_share))| {
                encryptor::encrypt(
                    input_share,
                    aggregator.hpke_config(),
                    &Role::for_aggregator_index(index),
                    &aad,
                    task_config.dap_version(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(%report_id, "Encoding report");
        let report = builder.build(shards.public_share, encrypted_input_shares)?;
        report_builder::encode(&report)
    }

    /// Upload a measurement to the leader, per the [DAP specification][1]. The measurement is
    /// sharded into one input share per aggregator, and each share is encrypted to its aggregator.
    ///
    /// Transient failures are retried with exponential backoff, building a new report with a fresh
    /// report ID and timestamp for each attempt. Dropping the returned future abandons the
    /// submission.
    ///
    /// [1]: https://www.ietf.org/archive/id/draft-ietf-ppm-dap-09.html#name-uploading-reports
    #[tracing::instrument(skip(self, measurement), err)]
    pub async fn submit(&self, measurement: Measurement) -> Result<(), Error> {
        let measurement = Zeroizing::new(measurement);
        let task_config = self.task_config().await;
        let upload_url = task_config.reports_resource_uri()?;
        let mut backoff = self.retry_config.backoff();

        let mut attempts = 0;
        loop {
            attempts += 1;
            let encoded_report = self.prepare_report(&measurement, &task_config)?;

            debug!(attempt = attempts, "Submitting report");
            match self.transport.submit(&upload_url, &encoded_report).await {
                SubmissionOutcome::Accepted => {
                    debug!(attempt = attempts, "Report accepted");
                    return Ok(());
                }
                SubmissionOutcome::Rejected(rejection) => {
                    info!(attempt = attempts, %rejection, "Leader rejected report");
                    return Err(Error::Rejected(rejection));
                }
                SubmissionOutcome::TransientFailure(reason) => match backoff.next() {
                    Some(delay) => {
                        warn!(
                            attempt = attempts,
                            %reason,
                            ?delay,
                            "Report upload failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(attempt = attempts, %reason, "Report upload failed, giving up");
                        return Err(Error::Exhausted {
                            attempts,
                            last_failure: reason,
                        });
                    }
                },
            }
        }
    }
}
