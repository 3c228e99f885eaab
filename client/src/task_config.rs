//! The client's view of a DAP task: who the aggregators are, how to encrypt to them, and which VDAF
//! the task uses.

use crate::Error;
use divviup_core::{
    DapVersion, hpke::is_hpke_config_supported, url_ensure_trailing_slash, vdaf::VdafInstance,
};
use divviup_messages::{Duration, HpkeConfig, HpkeConfigList, TaskId};
use educe::Educe;
use serde::{Deserialize, Serialize};
use url::Url;

/// One aggregator participating in a task, and the HPKE configuration its input shares are sealed
/// to.
#[derive(Clone, Educe, PartialEq, Eq, Serialize, Deserialize)]
#[educe(Debug)]
pub struct AggregatorEndpoint {
    /// URL relative to which the aggregator's API endpoints are found.
    #[educe(Debug(method(std::fmt::Display::fmt)))]
    endpoint: Url,
    hpke_config: HpkeConfig,
}

impl AggregatorEndpoint {
    pub fn new(endpoint: Url, hpke_config: HpkeConfig) -> Self {
        Self {
            endpoint: url_ensure_trailing_slash(endpoint),
            hpke_config,
        }
    }

    /// Construct an endpoint from the HPKE configurations an aggregator advertises, taking the
    /// first one whose algorithms are supported. Returns the first error otherwise.
    pub fn from_hpke_config_list(
        endpoint: Url,
        hpke_config_list: &HpkeConfigList,
    ) -> Result<Self, Error> {
        let mut first_error = None;
        for config in hpke_config_list.hpke_configs() {
            match is_hpke_config_supported(config) {
                Ok(()) => return Ok(Self::new(endpoint, config.clone())),
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }
        Err(match first_error {
            Some(error) => Error::EncryptionFailed(error),
            None => Error::InvalidParameter("aggregator provided empty HpkeConfigList"),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn hpke_config(&self) -> &HpkeConfig {
        &self.hpke_config
    }
}

/// Task parameters shared by every report a client submits for a task. A task configuration is
/// immutable; [`crate::Client::replace_task_config`] swaps in a whole new one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Unique identifier for the task.
    task_id: TaskId,
    /// The aggregators, in protocol order. The first is the leader, to which reports are uploaded.
    aggregators: Vec<AggregatorEndpoint>,
    /// The VDAF measurements are sharded with.
    vdaf: VdafInstance,
    /// The time precision of the task. This value is shared by all parties in the protocol, and is
    /// used to compute report timestamps.
    time_precision: Duration,
    #[serde(default)]
    dap_version: DapVersion,
}

impl TaskConfig {
    /// Construct and validate a task configuration.
    pub fn new(
        task_id: TaskId,
        aggregators: Vec<AggregatorEndpoint>,
        vdaf: VdafInstance,
        time_precision: Duration,
        dap_version: DapVersion,
    ) -> Result<Self, Error> {
        Self {
            task_id,
            aggregators,
            vdaf,
            time_precision,
            dap_version,
        }
        .validate()
    }

    /// Parse a task configuration from YAML and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        serde_yaml::from_str::<Self>(yaml)?.validate()
    }

    /// Check the task configuration for consistency, normalizing aggregator endpoints so that they
    /// end in a slash.
    pub fn validate(mut self) -> Result<Self, Error> {
        if !self.dap_version.is_supported() {
            return Err(Error::UnsupportedVersion(
                self.dap_version.identifier().to_owned(),
            ));
        }
        if self.aggregators.len() < 2 {
            return Err(Error::InvalidParameter(
                "task must have at least two aggregators",
            ));
        }
        if self.aggregators.len() != self.vdaf.num_aggregators() {
            return Err(Error::InvalidParameter(
                "number of aggregators does not match the VDAF",
            ));
        }
        if self.time_precision == Duration::ZERO {
            return Err(Error::InvalidParameter("time precision must be positive"));
        }
        for aggregator in &mut self.aggregators {
            if !matches!(aggregator.endpoint.scheme(), "http" | "https") {
                return Err(Error::InvalidParameter(
                    "aggregator endpoint must be an http or https URL",
                ));
            }
            aggregator.endpoint = url_ensure_trailing_slash(aggregator.endpoint.clone());
        }
        Ok(self)
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn aggregators(&self) -> &[AggregatorEndpoint] {
        &self.aggregators
    }

    pub fn vdaf(&self) -> &VdafInstance {
        &self.vdaf
    }

    pub fn time_precision(&self) -> &Duration {
        &self.time_precision
    }

    pub fn dap_version(&self) -> &DapVersion {
        &self.dap_version
    }

    /// URI to which reports for this task are uploaded, relative to the leader's endpoint.
    pub fn reports_resource_uri(&self) -> Result<Url, Error> {
        let leader = self
            .aggregators
            .first()
            .ok_or(Error::InvalidParameter("task has no leader"))?;
        Ok(leader
            .endpoint
            .join(&format!("tasks/{}/reports", self.task_id))?)
    }
}
