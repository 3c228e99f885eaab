//! Assembling encrypted input shares into a [`Report`], and encoding it for upload.

use crate::{Error, task_config::TaskConfig};
use divviup_core::time::TimeExt;
use divviup_messages::{
    HpkeCiphertext, InputShareAad, Report, ReportId, ReportMetadata, TaskId, Time,
};
use educe::Educe;
use prio::codec::Encode;
use rand::{TryRngCore, rngs::OsRng};
use std::fmt::Debug;
use zeroize::Zeroizing;

/// A source of cryptographically secure random bytes, used to generate report IDs.
pub trait RandomSource: Debug + Send + Sync {
    /// Fill `dest` entirely with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// The operating system's random number generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        OsRng.try_fill_bytes(dest)?;
        Ok(())
    }
}

/// Generate a fresh report ID.
///
/// An all-zero ID is treated as a failure of the random source rather than uploaded.
pub fn generate_report_id(random_source: &dyn RandomSource) -> Result<ReportId, Error> {
    let mut bytes = [0; ReportId::LEN];
    random_source
        .fill_bytes(&mut bytes)
        .map_err(|error| Error::IdGenerationFailed(error.to_string()))?;
    if bytes.iter().all(|byte| *byte == 0) {
        return Err(Error::IdGenerationFailed(
            "random source produced an all-zero report ID".to_string(),
        ));
    }
    Ok(ReportId::from(bytes))
}

/// The VDAF nonce for one report. DAP uses the report ID as the nonce, so this is derived from a
/// freshly generated [`ReportId`] on each attempt.
#[derive(Clone, Educe)]
#[educe(Debug)]
pub struct ReportRandomness(#[educe(Debug(ignore))] Zeroizing<[u8; ReportId::LEN]>);

impl ReportRandomness {
    pub fn from_report_id(report_id: &ReportId) -> Self {
        Self::from(*report_id.as_ref())
    }

    pub fn nonce(&self) -> &[u8; ReportId::LEN] {
        &self.0
    }
}

impl From<[u8; ReportId::LEN]> for ReportRandomness {
    fn from(bytes: [u8; ReportId::LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }
}

/// Builds a single [`Report`]. The report's timestamp is fixed, rounded down to the task's time
/// precision, when the builder is constructed, so that the encryption AAD and the report agree.
#[derive(Debug)]
pub struct ReportBuilder {
    task_id: TaskId,
    num_aggregators: usize,
    metadata: ReportMetadata,
}

impl ReportBuilder {
    pub fn new(
        task_config: &TaskConfig,
        report_id: ReportId,
        timestamp: Time,
    ) -> Result<Self, Error> {
        let time = timestamp
            .to_batch_interval_start(task_config.time_precision())
            .map_err(|_| Error::InvalidParameter("couldn't round time down to time_precision"))?;
        Ok(Self {
            task_id: *task_config.task_id(),
            num_aggregators: task_config.aggregators().len(),
            metadata: ReportMetadata::new(report_id, time),
        })
    }

    pub fn metadata(&self) -> &ReportMetadata {
        &self.metadata
    }

    /// The additional authenticated data every input share of this report is encrypted with.
    pub fn aad(&self, public_share: &[u8]) -> InputShareAad {
        InputShareAad::new(self.task_id, self.metadata.clone(), public_share.to_vec())
    }

    pub fn build(
        self,
        public_share: Vec<u8>,
        encrypted_input_shares: Vec<HpkeCiphertext>,
    ) -> Result<Report, Error> {
        if encrypted_input_shares.len() != self.num_aggregators {
            return Err(Error::InvalidParameter(
                "number of encrypted input shares does not match the number of aggregators",
            ));
        }
        Ok(Report::new(
            self.task_id,
            self.metadata,
            public_share,
            encrypted_input_shares,
        ))
    }
}

/// Encode a report into an upload request body.
pub fn encode(report: &Report) -> Result<Vec<u8>, Error> {
    Ok(report.get_encoded()?)
}
