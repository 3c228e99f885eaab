//! Splitting a measurement into input shares, one per aggregator.

use crate::{Error, report_builder::ReportRandomness, task_config::TaskConfig};
use divviup_core::vdaf::{Measurement, VdafInstance, vdaf_application_context};
use educe::Educe;
use prio::{
    codec::Encode,
    vdaf::{self, prio3::Prio3},
};
use zeroize::Zeroizing;

/// The output of sharding a single measurement: the encoded public share, and one encoded input
/// share per aggregator, in the task's aggregator order.
#[derive(Educe)]
#[educe(Debug)]
pub struct VdafShards {
    pub public_share: Vec<u8>,
    #[educe(Debug(ignore))]
    pub input_shares: Vec<Zeroizing<Vec<u8>>>,
}

/// Check that a measurement has the shape the VDAF expects and lies in its domain.
///
/// Error messages describe the violated constraint, never the measurement itself.
pub fn validate_measurement(vdaf: &VdafInstance, measurement: &Measurement) -> Result<(), Error> {
    match (vdaf, measurement) {
        (VdafInstance::Prio3Count, Measurement::Count(_)) => Ok(()),

        (VdafInstance::Prio3Sum { max_measurement }, Measurement::Sum(value)) => {
            if value > max_measurement {
                return Err(Error::InvalidMeasurement(format!(
                    "sum measurement exceeds max_measurement {max_measurement}"
                )));
            }
            Ok(())
        }

        (VdafInstance::Prio3SumVec { bits, length, .. }, Measurement::SumVec(values)) => {
            if values.len() != *length {
                return Err(Error::InvalidMeasurement(format!(
                    "sum vector measurement has {} elements, expected {length}",
                    values.len()
                )));
            }
            if *bits < 128 && values.iter().any(|value| value >> bits != 0) {
                return Err(Error::InvalidMeasurement(format!(
                    "sum vector measurement element does not fit in {bits} bits"
                )));
            }
            Ok(())
        }

        (VdafInstance::Prio3Histogram { length, .. }, Measurement::Histogram(index)) => {
            if index >= length {
                return Err(Error::InvalidMeasurement(format!(
                    "histogram measurement index out of range for {length} buckets"
                )));
            }
            Ok(())
        }

        #[cfg(feature = "test-util")]
        (VdafInstance::Fake, Measurement::Sum(value)) => {
            if *value > u64::from(u8::MAX) {
                return Err(Error::InvalidMeasurement(
                    "fake VDAF measurement must fit in a byte".to_string(),
                ));
            }
            Ok(())
        }

        (vdaf, measurement) => Err(Error::InvalidMeasurement(format!(
            "{} measurement does not match VDAF {vdaf:?}",
            measurement.kind()
        ))),
    }
}

/// Shard `measurement` for the task's VDAF, using `randomness` as the VDAF nonce.
///
/// The measurement is validated first; an out-of-domain measurement produces no shares.
pub fn shard(
    measurement: &Measurement,
    task_config: &TaskConfig,
    randomness: &ReportRandomness,
) -> Result<VdafShards, Error> {
    validate_measurement(task_config.vdaf(), measurement)?;

    let ctx = vdaf_application_context(task_config.dap_version(), task_config.task_id());
    let nonce = randomness.nonce();

    let shards = match (task_config.vdaf(), measurement) {
        (VdafInstance::Prio3Count, Measurement::Count(value)) => {
            shard_with(&Prio3::new_count(2)?, &ctx, value, nonce)?
        }
        (VdafInstance::Prio3Sum { max_measurement }, Measurement::Sum(value)) => {
            shard_with(&Prio3::new_sum(2, *max_measurement)?, &ctx, value, nonce)?
        }
        (
            VdafInstance::Prio3SumVec {
                bits,
                length,
                chunk_length,
            },
            Measurement::SumVec(values),
        ) => shard_with(
            &Prio3::new_sum_vec(2, *bits, *length, *chunk_length)?,
            &ctx,
            values,
            nonce,
        )?,
        (
            VdafInstance::Prio3Histogram {
                length,
                chunk_length,
            },
            Measurement::Histogram(index),
        ) => shard_with(
            &Prio3::new_histogram(2, *length, *chunk_length)?,
            &ctx,
            index,
            nonce,
        )?,

        #[cfg(feature = "test-util")]
        (VdafInstance::Fake, Measurement::Sum(value)) => {
            let value = Zeroizing::new(
                u8::try_from(*value)
                    .map_err(|_| Error::InvalidMeasurement("value out of range".to_string()))?,
            );
            let (public_share, input_shares) =
                divviup_core::test_util::dummy_vdaf::Vdaf::new().shard(*value, nonce);
            VdafShards {
                public_share,
                input_shares: input_shares
                    .into_iter()
                    .map(|share| Zeroizing::new(Vec::from([share])))
                    .collect(),
            }
        }

        _ => {
            return Err(Error::InvalidMeasurement(format!(
                "{} measurement does not match VDAF",
                measurement.kind()
            )));
        }
    };

    if shards.input_shares.len() != task_config.aggregators().len() {
        return Err(Error::InvalidParameter(
            "VDAF produced a different number of input shares than there are aggregators",
        ));
    }
    Ok(shards)
}

fn shard_with<V: vdaf::Client<16>>(
    vdaf: &V,
    ctx: &[u8],
    measurement: &V::Measurement,
    nonce: &[u8; 16],
) -> Result<VdafShards, Error> {
    let (public_share, input_shares) = vdaf.shard(ctx, measurement, nonce)?;
    Ok(VdafShards {
        public_share: public_share.get_encoded()?,
        input_shares: input_shares
            .iter()
            .map(|input_share| input_share.get_encoded().map(Zeroizing::new))
            .collect::<Result<_, _>>()?,
    })
}
