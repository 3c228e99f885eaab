//! Descriptors for the VDAFs a client can shard measurements for, and the measurements themselves.

use crate::DapVersion;
use divviup_messages::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Formatter};
use zeroize::Zeroize;

/// Identifiers for supported VDAFs, corresponding to definitions in
/// [draft-irtf-cfrg-vdaf][1] and implementations in [`prio::vdaf::prio3`].
///
/// [1]: https://datatracker.ietf.org/doc/draft-irtf-cfrg-vdaf/
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VdafInstance {
    /// A `Prio3` counter.
    Prio3Count,
    /// A `Prio3` sum of integers in `0..=max_measurement`.
    Prio3Sum { max_measurement: u64 },
    /// A vector of `Prio3` sums, each element `bits` wide.
    Prio3SumVec {
        bits: usize,
        length: usize,
        chunk_length: usize,
    },
    /// A `Prio3` histogram with `length` buckets in it.
    Prio3Histogram { length: usize, chunk_length: usize },

    /// A fake, deterministic VDAF that splits a single byte into additive shares.
    #[cfg(feature = "test-util")]
    #[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
    Fake,
}

impl VdafInstance {
    /// The number of aggregators this VDAF shards measurements for. DAP only supports VDAFs using
    /// two aggregators.
    pub fn num_aggregators(&self) -> usize {
        match self {
            VdafInstance::Prio3Count
            | VdafInstance::Prio3Sum { .. }
            | VdafInstance::Prio3SumVec { .. }
            | VdafInstance::Prio3Histogram { .. } => 2,

            #[cfg(feature = "test-util")]
            VdafInstance::Fake => 2,
        }
    }
}

/// A single client measurement, shaped for one of the [`VdafInstance`] variants.
///
/// Measurements are secret. Their `Debug` representation only names the variant, and they may be
/// held in [`zeroize::Zeroizing`] so that they are overwritten when dropped.
#[derive(Clone, PartialEq, Eq)]
pub enum Measurement {
    /// A measurement for [`VdafInstance::Prio3Count`].
    Count(bool),
    /// A measurement for [`VdafInstance::Prio3Sum`] (and the fake VDAF used in tests).
    Sum(u64),
    /// A measurement for [`VdafInstance::Prio3SumVec`].
    SumVec(Vec<u128>),
    /// A bucket index for [`VdafInstance::Prio3Histogram`].
    Histogram(usize),
}

impl Measurement {
    /// The name of this measurement's shape.
    pub fn kind(&self) -> &'static str {
        match self {
            Measurement::Count(_) => "Count",
            Measurement::Sum(_) => "Sum",
            Measurement::SumVec(_) => "SumVec",
            Measurement::Histogram(_) => "Histogram",
        }
    }
}

impl Debug for Measurement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Measurement::{}(..)", self.kind())
    }
}

impl Zeroize for Measurement {
    fn zeroize(&mut self) {
        match self {
            Measurement::Count(value) => value.zeroize(),
            Measurement::Sum(value) => value.zeroize(),
            Measurement::SumVec(values) => values.zeroize(),
            Measurement::Histogram(index) => index.zeroize(),
        }
    }
}

/// Returns the VDAF application context string for the given protocol version and task: the
/// version identifier followed by the task ID.
pub fn vdaf_application_context(version: &DapVersion, task_id: &TaskId) -> Vec<u8> {
    [version.identifier().as_bytes(), task_id.as_ref().as_slice()].concat()
}
