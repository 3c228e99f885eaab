//! Implements a lightweight, deterministic dummy VDAF for use in tests.

/// A dummy VDAF that splits a single byte into two additive shares modulo 256.
///
/// Unlike the Prio3 VDAFs, the leader's share is derived from the nonce rather than from fresh
/// randomness, so sharding is a pure function of the measurement and the nonce. The nonce is public,
/// so anyone who sees it can recover the measurement from the helper's share alone. This VDAF is
/// insecure by construction and must never be used outside of tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Vdaf;

impl Vdaf {
    pub fn new() -> Self {
        Self
    }

    /// Shard a measurement, returning the (empty) public share and the two input shares.
    pub fn shard(&self, measurement: u8, nonce: &[u8; 16]) -> (Vec<u8>, [u8; 2]) {
        let first_input_share = nonce.iter().fold(0, |acc: u8, b| acc.rotate_left(1) ^ b);
        let (second_input_share, _) = measurement.overflowing_sub(first_input_share);
        (Vec::new(), [first_input_share, second_input_share])
    }

    /// Recombine input shares into the measurement they were sharded from.
    pub fn unshard(&self, input_shares: &[u8]) -> u8 {
        input_shares
            .iter()
            .fold(0, |acc: u8, share| acc.wrapping_add(*share))
    }
}
