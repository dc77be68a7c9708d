//! Bit-vector helpers shared by the channel, the calibrator and the sweep.

use crate::error::{Result, SimError};
use rand::Rng;

/// Draw `len` fair random bits from `rng`
pub fn random_bits<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<bool> {
    (0..len).map(|_| rng.gen::<bool>()).collect()
}

/// Count positions where the two sequences differ (compared up to the shorter length)
pub fn count_bit_errors(recovered: &[bool], reference: &[bool]) -> usize {
    recovered
        .iter()
        .zip(reference)
        .filter(|(a, b)| a != b)
        .count()
}

/// Payload decisions of a time-aligned decode: the first `len` bits.
/// Decisions after them belong to the tail.
pub fn recover_leading(decided: &[bool], len: usize) -> Result<&[bool]> {
    decided
        .get(..len)
        .ok_or(SimError::InsufficientDecodedBits {
            got: decided.len(),
            needed: len,
        })
}

/// Payload decisions of a latency-delayed stream: the last `len` bits.
pub fn recover_trailing(decided: &[bool], len: usize) -> Result<&[bool]> {
    if decided.len() < len {
        return Err(SimError::InsufficientDecodedBits {
            got: decided.len(),
            needed: len,
        });
    }
    Ok(&decided[decided.len() - len..])
}

/// BER as errors/total, 0 when nothing was counted
pub fn bit_error_rate(errors: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        errors as f64 / total as f64
    }
}
