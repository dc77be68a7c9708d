//! Output-wire ordering calibration for external encoders.
//!
//! The pin that carries v1 is not known up front. Both orderings are tried
//! on a noiseless chain and the one with fewer decoded errors wins.

use crate::bits::{count_bit_errors, random_bits, recover_trailing};
use crate::channel::{BitFlipChannel, Channel};
use crate::device::{ClockedDevice, StreamDriver};
use crate::error::{Result, SimError};
use crate::trellis::CodedPair;
use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which encoder output pin carries v1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireMapping {
    #[default]
    Y0IsV1,
    Y1IsV1,
}

impl WireMapping {
    /// Hypotheses in tie-break order
    pub const CANDIDATES: [WireMapping; 2] = [WireMapping::Y0IsV1, WireMapping::Y1IsV1];

    /// Convert raw pins (y0, y1) into a coded pair
    pub fn interpret(self, (y0, y1): (bool, bool)) -> CodedPair {
        match self {
            WireMapping::Y0IsV1 => CodedPair::new(y0, y1),
            WireMapping::Y1IsV1 => CodedPair::new(y1, y0),
        }
    }
}

impl fmt::Display for WireMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireMapping::Y0IsV1 => write!(f, "y0_is_v1"),
            WireMapping::Y1IsV1 => write!(f, "y1_is_v1"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub mapping: WireMapping,
    /// Payload errors per hypothesis, indexed like [`WireMapping::CANDIDATES`]
    pub errors: [usize; 2],
    /// Decisions captured per hypothesis
    pub captured: [usize; 2],
    pub payload_len: usize,
    /// Exactly one hypothesis decoded cleanly
    pub reliable: bool,
}

impl CalibrationReport {
    pub fn errors_for(&self, mapping: WireMapping) -> usize {
        match mapping {
            WireMapping::Y0IsV1 => self.errors[0],
            WireMapping::Y1IsV1 => self.errors[1],
        }
    }
}

/// Pick the wire ordering by decoding one noiseless random payload under each
/// hypothesis. Ties go to [`WireMapping::Y0IsV1`].
///
/// A hypothesis whose capture comes up short scores `payload_len` errors
/// rather than failing the calibration.
pub fn calibrate_mapping<D: ClockedDevice, R: Rng + ?Sized>(
    driver: &mut StreamDriver<D>,
    payload_len: usize,
    tail_len: usize,
    rng: &mut R,
) -> Result<CalibrationReport> {
    if payload_len == 0 {
        return Err(SimError::InvalidConfig(
            "Calibration payload must be non-empty".to_string(),
        ));
    }

    let payload = random_bits(payload_len, rng);
    let channel = Channel::BitFlip(BitFlipChannel::new(0.0)?);

    let mut errors = [0usize; 2];
    let mut captured = [0usize; 2];
    for (i, mapping) in WireMapping::CANDIDATES.into_iter().enumerate() {
        let decided = driver.run_chain(&payload, tail_len, mapping, &channel, rng)?;
        captured[i] = decided.len();
        errors[i] = match recover_trailing(&decided, payload_len) {
            Ok(recovered) => count_bit_errors(recovered, &payload),
            Err(_) => payload_len,
        };
        info!(
            "Calibration {}: {} errors in {} bits ({} captured)",
            mapping, errors[i], payload_len, captured[i]
        );
    }

    let mapping = if errors[1] < errors[0] {
        WireMapping::Y1IsV1
    } else {
        WireMapping::Y0IsV1
    };
    let reliable = (errors[0] == 0) != (errors[1] == 0);
    if !reliable {
        warn!(
            "Calibration ambiguous (errors {:?}); falling back to {}",
            errors, mapping
        );
    }

    Ok(CalibrationReport {
        mapping,
        errors,
        captured,
        payload_len,
        reliable,
    })
}
