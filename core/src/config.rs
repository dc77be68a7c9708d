//! Typed simulation configuration.
//!
//! Every struct validates eagerly and rejects malformed values instead of
//! clamping them. All of them derive serde so a run can be described by, and
//! echoed back as, JSON.

use crate::error::{Result, SimError};
use crate::trellis::TrellisModel;
use crate::{
    CLOCK_PERIOD_NS, DEFAULT_CONSTRAINT_LENGTH, DEFAULT_FLIP_PROBABILITIES, DEFAULT_G1,
    DEFAULT_G2, DEFAULT_PAYLOAD_LEN, DEFAULT_SAMPLES_PER_SYMBOL, DEFAULT_SEED, DEFAULT_TAIL_LEN,
    DEFAULT_TRIALS, ENCODER_TIMEOUT_CYCLES, MAX_CONSTRAINT_LENGTH, RESET_HOLD_CYCLES,
};
use serde::{Deserialize, Serialize};

/// Constraint length and generator pair of the code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeConfig {
    pub constraint_length: u32,
    pub g1: u32,
    pub g2: u32,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            constraint_length: DEFAULT_CONSTRAINT_LENGTH,
            g1: DEFAULT_G1,
            g2: DEFAULT_G2,
        }
    }
}

impl CodeConfig {
    pub fn validate(&self) -> Result<()> {
        let k = self.constraint_length;
        if k < 2 {
            return Err(SimError::InvalidConfig(format!(
                "Constraint length must be >= 2, got {}",
                k
            )));
        }
        if k > MAX_CONSTRAINT_LENGTH {
            return Err(SimError::InvalidConfig(format!(
                "Constraint length must be <= {}, got {}",
                MAX_CONSTRAINT_LENGTH, k
            )));
        }
        for (name, g) in [("g1", self.g1), ("g2", self.g2)] {
            if g == 0 {
                return Err(SimError::InvalidConfig(format!(
                    "Generator {} must be non-zero",
                    name
                )));
            }
            if g >> k != 0 {
                return Err(SimError::InvalidConfig(format!(
                    "Generator {} = {:#o} has taps beyond K = {}",
                    name, g, k
                )));
            }
        }
        Ok(())
    }

    pub fn build_trellis(&self) -> Result<TrellisModel> {
        TrellisModel::from_config(self)
    }
}

/// Channel variant and its ordered sweep values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum SweepPoints {
    /// Gaussian-noise channel, Eb/N0 in dB
    EbN0Db(Vec<f64>),
    /// Direct coded-bit flip channel, per-bit flip probability
    FlipProbability(Vec<f64>),
}

impl Default for SweepPoints {
    fn default() -> Self {
        Self::default_ebn0()
    }
}

impl SweepPoints {
    /// 0 to 7 dB in 1 dB steps
    pub fn default_ebn0() -> Self {
        SweepPoints::EbN0Db((0..=7).map(f64::from).collect())
    }

    pub fn default_flip() -> Self {
        SweepPoints::FlipProbability(DEFAULT_FLIP_PROBABILITIES.to_vec())
    }

    pub fn is_ebn0(&self) -> bool {
        matches!(self, SweepPoints::EbN0Db(_))
    }

    pub fn values(&self) -> &[f64] {
        match self {
            SweepPoints::EbN0Db(v) | SweepPoints::FlipProbability(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(SimError::InvalidConfig("Sweep list is empty".to_string()));
        }
        match self {
            SweepPoints::EbN0Db(values) => {
                if let Some(v) = values.iter().find(|v| !v.is_finite()) {
                    return Err(SimError::InvalidConfig(format!(
                        "Eb/N0 must be finite, got {}",
                        v
                    )));
                }
            }
            SweepPoints::FlipProbability(values) => {
                for &p in values {
                    validate_probability(p)?;
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_probability(p: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(SimError::InvalidConfig(format!(
            "Flip probability must be in [0, 1], got {}",
            p
        )));
    }
    Ok(())
}

/// How trials draw randomness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStrategy {
    /// One generator seeded once, consumed in fixed call order across the whole sweep
    #[default]
    Shared,
    /// An independent generator per (point, trial), derived from the base seed.
    /// Required for the parallel sweep.
    PerTrial,
}

/// Full description of one BER sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub code: CodeConfig,
    pub points: SweepPoints,
    pub trials: usize,
    pub payload_len: usize,
    /// Zero input bits appended after the payload; also the device traceback depth
    pub tail_len: usize,
    pub samples_per_symbol: usize,
    pub seed: u64,
    pub seed_strategy: SeedStrategy,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            code: CodeConfig::default(),
            points: SweepPoints::default(),
            trials: DEFAULT_TRIALS,
            payload_len: DEFAULT_PAYLOAD_LEN,
            tail_len: DEFAULT_TAIL_LEN,
            samples_per_symbol: DEFAULT_SAMPLES_PER_SYMBOL,
            seed: DEFAULT_SEED,
            seed_strategy: SeedStrategy::Shared,
        }
    }
}

impl SweepConfig {
    pub fn awgn(ebn0_db: Vec<f64>) -> Self {
        Self {
            points: SweepPoints::EbN0Db(ebn0_db),
            ..Self::default()
        }
    }

    pub fn bit_flip(probabilities: Vec<f64>) -> Self {
        Self {
            points: SweepPoints::FlipProbability(probabilities),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.code.validate()?;
        self.points.validate()?;
        if self.trials == 0 {
            return Err(SimError::InvalidConfig("Trial count must be > 0".to_string()));
        }
        if self.payload_len == 0 {
            return Err(SimError::InvalidConfig("Payload length must be > 0".to_string()));
        }
        let memory = (self.code.constraint_length - 1) as usize;
        if self.tail_len < memory {
            return Err(SimError::InvalidConfig(format!(
                "Tail length {} is shorter than the code memory K-1 = {}",
                self.tail_len, memory
            )));
        }
        if self.samples_per_symbol == 0 {
            return Err(SimError::InvalidConfig(
                "Samples per symbol must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Timing of the clocked external-device handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Edges reset is held before release
    pub reset_cycles: usize,
    /// Fixed wait after presenting an encoder input, before polling starts
    pub encoder_latency_cycles: usize,
    /// Edges polled for encoder output-valid before giving up
    pub timeout_cycles: usize,
    /// Reported only; the driver counts edges, not time
    pub clock_period_ns: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            reset_cycles: RESET_HOLD_CYCLES,
            encoder_latency_cycles: 0,
            timeout_cycles: ENCODER_TIMEOUT_CYCLES,
            clock_period_ns: CLOCK_PERIOD_NS,
        }
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reset_cycles == 0 {
            return Err(SimError::InvalidConfig("Reset must be held for at least one cycle".to_string()));
        }
        if self.timeout_cycles == 0 {
            return Err(SimError::InvalidConfig("Timeout must be at least one cycle".to_string()));
        }
        Ok(())
    }
}
