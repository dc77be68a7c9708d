//! BER sweep harness.
//!
//! Each sweep point runs `trials` independent trials: random payload, encode
//! with tail, channel, decode, compare. Counters are summed into one
//! [`SweepRow`] per point.

use crate::bits::{bit_error_rate, count_bit_errors, random_bits, recover_leading};
use crate::calibration::{calibrate_mapping, CalibrationReport, WireMapping};
use crate::channel::{Channel, ChannelKind};
use crate::config::{CodeConfig, SeedStrategy, SweepConfig};
use crate::convolutional::{append_zeros, ConvolutionalEncoder};
use crate::device::{ClockedDevice, StreamDriver};
use crate::error::{Result, SimError};
use crate::trellis::TrellisModel;
use crate::viterbi::ViterbiDecoder;
use crate::{SimRng, CALIBRATION_PAYLOAD_LEN};
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Uncoded reference counters for an AWGN point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncodedStats {
    pub errors: u64,
    pub total_bits: u64,
    pub ber: f64,
}

/// Aggregate of all trials at one sweep point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub channel: ChannelKind,
    /// Eb/N0 in dB or flip probability
    pub parameter: f64,
    pub errors: u64,
    pub total_bits: u64,
    pub trials: usize,
    pub payload_len: usize,
    pub tail_len: usize,
    pub code: CodeConfig,
    pub seed: u64,
    pub ber: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncoded: Option<UncodedStats>,
    /// Wire ordering used on an external chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<WireMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_period_ns: Option<u32>,
}

/// Generator seed for one (point, trial) under [`SeedStrategy::PerTrial`]
pub fn trial_seed(seed: u64, point: usize, trial: usize) -> u64 {
    seed ^ ((point as u64) << 32) ^ trial as u64
}

#[derive(Debug, Clone, Copy, Default)]
struct TrialOutcome {
    errors: usize,
    uncoded_errors: Option<usize>,
}

#[derive(Debug, Default)]
struct Tally {
    errors: u64,
    total_bits: u64,
    uncoded: Option<(u64, u64)>,
}

impl Tally {
    fn add(&mut self, outcome: TrialOutcome, payload_len: usize) {
        self.errors += outcome.errors as u64;
        self.total_bits += payload_len as u64;
        if let Some(errors) = outcome.uncoded_errors {
            let (e, t) = self.uncoded.get_or_insert((0, 0));
            *e += errors as u64;
            *t += payload_len as u64;
        }
    }

    fn into_row(self, channel: &Channel, config: &SweepConfig) -> SweepRow {
        let row = SweepRow {
            channel: channel.kind(),
            parameter: channel.parameter(),
            errors: self.errors,
            total_bits: self.total_bits,
            trials: config.trials,
            payload_len: config.payload_len,
            tail_len: config.tail_len,
            code: config.code,
            seed: config.seed,
            ber: bit_error_rate(self.errors, self.total_bits),
            uncoded: self.uncoded.map(|(errors, total_bits)| UncodedStats {
                errors,
                total_bits,
                ber: bit_error_rate(errors, total_bits),
            }),
            mapping: None,
            clock_period_ns: None,
        };
        match row.uncoded {
            Some(uncoded) => info!(
                "{:?} {:.3}: BER {:.3e} ({}/{}), uncoded {:.3e}",
                row.channel, row.parameter, row.ber, row.errors, row.total_bits, uncoded.ber
            ),
            None => info!(
                "{:?} {:.3}: BER {:.3e} ({}/{})",
                row.channel, row.parameter, row.ber, row.errors, row.total_bits
            ),
        }
        row
    }
}

/// Reference encoder/decoder pair reused across the trials of one worker
struct SoftwareLink {
    encoder: ConvolutionalEncoder,
    decoder: ViterbiDecoder,
}

impl SoftwareLink {
    fn new(trellis: Arc<TrellisModel>) -> Self {
        Self {
            encoder: ConvolutionalEncoder::new(trellis.clone()),
            decoder: ViterbiDecoder::new(trellis),
        }
    }

    /// Draw order: payload, coded-channel noise, then the uncoded reference
    fn run_trial<R: Rng + ?Sized>(
        &mut self,
        channel: &Channel,
        config: &SweepConfig,
        rng: &mut R,
    ) -> Result<TrialOutcome> {
        let payload = random_bits(config.payload_len, rng);
        self.encoder.reset();
        let coded = self
            .encoder
            .encode_sequence(&append_zeros(&payload, config.tail_len));
        let received = channel.apply(&coded, rng)?;
        let decided = self.decoder.decode(&received);
        let errors = count_bit_errors(recover_leading(&decided, config.payload_len)?, &payload);
        let uncoded_errors = channel.uncoded_errors(config.payload_len, rng)?;
        debug!("Trial: {} errors, uncoded {:?}", errors, uncoded_errors);
        Ok(TrialOutcome {
            errors,
            uncoded_errors,
        })
    }
}

fn shared_trellis(code: &CodeConfig) -> Result<Arc<TrellisModel>> {
    Ok(Arc::new(code.build_trellis()?))
}

/// Run the sweep on the reference encoder and decoder, single-threaded.
///
/// With [`SeedStrategy::Shared`] one generator seeded from `config.seed`
/// serves every draw in order; with [`SeedStrategy::PerTrial`] each trial
/// gets its own generator from [`trial_seed`].
pub fn run_software_sweep(config: &SweepConfig) -> Result<Vec<SweepRow>> {
    config.validate()?;
    let mut link = SoftwareLink::new(shared_trellis(&config.code)?);
    let mut shared = SimRng::seed_from_u64(config.seed);

    let mut rows = Vec::with_capacity(config.points.len());
    for (point, &value) in config.points.values().iter().enumerate() {
        let channel = Channel::for_point(&config.points, value, config.samples_per_symbol)?;
        let mut tally = Tally::default();
        for trial in 0..config.trials {
            let outcome = match config.seed_strategy {
                SeedStrategy::Shared => link.run_trial(&channel, config, &mut shared)?,
                SeedStrategy::PerTrial => {
                    let mut rng = SimRng::seed_from_u64(trial_seed(config.seed, point, trial));
                    link.run_trial(&channel, config, &mut rng)?
                }
            };
            tally.add(outcome, config.payload_len);
        }
        rows.push(tally.into_row(&channel, config));
    }
    Ok(rows)
}

/// Parallel form of [`run_software_sweep`] over (point, trial) pairs.
///
/// Requires [`SeedStrategy::PerTrial`]; output is identical to the
/// sequential run with the same configuration.
pub fn run_software_sweep_parallel(config: &SweepConfig) -> Result<Vec<SweepRow>> {
    config.validate()?;
    if config.seed_strategy != SeedStrategy::PerTrial {
        return Err(SimError::InvalidConfig(
            "Parallel sweep requires the per_trial seed strategy".to_string(),
        ));
    }
    let trellis = shared_trellis(&config.code)?;

    config
        .points
        .values()
        .iter()
        .enumerate()
        .map(|(point, &value)| -> Result<SweepRow> {
            let channel = Channel::for_point(&config.points, value, config.samples_per_symbol)?;
            let outcomes: Vec<TrialOutcome> = (0..config.trials)
                .into_par_iter()
                .map_init(
                    || SoftwareLink::new(trellis.clone()),
                    |link, trial| {
                        let mut rng = SimRng::seed_from_u64(trial_seed(config.seed, point, trial));
                        link.run_trial(&channel, config, &mut rng)
                    },
                )
                .collect::<Result<Vec<_>>>()?;

            let mut tally = Tally::default();
            for outcome in outcomes {
                tally.add(outcome, config.payload_len);
            }
            Ok(tally.into_row(&channel, config))
        })
        .collect()
}

/// Run the sweep through an external chain using a known wire mapping.
///
/// The device's decoder traceback depth is expected to equal
/// `config.tail_len`. All draws come from `rng` in trial order.
pub fn run_device_sweep<D: ClockedDevice, R: Rng + ?Sized>(
    driver: &mut StreamDriver<D>,
    config: &SweepConfig,
    mapping: WireMapping,
    rng: &mut R,
) -> Result<Vec<SweepRow>> {
    config.validate()?;
    let clock_period_ns = driver.config().clock_period_ns;

    let mut rows = Vec::with_capacity(config.points.len());
    for &value in config.points.values() {
        let channel = Channel::for_point(&config.points, value, config.samples_per_symbol)?;
        let mut tally = Tally::default();
        for _ in 0..config.trials {
            let payload = random_bits(config.payload_len, rng);
            let recovered = driver.run_trial(&payload, config.tail_len, mapping, &channel, rng)?;
            let outcome = TrialOutcome {
                errors: count_bit_errors(&recovered, &payload),
                uncoded_errors: channel.uncoded_errors(config.payload_len, rng)?,
            };
            tally.add(outcome, config.payload_len);
        }
        let mut row = tally.into_row(&channel, config);
        row.mapping = Some(mapping);
        row.clock_period_ns = Some(clock_period_ns);
        rows.push(row);
    }
    Ok(rows)
}

/// Calibration result plus the sweep measured with it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSession {
    pub calibration: CalibrationReport,
    pub rows: Vec<SweepRow>,
}

/// Calibrate once, then sweep with the chosen mapping. A single generator
/// seeded from `config.seed` feeds both steps.
pub fn run_device_session<D: ClockedDevice>(
    driver: &mut StreamDriver<D>,
    config: &SweepConfig,
) -> Result<DeviceSession> {
    config.validate()?;
    let mut rng = SimRng::seed_from_u64(config.seed);
    let calibration = calibrate_mapping(driver, CALIBRATION_PAYLOAD_LEN, config.tail_len, &mut rng)?;
    let rows = run_device_sweep(driver, config, calibration.mapping, &mut rng)?;
    Ok(DeviceSession { calibration, rows })
}

/// Smallest parameter from which coded BER <= uncoded BER holds for that row
/// and every later one. Rows without an uncoded reference end the scan.
pub fn crossover_point(rows: &[SweepRow]) -> Option<f64> {
    let mut crossover = None;
    for row in rows.iter().rev() {
        match row.uncoded {
            Some(uncoded) if row.ber <= uncoded.ber => crossover = Some(row.parameter),
            _ => break,
        }
    }
    crossover
}
