//! Channel models between the encoder and the decoder.
//!
//! [`Channel`] is a closed set of variants sharing one capability: turn coded
//! pairs into hard-decision pairs, drawing all randomness from the generator
//! the caller passes in.

use crate::bits::{count_bit_errors, random_bits};
use crate::config::{validate_probability, SweepPoints};
use crate::error::{Result, SimError};
use crate::pulse::{bpsk_map, hard_decide, matched_filter, sample_at_centers, upsample};
use crate::trellis::{bits_to_pairs, pairs_to_bits, CodedPair};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Convert dB to a linear power ratio
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

/// Per-sample noise variance for a given Eb/N0, 1 / (2 * Eb/N0).
///
/// The code rate is not folded in, so coded and uncoded links see the same
/// per-symbol SNR.
pub fn noise_variance(ebn0_db: f64) -> f64 {
    1.0 / (2.0 * db_to_linear(ebn0_db))
}

/// BPSK over a rectangular-pulse, additive white Gaussian noise link
#[derive(Debug, Clone, Copy)]
pub struct AwgnChannel {
    ebn0_db: f64,
    samples_per_symbol: usize,
    noise: Normal<f64>,
}

impl AwgnChannel {
    pub fn new(ebn0_db: f64, samples_per_symbol: usize) -> Result<Self> {
        if !ebn0_db.is_finite() {
            return Err(SimError::InvalidConfig(format!(
                "Eb/N0 must be finite, got {}",
                ebn0_db
            )));
        }
        if samples_per_symbol == 0 {
            return Err(SimError::InvalidConfig(
                "Samples per symbol must be > 0".to_string(),
            ));
        }
        let noise = Normal::new(0.0, noise_variance(ebn0_db).sqrt())
            .map_err(|e| SimError::InvalidConfig(format!("Noise distribution: {}", e)))?;
        Ok(Self {
            ebn0_db,
            samples_per_symbol,
            noise,
        })
    }

    pub fn ebn0_db(&self) -> f64 {
        self.ebn0_db
    }

    pub fn samples_per_symbol(&self) -> usize {
        self.samples_per_symbol
    }

    pub fn noise_std_dev(&self) -> f64 {
        self.noise.std_dev()
    }

    /// Add an independent noise draw to every sample, in order
    pub fn add_noise<R: Rng + ?Sized>(&self, samples: &[f64], rng: &mut R) -> Vec<f64> {
        samples
            .iter()
            .map(|&s| s + self.noise.sample(rng))
            .collect()
    }

    /// Map, shape, add noise, matched-filter, sample at pulse centers and decide
    pub fn transmit_bits<R: Rng + ?Sized>(&self, bits: &[bool], rng: &mut R) -> Result<Vec<bool>> {
        let sps = self.samples_per_symbol;
        let tx = upsample(&bpsk_map(bits), sps)?;
        let rx = self.add_noise(&tx, rng);
        let filtered = matched_filter(&rx, sps)?;
        Ok(hard_decide(&sample_at_centers(&filtered, sps)?))
    }

    /// Send coded pairs as the bit stream v1, v0, v1, v0, ...
    pub fn apply<R: Rng + ?Sized>(&self, coded: &[CodedPair], rng: &mut R) -> Result<Vec<CodedPair>> {
        let decided = self.transmit_bits(&pairs_to_bits(coded), rng)?;
        bits_to_pairs(&decided)
    }

    /// Bit errors of an uncoded link: fresh random bits through the same
    /// shaping, noise and decision chain
    pub fn uncoded_errors<R: Rng + ?Sized>(&self, num_bits: usize, rng: &mut R) -> Result<usize> {
        let bits = random_bits(num_bits, rng);
        let decided = self.transmit_bits(&bits, rng)?;
        Ok(count_bit_errors(&decided, &bits))
    }
}

/// Flips each coded bit independently, bypassing pulse shaping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitFlipChannel {
    probability: f64,
}

impl BitFlipChannel {
    pub fn new(probability: f64) -> Result<Self> {
        validate_probability(probability)?;
        Ok(Self { probability })
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn flip<R: Rng + ?Sized>(&self, bit: bool, rng: &mut R) -> bool {
        bit ^ rng.gen_bool(self.probability)
    }

    /// v1 then v0 of every pair, one Bernoulli draw per bit
    pub fn apply<R: Rng + ?Sized>(&self, coded: &[CodedPair], rng: &mut R) -> Vec<CodedPair> {
        coded
            .iter()
            .map(|p| {
                let v1 = self.flip(p.v1, rng);
                let v0 = self.flip(p.v0, rng);
                CodedPair::new(v1, v0)
            })
            .collect()
    }
}

/// Which channel family a sweep row was measured on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Awgn,
    BitFlip,
}

#[derive(Debug, Clone, Copy)]
pub enum Channel {
    Awgn(AwgnChannel),
    BitFlip(BitFlipChannel),
}

impl Channel {
    /// Channel for one value of a sweep list
    pub fn for_point(points: &SweepPoints, value: f64, samples_per_symbol: usize) -> Result<Self> {
        match points {
            SweepPoints::EbN0Db(_) => Ok(Channel::Awgn(AwgnChannel::new(value, samples_per_symbol)?)),
            SweepPoints::FlipProbability(_) => Ok(Channel::BitFlip(BitFlipChannel::new(value)?)),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::Awgn(_) => ChannelKind::Awgn,
            Channel::BitFlip(_) => ChannelKind::BitFlip,
        }
    }

    /// Eb/N0 in dB or flip probability
    pub fn parameter(&self) -> f64 {
        match self {
            Channel::Awgn(c) => c.ebn0_db(),
            Channel::BitFlip(c) => c.probability(),
        }
    }

    /// Coded pairs in, hard-decision pairs out
    pub fn apply<R: Rng + ?Sized>(&self, coded: &[CodedPair], rng: &mut R) -> Result<Vec<CodedPair>> {
        match self {
            Channel::Awgn(c) => c.apply(coded, rng),
            Channel::BitFlip(c) => Ok(c.apply(coded, rng)),
        }
    }

    /// Uncoded baseline errors for `num_bits`; only the AWGN variant has one
    pub fn uncoded_errors<R: Rng + ?Sized>(&self, num_bits: usize, rng: &mut R) -> Result<Option<usize>> {
        match self {
            Channel::Awgn(c) => c.uncoded_errors(num_bits, rng).map(Some),
            Channel::BitFlip(_) => Ok(None),
        }
    }
}
