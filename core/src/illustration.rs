//! One noisy coded waveform with its matched-filter output, for plotting.

use crate::channel::AwgnChannel;
use crate::convolutional::ConvolutionalEncoder;
use crate::error::Result;
use crate::pulse::{bpsk_map, eye_traces, matched_filter, sample_centers, upsample};
use crate::trellis::{pairs_to_bits, TrellisModel};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

/// Eye diagrams stop after this many windows
pub const MAX_EYE_TRACES: usize = 100;

/// 0110 1001 1100 1011
pub const DEMO_PATTERN: [bool; 16] = [
    false, true, true, false, true, false, false, true, true, true, false, false, true, false,
    true, true,
];

#[derive(Debug, Clone, Serialize)]
pub struct SignalIllustration {
    pub ebn0_db: f64,
    pub samples_per_symbol: usize,
    /// Noiseless shaped coded bits
    pub tx: Vec<f64>,
    /// Matched-filter output of the noisy signal
    pub matched: Vec<f64>,
    pub centers: Vec<usize>,
    pub center_samples: Vec<f64>,
    pub eye: Vec<Vec<f64>>,
}

/// Encode the demo pattern plus tail and push it through an AWGN link at `ebn0_db`
pub fn make_signal_illustration<R: Rng + ?Sized>(
    trellis: Arc<TrellisModel>,
    ebn0_db: f64,
    samples_per_symbol: usize,
    rng: &mut R,
) -> Result<SignalIllustration> {
    let channel = AwgnChannel::new(ebn0_db, samples_per_symbol)?;
    let mut encoder = ConvolutionalEncoder::new(trellis);
    let coded = encoder.encode_terminated(&DEMO_PATTERN);

    let tx = upsample(&bpsk_map(&pairs_to_bits(&coded)), samples_per_symbol)?;
    let rx = channel.add_noise(&tx, rng);
    let matched = matched_filter(&rx, samples_per_symbol)?;
    let centers = sample_centers(matched.len(), samples_per_symbol)?;
    let center_samples = centers.iter().map(|&i| matched[i]).collect();
    let eye = eye_traces(&matched, samples_per_symbol, MAX_EYE_TRACES)?;

    Ok(SignalIllustration {
        ebn0_db,
        samples_per_symbol,
        tx,
        matched,
        centers,
        center_samples,
        eye,
    })
}
