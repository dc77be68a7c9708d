//! Rectangular pulse shaping and matched filtering for BPSK.
//!
//! Sign convention throughout: bit 0 maps to +1, bit 1 to -1, and a negative
//! filtered sample decides bit 1.

use crate::error::{Result, SimError};

fn check_sps(sps: usize) -> Result<()> {
    if sps == 0 {
        return Err(SimError::InvalidConfig(
            "Samples per symbol must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Map bits to bipolar amplitudes (0 -> +1, 1 -> -1)
pub fn bpsk_map(bits: &[bool]) -> Vec<f64> {
    bits.iter().map(|&b| if b { -1.0 } else { 1.0 }).collect()
}

/// Zero-order hold: repeat every symbol `sps` times
pub fn upsample(symbols: &[f64], sps: usize) -> Result<Vec<f64>> {
    check_sps(sps)?;
    let mut samples = Vec::with_capacity(symbols.len() * sps);
    for &s in symbols {
        samples.extend(std::iter::repeat(s).take(sps));
    }
    Ok(samples)
}

/// Same-length convolution with a unit-height rectangular kernel of `sps` taps.
///
/// Output n is the full convolution at n + (sps-1)/2, so sample
/// sps/2 + k*sps integrates exactly the k-th symbol period.
pub fn matched_filter(samples: &[f64], sps: usize) -> Result<Vec<f64>> {
    check_sps(sps)?;
    let len = samples.len() as isize;
    let offset = ((sps - 1) / 2) as isize;
    let taps = sps as isize;

    let filtered = (0..len)
        .map(|n| {
            let hi = (n + offset).min(len - 1);
            let lo = (n + offset + 1 - taps).max(0);
            if lo > hi {
                0.0
            } else {
                samples[lo as usize..=hi as usize].iter().sum()
            }
        })
        .collect();
    Ok(filtered)
}

/// Pulse-center indices sps/2 + k*sps that fall inside `len` samples
pub fn sample_centers(len: usize, sps: usize) -> Result<Vec<usize>> {
    check_sps(sps)?;
    Ok((sps / 2..len).step_by(sps).collect())
}

/// Filtered values at the pulse centers, one per symbol
pub fn sample_at_centers(filtered: &[f64], sps: usize) -> Result<Vec<f64>> {
    Ok(sample_centers(filtered.len(), sps)?
        .into_iter()
        .map(|i| filtered[i])
        .collect())
}

/// Threshold at zero; negative decides bit 1
pub fn hard_decide(samples: &[f64]) -> Vec<bool> {
    samples.iter().map(|&s| s < 0.0).collect()
}

/// Overlapping two-symbol windows for eye diagrams.
///
/// Window k starts at k*sps and spans 2*sps samples. Stops at `max_traces`
/// or at the first window that would run past the end.
pub fn eye_traces(filtered: &[f64], sps: usize, max_traces: usize) -> Result<Vec<Vec<f64>>> {
    check_sps(sps)?;
    let span = 2 * sps;
    Ok((0..max_traces)
        .map(|k| k * sps)
        .take_while(|&start| start + span <= filtered.len())
        .map(|start| filtered[start..start + span].to_vec())
        .collect())
}
