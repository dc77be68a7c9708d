//! Hard-decision Viterbi decoding.
//!
//! [`ViterbiDecoder`] decodes a whole received block with full provenance and a
//! single traceback from the best final state. [`StreamingViterbi`] is the
//! sliding-window form that emits one decision per received symbol once its
//! traceback window is full, the way a pipelined hardware decoder does.
//!
//! Both share the same survivor rule: states are visited in ascending order,
//! input 0 before input 1, and a node is only overwritten by a *strictly*
//! smaller candidate metric. Ties therefore keep the earliest-computed
//! predecessor and decoding is fully deterministic.

use crate::trellis::{CodedPair, TrellisModel};
use log::warn;
use std::collections::VecDeque;
use std::sync::Arc;

/// Path metric of a state that no path reaches yet.
/// Larger than any real accumulated distance (at most 2 per step).
pub const UNREACHABLE: u32 = u32::MAX;

/// Recorded predecessor of a trellis node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Survivor {
    pub prev_state: usize,
    pub input: bool,
}

/// Path metrics and survivors for times 0..=T of one decode call
#[derive(Debug, Clone)]
pub struct PathMetricTable {
    metrics: Vec<Vec<u32>>,
    survivors: Vec<Vec<Option<Survivor>>>,
}

/// Result of a traceback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traceback {
    /// Decoded input bits in forward order, one per received pair
    pub bits: Vec<bool>,
    pub final_state: usize,
    pub final_metric: u32,
    /// Steps where a reachable node had no survivor and the walk restarted from state 0.
    /// Always 0 for tables produced by [`ViterbiDecoder::forward`].
    pub fallbacks: usize,
}

impl PathMetricTable {
    /// Table for `steps` received symbols. Only state 0 is reachable at t = 0.
    pub fn new(num_states: usize, steps: usize) -> Self {
        let mut metrics = vec![vec![UNREACHABLE; num_states]; steps + 1];
        metrics[0][0] = 0;
        Self {
            metrics,
            survivors: vec![vec![None; num_states]; steps + 1],
        }
    }

    /// Number of trellis steps T
    pub fn steps(&self) -> usize {
        self.metrics.len() - 1
    }

    pub fn metric(&self, t: usize, state: usize) -> u32 {
        self.metrics[t][state]
    }

    pub fn survivor(&self, t: usize, state: usize) -> Option<Survivor> {
        self.survivors[t][state]
    }

    /// Offer `candidate` for node (t, state). Accepted only if strictly better.
    pub fn relax(&mut self, t: usize, state: usize, candidate: u32, survivor: Survivor) -> bool {
        if candidate < self.metrics[t][state] {
            self.metrics[t][state] = candidate;
            self.survivors[t][state] = Some(survivor);
            true
        } else {
            false
        }
    }

    /// First state with the minimum metric at time T
    pub fn best_final_state(&self) -> (usize, u32) {
        first_argmin(&self.metrics[self.steps()])
    }

    /// Walk recorded predecessors back from (T, final_state).
    ///
    /// A missing survivor at a reachable node violates the forward recursion's
    /// invariant; the walk then emits 0 and continues from state 0, counting
    /// the event in [`Traceback::fallbacks`].
    pub fn traceback(&self, final_state: usize) -> Traceback {
        let steps = self.steps();
        let mut bits = vec![false; steps];
        let mut fallbacks = 0;
        let mut state = final_state;

        for t in (1..=steps).rev() {
            match self.survivors[t][state] {
                Some(survivor) => {
                    bits[t - 1] = survivor.input;
                    state = survivor.prev_state;
                }
                None => {
                    warn!("Traceback: no survivor at t={} state={}, restarting from state 0", t, state);
                    fallbacks += 1;
                    state = 0;
                }
            }
        }

        Traceback {
            bits,
            final_state,
            final_metric: self.metrics[steps][final_state],
            fallbacks,
        }
    }
}

/// Block Viterbi decoder for the code described by a [`TrellisModel`]
#[derive(Debug, Clone)]
pub struct ViterbiDecoder {
    trellis: Arc<TrellisModel>,
}

impl ViterbiDecoder {
    pub fn new(trellis: Arc<TrellisModel>) -> Self {
        Self { trellis }
    }

    /// Run the add-compare-select recursion over all received pairs
    pub fn forward(&self, received: &[CodedPair]) -> PathMetricTable {
        let num_states = self.trellis.num_states();
        let mut table = PathMetricTable::new(num_states, received.len());

        for (t, &rx) in received.iter().enumerate() {
            for state in 0..num_states {
                let metric = table.metric(t, state);
                if metric == UNREACHABLE {
                    continue;
                }
                for input in [false, true] {
                    let edge = self.trellis.edge(state, input);
                    let candidate = metric + edge.output.hamming(rx);
                    table.relax(
                        t + 1,
                        edge.next_state,
                        candidate,
                        Survivor {
                            prev_state: state,
                            input,
                        },
                    );
                }
            }
        }

        table
    }

    /// Decode and report the final state, its metric and any traceback fallbacks.
    ///
    /// The final state is the best one at time T (first index on ties); it is
    /// not forced to 0.
    pub fn decode_with_traceback(&self, received: &[CodedPair]) -> Traceback {
        let table = self.forward(received);
        let (final_state, _) = table.best_final_state();
        table.traceback(final_state)
    }

    /// Decode received pairs into one bit per pair, time aligned with the encoder input
    pub fn decode(&self, received: &[CodedPair]) -> Vec<bool> {
        self.decode_with_traceback(received).bits
    }
}

/// Sliding-window Viterbi decoder with a fixed traceback depth.
///
/// After the (t+1)-th pushed symbol, with t >= depth, the decision for input
/// index t - depth is emitted by tracing back depth + 1 steps from the best
/// current state. A stream of T symbols therefore yields T - depth decisions.
#[derive(Debug, Clone)]
pub struct StreamingViterbi {
    trellis: Arc<TrellisModel>,
    depth: usize,
    metrics: Vec<u32>,
    history: VecDeque<Vec<Option<Survivor>>>,
    received: usize,
}

impl StreamingViterbi {
    pub fn new(trellis: Arc<TrellisModel>, depth: usize) -> Self {
        let num_states = trellis.num_states();
        let mut decoder = Self {
            trellis,
            depth,
            metrics: vec![UNREACHABLE; num_states],
            history: VecDeque::with_capacity(depth + 1),
            received: 0,
        };
        decoder.reset();
        decoder
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Symbols consumed since the last reset
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn reset(&mut self) {
        self.metrics.fill(UNREACHABLE);
        self.metrics[0] = 0;
        self.history.clear();
        self.received = 0;
    }

    /// Consume one received pair; returns a decision once the window is full
    pub fn push(&mut self, rx: CodedPair) -> Option<bool> {
        let num_states = self.trellis.num_states();
        let mut next = vec![UNREACHABLE; num_states];
        let mut step = vec![None; num_states];

        for state in 0..num_states {
            let metric = self.metrics[state];
            if metric == UNREACHABLE {
                continue;
            }
            for input in [false, true] {
                let edge = self.trellis.edge(state, input);
                let candidate = metric + edge.output.hamming(rx);
                if candidate < next[edge.next_state] {
                    next[edge.next_state] = candidate;
                    step[edge.next_state] = Some(Survivor {
                        prev_state: state,
                        input,
                    });
                }
            }
        }

        // Renormalise so metrics stay bounded on long streams
        let (_, floor) = first_argmin(&next);
        for m in next.iter_mut().filter(|m| **m != UNREACHABLE) {
            *m -= floor;
        }
        self.metrics = next;

        self.history.push_back(step);
        if self.history.len() > self.depth + 1 {
            self.history.pop_front();
        }
        self.received += 1;

        if self.received <= self.depth {
            return None;
        }

        let (mut state, _) = first_argmin(&self.metrics);
        let mut decision = false;
        for step in self.history.iter().rev() {
            match step[state] {
                Some(survivor) => {
                    decision = survivor.input;
                    state = survivor.prev_state;
                }
                None => {
                    decision = false;
                    state = 0;
                }
            }
        }
        Some(decision)
    }
}

/// Index and value of the first minimum
fn first_argmin(row: &[u32]) -> (usize, u32) {
    let mut best = (0, UNREACHABLE);
    for (state, &metric) in row.iter().enumerate() {
        if metric < best.1 {
            best = (state, metric);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convolutional::{append_zeros, ConvolutionalEncoder};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn trellis(k: u32, g1: u32, g2: u32) -> Arc<TrellisModel> {
        Arc::new(TrellisModel::new(k, g1, g2).unwrap())
    }

    fn seven_five() -> Arc<TrellisModel> {
        trellis(3, 0b111, 0b101)
    }

    fn bits(v: &[u8]) -> Vec<bool> {
        v.iter().map(|&b| b == 1).collect()
    }

    fn random_payload(len: usize, rng: &mut ChaCha8Rng) -> Vec<bool> {
        (0..len).map(|_| rng.gen::<bool>()).collect()
    }

    #[test]
    fn test_round_trip_clean_channel() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for (k, g1, g2) in [(3, 0b111, 0b101), (4, 0o15, 0o17), (7, 0o133, 0o171)] {
            let model = trellis(k, g1, g2);
            let mut encoder = ConvolutionalEncoder::new(model.clone());
            let decoder = ViterbiDecoder::new(model);
            for len in [0, 1, 5, 64, 300] {
                let payload = random_payload(len, &mut rng);
                let with_tail = encoder.append_tail(&payload);
                let coded = encoder.encode_terminated(&payload);
                let traceback = decoder.decode_with_traceback(&coded);
                assert_eq!(traceback.bits, with_tail, "K={} len={}", k, len);
                assert_eq!(traceback.final_state, 0);
                assert_eq!(traceback.final_metric, 0);
                assert_eq!(traceback.fallbacks, 0);
            }
        }
    }

    #[test]
    fn test_single_coded_bit_flip_corrected_everywhere() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let model = seven_five();
        let mut encoder = ConvolutionalEncoder::new(model.clone());
        let decoder = ViterbiDecoder::new(model);
        let payload = random_payload(40, &mut rng);
        let coded = encoder.encode_terminated(&payload);

        for index in 0..coded.len() {
            for first in [true, false] {
                let mut corrupted = coded.clone();
                if first {
                    corrupted[index].v1 = !corrupted[index].v1;
                } else {
                    corrupted[index].v0 = !corrupted[index].v0;
                }
                let decoded = decoder.decode(&corrupted);
                assert_eq!(
                    &decoded[..payload.len()],
                    &payload[..],
                    "flip at symbol {} ({})",
                    index,
                    if first { "v1" } else { "v0" }
                );
            }
        }
    }

    #[test]
    fn test_readme_sequence_with_flipped_symbol() {
        let model = seven_five();
        let mut encoder = ConvolutionalEncoder::new(model.clone());
        let payload = bits(&[1, 1, 0, 1, 1]);
        let mut coded = encoder.encode_sequence(&append_zeros(&payload, 5));
        coded[3].v1 = !coded[3].v1;

        let traceback = ViterbiDecoder::new(model).decode_with_traceback(&coded);
        assert_eq!(&traceback.bits[..5], &payload[..]);
        assert_eq!(&traceback.bits[5..], &[false; 5]);
        assert_eq!(traceback.final_metric, 1);
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let decoder = ViterbiDecoder::new(seven_five());
        let traceback = decoder.decode_with_traceback(&[]);
        assert!(traceback.bits.is_empty());
        assert_eq!(traceback.final_state, 0);
        assert_eq!(traceback.fallbacks, 0);
    }

    #[test]
    fn test_tie_prefers_lowest_state_and_zero_input() {
        // From state 0, input 0 emits 00 and input 1 emits 11: both at distance 1 from 10
        let decoder = ViterbiDecoder::new(seven_five());
        let table = decoder.forward(&[CodedPair::new(true, false)]);
        assert_eq!(table.metric(1, 0), 1);
        assert_eq!(table.metric(1, 1), 1);
        assert_eq!(table.best_final_state(), (0, 1));
        assert_eq!(decoder.decode(&[CodedPair::new(true, false)]), vec![false]);
    }

    #[test]
    fn test_relax_keeps_first_on_equal_metric() {
        let mut table = PathMetricTable::new(4, 1);
        let first = Survivor { prev_state: 0, input: false };
        let second = Survivor { prev_state: 2, input: false };
        assert!(table.relax(1, 0, 3, first));
        assert!(!table.relax(1, 0, 3, second));
        assert_eq!(table.survivor(1, 0), Some(first));
        assert!(table.relax(1, 0, 2, second));
        assert_eq!(table.survivor(1, 0), Some(second));
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let received: Vec<CodedPair> = (0..200)
            .map(|_| CodedPair::new(rng.gen(), rng.gen()))
            .collect();
        let decoder = ViterbiDecoder::new(seven_five());
        assert_eq!(decoder.decode(&received), decoder.decode(&received));
    }

    #[test]
    fn test_path_metrics_non_decreasing_along_survivors() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let received: Vec<CodedPair> = (0..100)
            .map(|_| CodedPair::new(rng.gen(), rng.gen()))
            .collect();
        let table = ViterbiDecoder::new(trellis(4, 0o15, 0o17)).forward(&received);
        for t in 1..=table.steps() {
            for state in 0..8 {
                if let Some(s) = table.survivor(t, state) {
                    let here = table.metric(t, state);
                    let before = table.metric(t - 1, s.prev_state);
                    assert!(here >= before && here <= before + 2);
                }
            }
        }
    }

    #[test]
    fn test_traceback_missing_survivor_falls_back_to_state_zero() {
        let mut table = PathMetricTable::new(4, 4);
        table.relax(1, 1, 0, Survivor { prev_state: 0, input: true });
        table.relax(2, 2, 0, Survivor { prev_state: 1, input: false });
        table.relax(3, 0, 0, Survivor { prev_state: 2, input: false });
        // t=4: state 3 marked reachable with no survivor recorded
        table.metrics[4][3] = 0;

        let traceback = table.traceback(3);
        assert_eq!(traceback.fallbacks, 1);
        assert_eq!(traceback.final_state, 3);
        // Step 4 emits 0, then the walk continues from state 0 at t=3
        assert_eq!(traceback.bits, vec![true, false, false, false]);
    }

    #[test]
    fn test_traceback_fallback_resumes_on_recorded_path() {
        let mut table = PathMetricTable::new(4, 2);
        table.relax(1, 0, 0, Survivor { prev_state: 0, input: false });
        table.metrics[2][3] = 1;

        let traceback = table.traceback(3);
        assert_eq!(traceback.fallbacks, 1);
        assert_eq!(traceback.bits, vec![false, false]);
        assert_eq!(traceback.final_metric, 1);
    }

    #[test]
    fn test_streaming_noiseless_emits_payload() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let model = seven_five();
        let mut encoder = ConvolutionalEncoder::new(model.clone());
        let tail = 12;
        let payload = random_payload(200, &mut rng);
        let coded = encoder.encode_sequence(&append_zeros(&payload, tail));

        let mut decoder = StreamingViterbi::new(model, tail);
        let decided: Vec<bool> = coded.iter().filter_map(|&p| decoder.push(p)).collect();
        assert_eq!(decided.len(), coded.len() - tail);
        assert_eq!(decided, payload);
    }

    #[test]
    fn test_streaming_readme_sequence() {
        let model = seven_five();
        let mut encoder = ConvolutionalEncoder::new(model.clone());
        let payload = bits(&[1, 1, 0, 1, 1]);
        let mut coded = encoder.encode_sequence(&append_zeros(&payload, 5));
        coded[3].v1 = !coded[3].v1;

        let mut decoder = StreamingViterbi::new(model, 5);
        let decided: Vec<bool> = coded.iter().filter_map(|&p| decoder.push(p)).collect();
        assert_eq!(&decided[decided.len() - 5..], &payload[..]);
    }

    #[test]
    fn test_streaming_reset() {
        let model = seven_five();
        let mut decoder = StreamingViterbi::new(model, 2);
        for _ in 0..4 {
            decoder.push(CodedPair::new(true, true));
        }
        assert_eq!(decoder.received(), 4);
        decoder.reset();
        assert_eq!(decoder.received(), 0);
        assert_eq!(decoder.push(CodedPair::default()), None);
    }
}
