use crate::trellis::{CodedPair, TrellisModel};
use std::sync::Arc;

/// Rate-1/2 convolutional encoder driven by a precomputed [`TrellisModel`].
///
/// The K-1 bit register starts at zero and is cleared again by [`reset`](Self::reset).
/// Each input bit produces one (v1, v0) pair.
#[derive(Debug, Clone)]
pub struct ConvolutionalEncoder {
    trellis: Arc<TrellisModel>,
    state: usize,
}

impl ConvolutionalEncoder {
    pub fn new(trellis: Arc<TrellisModel>) -> Self {
        Self { trellis, state: 0 }
    }

    /// Encode a single bit, advancing the register
    pub fn encode_bit(&mut self, input: bool) -> CodedPair {
        let edge = self.trellis.edge(self.state, input);
        self.state = edge.next_state;
        edge.output
    }

    /// Encode bits in order, continuing from the current register contents
    pub fn encode_sequence(&mut self, bits: &[bool]) -> Vec<CodedPair> {
        bits.iter().map(|&b| self.encode_bit(b)).collect()
    }

    /// Reset, append the K-1 bit zero tail and encode.
    /// The register ends back in state 0.
    pub fn encode_terminated(&mut self, payload: &[bool]) -> Vec<CodedPair> {
        self.reset();
        let bits = self.append_tail(payload);
        self.encode_sequence(&bits)
    }

    /// Payload followed by K-1 zero bits
    pub fn append_tail(&self, payload: &[bool]) -> Vec<bool> {
        append_zeros(payload, self.trellis.memory())
    }

    pub fn state(&self) -> usize {
        self.state
    }

    /// Reset encoder state for a new trial
    pub fn reset(&mut self) {
        self.state = 0;
    }

    pub fn trellis(&self) -> &TrellisModel {
        &self.trellis
    }
}

/// Payload followed by `count` zero bits
pub fn append_zeros(payload: &[bool], count: usize) -> Vec<bool> {
    let mut bits = Vec::with_capacity(payload.len() + count);
    bits.extend_from_slice(payload);
    bits.resize(payload.len() + count, false);
    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seven_five() -> Arc<TrellisModel> {
        Arc::new(TrellisModel::new(3, 0b111, 0b101).unwrap())
    }

    fn bits(v: &[u8]) -> Vec<bool> {
        v.iter().map(|&b| b == 1).collect()
    }

    #[test]
    fn test_known_pattern_matches_register_recursion() {
        // d1 = previous input, d0 = the one before
        let input = bits(&[1, 0, 1, 1, 0, 0, 1]);
        let (mut d1, mut d0) = (false, false);
        let mut reference = Vec::new();
        for &u in &input {
            reference.push(CodedPair::new(u ^ d1 ^ d0, u ^ d0));
            d0 = d1;
            d1 = u;
        }

        let mut encoder = ConvolutionalEncoder::new(seven_five());
        let coded = encoder.encode_sequence(&input);

        assert_eq!(coded.len(), reference.len());
        for (i, (got, want)) in coded.iter().zip(&reference).enumerate() {
            assert_eq!(got, want, "pair {} differs", i);
        }
        let packed: Vec<u8> = coded.iter().map(|p| p.pack()).collect();
        assert_eq!(packed, vec![0b11, 0b10, 0b00, 0b01, 0b01, 0b11, 0b11]);
    }

    #[test]
    fn test_readme_payload_codeword() {
        let mut encoder = ConvolutionalEncoder::new(seven_five());
        let coded = encoder.encode_sequence(&bits(&[1, 1, 0, 1, 1]));
        let packed: Vec<u8> = coded.iter().map(|p| p.pack()).collect();
        assert_eq!(packed, vec![0b11, 0b01, 0b01, 0b00, 0b01]);
    }

    #[test]
    fn test_encoder_state_progression() {
        let mut encoder = ConvolutionalEncoder::new(seven_five());
        assert_eq!(encoder.state(), 0);

        encoder.encode_bit(true);
        assert_ne!(encoder.state(), 0);

        encoder.reset();
        assert_eq!(encoder.state(), 0);
    }

    #[test]
    fn test_tail_returns_register_to_zero() {
        let trellis = Arc::new(TrellisModel::new(7, 0o133, 0o171).unwrap());
        let mut encoder = ConvolutionalEncoder::new(trellis);
        let payload = bits(&[1, 1, 1, 0, 1, 1, 0, 1]);
        let coded = encoder.encode_terminated(&payload);
        assert_eq!(coded.len(), payload.len() + 6);
        assert_eq!(encoder.state(), 0);
    }

    #[test]
    fn test_append_tail_length() {
        let encoder = ConvolutionalEncoder::new(seven_five());
        let tailed = encoder.append_tail(&bits(&[1, 0, 1]));
        assert_eq!(tailed, bits(&[1, 0, 1, 0, 0]));
        assert_eq!(append_zeros(&[], 3), vec![false; 3]);
    }

    #[test]
    fn test_all_zero_input_gives_all_zero_output() {
        let mut encoder = ConvolutionalEncoder::new(seven_five());
        let coded = encoder.encode_sequence(&[false; 16]);
        assert!(coded.iter().all(|p| *p == CodedPair::default()));
    }

    #[test]
    fn test_encode_empty() {
        let mut encoder = ConvolutionalEncoder::new(seven_five());
        assert!(encoder.encode_sequence(&[]).is_empty());
        assert_eq!(encoder.encode_terminated(&[]).len(), 2);
    }
}
