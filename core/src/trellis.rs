use crate::config::CodeConfig;
use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};

/// One coded output symbol of the rate-1/2 code, always ordered (v1, v0).
///
/// v1 is produced by generator g1, v0 by generator g2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CodedPair {
    pub v1: bool,
    pub v0: bool,
}

impl CodedPair {
    pub fn new(v1: bool, v0: bool) -> Self {
        Self { v1, v0 }
    }

    /// Hamming distance between two pairs (0, 1 or 2)
    pub fn hamming(self, other: CodedPair) -> u32 {
        u32::from(self.v1 != other.v1) + u32::from(self.v0 != other.v0)
    }

    /// Pack as a 2-bit symbol `{v1, v0}`, v1 in the high bit
    pub fn pack(self) -> u8 {
        (u8::from(self.v1) << 1) | u8::from(self.v0)
    }

    /// Inverse of [`CodedPair::pack`]; bits above bit 1 are ignored
    pub fn unpack(symbol: u8) -> Self {
        Self {
            v1: symbol & 0b10 != 0,
            v0: symbol & 0b01 != 0,
        }
    }
}

/// Flatten pairs into a bit stream v1, v0, v1, v0, ...
pub fn pairs_to_bits(pairs: &[CodedPair]) -> Vec<bool> {
    pairs.iter().flat_map(|p| [p.v1, p.v0]).collect()
}

/// Regroup a flat bit stream into pairs. The stream length must be even.
pub fn bits_to_pairs(bits: &[bool]) -> Result<Vec<CodedPair>> {
    if bits.len() % 2 != 0 {
        return Err(SimError::InvalidInputSize);
    }
    Ok(bits
        .chunks_exact(2)
        .map(|c| CodedPair::new(c[0], c[1]))
        .collect())
}

/// Outgoing trellis edge for a (state, input bit) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub next_state: usize,
    pub output: CodedPair,
}

/// Precomputed trellis of a rate-1/2 feed-forward convolutional code.
///
/// A state holds the last K-1 input bits, the most recent one in bit 0.
/// For input `u` the K-bit shift word is `((state << 1) | u)`; generator bit 0
/// taps the current input. With the default (7,5) code this gives
/// `v1 = u ^ u[-1] ^ u[-2]` and `v0 = u ^ u[-2]`.
///
/// The table is built once and never mutated.
#[derive(Debug, Clone)]
pub struct TrellisModel {
    constraint_length: u32,
    g1: u32,
    g2: u32,
    // edges[state * 2 + input]
    edges: Vec<Edge>,
}

impl TrellisModel {
    pub fn new(constraint_length: u32, g1: u32, g2: u32) -> Result<Self> {
        CodeConfig {
            constraint_length,
            g1,
            g2,
        }
        .validate()?;

        let shift_mask = (1u32 << constraint_length) - 1;
        let state_mask = (1u32 << (constraint_length - 1)) - 1;
        let num_states = 1usize << (constraint_length - 1);

        let mut edges = Vec::with_capacity(num_states * 2);
        for state in 0..num_states as u32 {
            for input in [0u32, 1] {
                let shift = ((state << 1) | input) & shift_mask;
                edges.push(Edge {
                    next_state: (shift & state_mask) as usize,
                    output: CodedPair::new(parity(shift & g1), parity(shift & g2)),
                });
            }
        }

        Ok(Self {
            constraint_length,
            g1,
            g2,
            edges,
        })
    }

    pub fn from_config(config: &CodeConfig) -> Result<Self> {
        Self::new(config.constraint_length, config.g1, config.g2)
    }

    pub fn constraint_length(&self) -> u32 {
        self.constraint_length
    }

    pub fn generators(&self) -> (u32, u32) {
        (self.g1, self.g2)
    }

    /// Number of register bits (K-1), also the minimum termination tail
    pub fn memory(&self) -> usize {
        (self.constraint_length - 1) as usize
    }

    /// 2^(K-1)
    pub fn num_states(&self) -> usize {
        self.edges.len() / 2
    }

    pub fn edge(&self, state: usize, input: bool) -> Edge {
        self.edges[state * 2 + usize::from(input)]
    }

    pub fn next_state(&self, state: usize, input: bool) -> usize {
        self.edge(state, input).next_state
    }

    pub fn output(&self, state: usize, input: bool) -> CodedPair {
        self.edge(state, input).output
    }
}

/// XOR-reduction of the set bits
pub fn parity(word: u32) -> bool {
    word.count_ones() & 1 == 1
}
