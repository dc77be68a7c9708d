//! Rate-1/2 convolutional code simulation and verification library
//!
//! Hard-decision Viterbi decoding over AWGN and bit-flip channels, BER sweeps,
//! and a clocked streaming driver for cross-checking an external bit-exact chain

pub mod error;
pub mod config;
pub mod trellis;
pub mod bits;
pub mod convolutional;
pub mod viterbi;
pub mod pulse;
pub mod channel;
pub mod device;
pub mod calibration;
pub mod sweep;
pub mod illustration;

pub use calibration::{calibrate_mapping, CalibrationReport, WireMapping};
pub use channel::{AwgnChannel, BitFlipChannel, Channel, ChannelKind};
pub use config::{CodeConfig, DeviceConfig, SeedStrategy, SweepConfig, SweepPoints};
pub use convolutional::ConvolutionalEncoder;
pub use device::{ClockedDevice, DriverPhase, SimulatedDevice, StreamDriver};
pub use error::{Result, SimError};
pub use illustration::{make_signal_illustration, SignalIllustration};
pub use sweep::{
    crossover_point, run_device_session, run_device_sweep, run_software_sweep,
    run_software_sweep_parallel, DeviceSession, SweepRow, UncodedStats,
};
pub use trellis::{CodedPair, TrellisModel};
pub use viterbi::{StreamingViterbi, ViterbiDecoder};

/// Generator used for every random draw; always passed explicitly
pub type SimRng = rand_chacha::ChaCha8Rng;

// Code configuration: the (7,5) octal code
pub const DEFAULT_CONSTRAINT_LENGTH: u32 = 3;
pub const DEFAULT_G1: u32 = 0b111;
pub const DEFAULT_G2: u32 = 0b101;
pub const MAX_CONSTRAINT_LENGTH: u32 = 16;

// Sweep configuration
pub const DEFAULT_SAMPLES_PER_SYMBOL: usize = 8;
pub const DEFAULT_TRIALS: usize = 20;
pub const DEFAULT_PAYLOAD_LEN: usize = 200;
pub const DEFAULT_TAIL_LEN: usize = 12; // also the device traceback depth
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_FLIP_PROBABILITIES: [f64; 4] = [0.0, 0.02, 0.05, 0.1];

// External device configuration
pub const CALIBRATION_PAYLOAD_LEN: usize = 64;
pub const RESET_HOLD_CYCLES: usize = 5;
pub const ENCODER_TIMEOUT_CYCLES: usize = 16;
pub const CLOCK_PERIOD_NS: u32 = 10; // 100 MHz
