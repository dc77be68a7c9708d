//! Clock-synchronized streaming interface to an external encoder/decoder pair.
//!
//! An external chain exposes four ports: an encoder input bit with valid, an
//! encoder output pin pair with valid, a decoder input symbol with valid and a
//! decoder output bit with valid. Inputs are sampled on the rising clock edge.
//! [`ClockedDevice`] models those ports; [`StreamDriver`] drives them through
//! an explicit phase machine; [`SimulatedDevice`] is a software stand-in.

use crate::bits::recover_trailing;
use crate::calibration::WireMapping;
use crate::channel::Channel;
use crate::config::DeviceConfig;
use crate::convolutional::{append_zeros, ConvolutionalEncoder};
use crate::error::{Result, SimError};
use crate::trellis::{CodedPair, TrellisModel};
use crate::viterbi::StreamingViterbi;
use log::debug;
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

/// Pin-level view of an external encoder/decoder chain sharing one clock
pub trait ClockedDevice {
    /// Hold or release reset for both halves of the chain
    fn set_reset(&mut self, asserted: bool);

    /// Encoder input port, sampled on the next rising edge
    fn drive_encoder(&mut self, valid: bool, bit: bool);

    /// Decoder input port, packed `{v1, v0}`, sampled on the next rising edge
    fn drive_decoder(&mut self, valid: bool, symbol: u8);

    /// Advance one clock cycle
    fn rising_edge(&mut self);

    /// Raw output pins (y0, y1) when encoder output-valid is asserted
    fn encoder_output(&self) -> Option<(bool, bool)>;

    /// Decided bit when decoder output-valid is asserted
    fn decoder_output(&self) -> Option<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverPhase {
    /// Reset held or never released; no stimulus allowed
    Reset,
    Idle,
    /// Presenting inputs
    Driving,
    /// Clocking with inputs idle to flush decoder latency
    Draining,
}

/// Drives a [`ClockedDevice`] through reset, stimulus and drain phases.
///
/// Every phase change happens on a clock edge issued by the driver, so a
/// mocked device sees exactly the cycle sequence real hardware would.
pub struct StreamDriver<D: ClockedDevice> {
    device: D,
    config: DeviceConfig,
    phase: DriverPhase,
    cycles: u64,
}

impl<D: ClockedDevice> StreamDriver<D> {
    pub fn new(device: D, config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            device,
            config,
            phase: DriverPhase::Reset,
            cycles: 0,
        })
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    /// Clock edges issued since construction
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_inner(self) -> D {
        self.device
    }

    fn tick(&mut self) {
        self.device.rising_edge();
        self.cycles += 1;
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.phase {
            DriverPhase::Reset => Err(SimError::DeviceNotReady(self.phase)),
            _ => Ok(()),
        }
    }

    /// Hold reset with idle inputs for the configured cycles, then release
    pub fn reset(&mut self) {
        self.phase = DriverPhase::Reset;
        self.device.set_reset(true);
        self.device.drive_encoder(false, false);
        self.device.drive_decoder(false, 0);
        for _ in 0..self.config.reset_cycles {
            self.tick();
        }
        self.device.set_reset(false);
        self.tick();
        self.phase = DriverPhase::Idle;
    }

    /// Present one bit for a single edge and wait for encoder output-valid.
    ///
    /// Returns the raw pins (y0, y1); interpreting them is the caller's job.
    pub fn encode_bit(&mut self, bit: bool) -> Result<(bool, bool)> {
        self.ensure_ready()?;
        self.phase = DriverPhase::Driving;

        self.device.drive_encoder(true, bit);
        self.tick();
        self.device.drive_encoder(false, false);

        for _ in 0..self.config.encoder_latency_cycles {
            self.tick();
        }

        for _ in 0..self.config.timeout_cycles {
            if let Some(pins) = self.device.encoder_output() {
                return Ok(pins);
            }
            self.tick();
        }

        Err(SimError::Timeout {
            what: "encoder output valid",
            cycles: self.config.timeout_cycles,
        })
    }

    /// Encode a bit stream, interpreting each pin pair with `mapping`
    pub fn encode_stream(&mut self, bits: &[bool], mapping: WireMapping) -> Result<Vec<CodedPair>> {
        let mut coded = Vec::with_capacity(bits.len());
        for &bit in bits {
            coded.push(mapping.interpret(self.encode_bit(bit)?));
        }
        self.phase = DriverPhase::Idle;
        Ok(coded)
    }

    /// Feed symbols one per edge, then drain `drain_cycles` edges.
    ///
    /// Decisions are captured only on cycles where output-valid is asserted,
    /// both while driving and while draining.
    pub fn decode_stream(&mut self, symbols: &[CodedPair], drain_cycles: usize) -> Result<Vec<bool>> {
        self.ensure_ready()?;
        self.phase = DriverPhase::Driving;

        let mut decided = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            self.device.drive_decoder(true, symbol.pack());
            self.tick();
            self.device.drive_decoder(false, 0);
            decided.extend(self.device.decoder_output());
        }

        self.phase = DriverPhase::Draining;
        for _ in 0..drain_cycles {
            self.tick();
            decided.extend(self.device.decoder_output());
        }

        self.phase = DriverPhase::Idle;
        Ok(decided)
    }

    /// One full trial: reset, encode payload plus `tail_len` zeros, pass the
    /// interpreted pairs through `channel`, decode with a 2 x tail drain.
    ///
    /// Returns all captured decisions; the payload estimate is the trailing
    /// `payload.len()` of them.
    pub fn run_chain<R: Rng + ?Sized>(
        &mut self,
        payload: &[bool],
        tail_len: usize,
        mapping: WireMapping,
        channel: &Channel,
        rng: &mut R,
    ) -> Result<Vec<bool>> {
        self.reset();
        let coded = self.encode_stream(&append_zeros(payload, tail_len), mapping)?;
        let received = channel.apply(&coded, rng)?;
        let decided = self.decode_stream(&received, 2 * tail_len)?;
        debug!(
            "Device trial: {} symbols in, {} decisions out, {} cycles total",
            received.len(),
            decided.len(),
            self.cycles
        );
        Ok(decided)
    }

    /// [`run_chain`](Self::run_chain) followed by trailing-payload extraction.
    /// A short capture is [`SimError::InsufficientDecodedBits`].
    pub fn run_trial<R: Rng + ?Sized>(
        &mut self,
        payload: &[bool],
        tail_len: usize,
        mapping: WireMapping,
        channel: &Channel,
        rng: &mut R,
    ) -> Result<Vec<bool>> {
        let decided = self.run_chain(payload, tail_len, mapping, channel, rng)?;
        Ok(recover_trailing(&decided, payload.len())?.to_vec())
    }
}

/// Software model of a bit-exact external encoder/decoder chain.
///
/// The encoder can be wired with its outputs swapped and can delay its
/// output-valid; the decoder is a [`StreamingViterbi`] whose decisions can be
/// delayed by extra pipeline registers. Outputs stay valid for one cycle.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    encoder: ConvolutionalEncoder,
    decoder: StreamingViterbi,
    swap_wires: bool,
    encoder_latency: usize,
    decoder_latency: usize,
    in_reset: bool,
    encoder_in: Option<bool>,
    decoder_in: Option<u8>,
    encoder_pipe: VecDeque<Option<(bool, bool)>>,
    decoder_pipe: VecDeque<Option<bool>>,
    encoder_out: Option<(bool, bool)>,
    decoder_out: Option<bool>,
}

impl SimulatedDevice {
    pub fn new(trellis: Arc<TrellisModel>, traceback_depth: usize) -> Self {
        Self {
            encoder: ConvolutionalEncoder::new(trellis.clone()),
            decoder: StreamingViterbi::new(trellis, traceback_depth),
            swap_wires: false,
            encoder_latency: 0,
            decoder_latency: 0,
            in_reset: true,
            encoder_in: None,
            decoder_in: None,
            encoder_pipe: VecDeque::new(),
            decoder_pipe: VecDeque::new(),
            encoder_out: None,
            decoder_out: None,
        }
    }

    /// Put v0 on pin y0 and v1 on pin y1
    pub fn with_swapped_wires(mut self, swapped: bool) -> Self {
        self.swap_wires = swapped;
        self
    }

    pub fn with_encoder_latency(mut self, cycles: usize) -> Self {
        self.encoder_latency = cycles;
        self
    }

    pub fn with_decoder_latency(mut self, cycles: usize) -> Self {
        self.decoder_latency = cycles;
        self
    }

    pub fn traceback_depth(&self) -> usize {
        self.decoder.depth()
    }

    fn clear(&mut self) {
        self.encoder.reset();
        self.decoder.reset();
        self.encoder_pipe.clear();
        self.decoder_pipe.clear();
        self.encoder_out = None;
        self.decoder_out = None;
    }
}

/// Shift `value` into a `latency`-stage register line, returning what falls out
fn delay_line<T>(line: &mut VecDeque<Option<T>>, latency: usize, value: Option<T>) -> Option<T> {
    if latency == 0 {
        return value;
    }
    line.push_back(value);
    if line.len() > latency {
        line.pop_front().flatten()
    } else {
        None
    }
}

impl ClockedDevice for SimulatedDevice {
    fn set_reset(&mut self, asserted: bool) {
        self.in_reset = asserted;
    }

    fn drive_encoder(&mut self, valid: bool, bit: bool) {
        self.encoder_in = valid.then_some(bit);
    }

    fn drive_decoder(&mut self, valid: bool, symbol: u8) {
        self.decoder_in = valid.then_some(symbol);
    }

    fn rising_edge(&mut self) {
        if self.in_reset {
            self.clear();
            return;
        }

        let encoded = self.encoder_in.map(|bit| {
            let pair = self.encoder.encode_bit(bit);
            if self.swap_wires {
                (pair.v0, pair.v1)
            } else {
                (pair.v1, pair.v0)
            }
        });
        self.encoder_out = delay_line(&mut self.encoder_pipe, self.encoder_latency, encoded);

        let decided = self
            .decoder_in
            .and_then(|symbol| self.decoder.push(CodedPair::unpack(symbol)));
        self.decoder_out = delay_line(&mut self.decoder_pipe, self.decoder_latency, decided);
    }

    fn encoder_output(&self) -> Option<(bool, bool)> {
        self.encoder_out
    }

    fn decoder_output(&self) -> Option<bool> {
        self.decoder_out
    }
}
