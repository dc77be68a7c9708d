use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use rand::SeedableRng;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use viterbisim_core::{
    crossover_point, make_signal_illustration, run_device_session, run_software_sweep,
    run_software_sweep_parallel, CalibrationReport, CodeConfig, DeviceConfig, SeedStrategy,
    SimError, SimRng, SimulatedDevice, StreamDriver, SweepConfig, SweepPoints, SweepRow,
};

#[derive(Parser)]
#[command(name = "viterbisim")]
#[command(about = "Rate-1/2 convolutional code BER simulator with hard-decision Viterbi decoding")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// BER sweep over an AWGN channel with rectangular pulse shaping
    Awgn {
        #[command(flatten)]
        sweep: SweepArgs,

        /// Eb/N0 values in dB, comma separated (default: 0..=7)
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        ebn0: Option<Vec<f64>>,

        /// Run trials on all cores (implies per-trial seeds)
        #[arg(long)]
        parallel: bool,
    },

    /// BER sweep over a channel that flips coded bits directly
    Bitflip {
        #[command(flatten)]
        sweep: SweepArgs,

        /// Flip probabilities, comma separated (default: 0,0.02,0.05,0.1)
        #[arg(short, long, value_delimiter = ',')]
        probabilities: Option<Vec<f64>>,

        /// Run trials on all cores (implies per-trial seeds)
        #[arg(long)]
        parallel: bool,
    },

    /// Calibrate and sweep a clocked encoder/decoder chain (simulated)
    Device {
        #[command(flatten)]
        sweep: SweepArgs,

        /// Flip probabilities, comma separated
        #[arg(short, long, value_delimiter = ',', conflicts_with = "ebn0")]
        probabilities: Option<Vec<f64>>,

        /// Sweep Eb/N0 instead of flip probability
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        ebn0: Option<Vec<f64>>,

        /// Put v0 on pin y0 and v1 on pin y1
        #[arg(long)]
        swap_wires: bool,

        /// Cycles before encoder output-valid is asserted
        #[arg(long, default_value = "0")]
        encoder_latency: usize,

        /// Extra decoder pipeline cycles after traceback
        #[arg(long, default_value = "0")]
        decoder_latency: usize,

        /// Cycles polled for encoder output-valid before failing
        #[arg(long, default_value_t = viterbisim_core::ENCODER_TIMEOUT_CYCLES)]
        timeout_cycles: usize,
    },

    /// Dump one noisy coded waveform, its matched-filter output and eye traces
    Illustrate {
        #[command(flatten)]
        code: CodeArgs,

        /// Eb/N0 in dB
        #[arg(long, default_value = "3.0", allow_negative_numbers = true)]
        ebn0: f64,

        /// Samples per coded bit
        #[arg(long, default_value_t = viterbisim_core::DEFAULT_SAMPLES_PER_SYMBOL)]
        sps: usize,

        #[arg(long, default_value_t = viterbisim_core::DEFAULT_SEED)]
        seed: u64,

        /// Write the illustration as JSON
        #[arg(long, value_name = "OUT.JSON")]
        json: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CodeArgs {
    /// Constraint length K
    #[arg(short = 'k', long)]
    constraint_length: Option<u32>,

    /// First generator, octal (e.g. 7)
    #[arg(long, value_parser = parse_octal)]
    g1: Option<u32>,

    /// Second generator, octal (e.g. 5)
    #[arg(long, value_parser = parse_octal)]
    g2: Option<u32>,
}

/// Options shared by every sweep. Flags override values from `--config`.
#[derive(Args)]
struct SweepArgs {
    /// Sweep configuration JSON file
    #[arg(short, long, value_name = "FILE.JSON")]
    config: Option<PathBuf>,

    #[command(flatten)]
    code: CodeArgs,

    /// Trials per sweep point
    #[arg(short, long)]
    trials: Option<usize>,

    /// Payload bits per trial
    #[arg(long)]
    payload_len: Option<usize>,

    /// Zero tail bits; also the traceback depth of the device decoder
    #[arg(long)]
    tail_len: Option<usize>,

    /// Samples per coded bit on the AWGN channel
    #[arg(long)]
    sps: Option<usize>,

    #[arg(short, long)]
    seed: Option<u64>,

    /// Seed each trial independently from the base seed
    #[arg(long)]
    per_trial_seeds: bool,

    /// Write configuration and rows as JSON
    #[arg(long, value_name = "OUT.JSON")]
    json: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Sim(#[from] SimError),
}

#[derive(Serialize)]
struct RunReport<'a> {
    config: &'a SweepConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration: Option<&'a CalibrationReport>,
    rows: &'a [SweepRow],
    #[serde(skip_serializing_if = "Option::is_none")]
    crossover_ebn0_db: Option<f64>,
}

fn parse_octal(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal generator '{}': {}", s, e))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Awgn { sweep, ebn0, parallel } => {
            let points = ebn0.map(SweepPoints::EbN0Db);
            let config = build_config(&sweep, points, SweepPoints::default_ebn0(), parallel)?;
            software_command(&config, parallel, sweep.json.as_deref())?
        }
        Commands::Bitflip { sweep, probabilities, parallel } => {
            let points = probabilities.map(SweepPoints::FlipProbability);
            let config = build_config(&sweep, points, SweepPoints::default_flip(), parallel)?;
            software_command(&config, parallel, sweep.json.as_deref())?
        }
        Commands::Device {
            sweep,
            probabilities,
            ebn0,
            swap_wires,
            encoder_latency,
            decoder_latency,
            timeout_cycles,
        } => {
            let points = match (ebn0, probabilities) {
                (Some(values), _) => Some(SweepPoints::EbN0Db(values)),
                (None, Some(values)) => Some(SweepPoints::FlipProbability(values)),
                (None, None) => None,
            };
            let config = build_config(&sweep, points, SweepPoints::default_flip(), false)?;
            let device_config = DeviceConfig {
                timeout_cycles,
                ..DeviceConfig::default()
            };
            let trellis = Arc::new(config.code.build_trellis()?);
            let device = SimulatedDevice::new(trellis, config.tail_len)
                .with_swapped_wires(swap_wires)
                .with_encoder_latency(encoder_latency)
                .with_decoder_latency(decoder_latency);
            device_command(&config, device, device_config, sweep.json.as_deref())?
        }
        Commands::Illustrate { code, ebn0, sps, seed, json } => {
            illustrate_command(&code, ebn0, sps, seed, json.as_deref())?
        }
    }

    Ok(())
}

fn apply_code_args(code: &mut CodeConfig, args: &CodeArgs) {
    if let Some(k) = args.constraint_length {
        code.constraint_length = k;
    }
    if let Some(g1) = args.g1 {
        code.g1 = g1;
    }
    if let Some(g2) = args.g2 {
        code.g2 = g2;
    }
}

/// Config file (or defaults), then flag overrides. A file sweep list of the
/// wrong channel kind is replaced by `default_points`.
fn build_config(
    args: &SweepArgs,
    points: Option<SweepPoints>,
    default_points: SweepPoints,
    parallel: bool,
) -> Result<SweepConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SweepConfig::default(),
    };

    config.points = match points {
        Some(points) => points,
        None if config.points.is_ebn0() == default_points.is_ebn0() && args.config.is_some() => {
            config.points
        }
        None => default_points,
    };
    apply_code_args(&mut config.code, &args.code);
    if let Some(trials) = args.trials {
        config.trials = trials;
    }
    if let Some(payload_len) = args.payload_len {
        config.payload_len = payload_len;
    }
    if let Some(tail_len) = args.tail_len {
        config.tail_len = tail_len;
    }
    if let Some(sps) = args.sps {
        config.samples_per_symbol = sps;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.per_trial_seeds || parallel {
        config.seed_strategy = SeedStrategy::PerTrial;
    }

    config.validate()?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<SweepConfig, CliError> {
    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_json::from_reader(file).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let file = File::create(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn print_rows(config: &SweepConfig, rows: &[SweepRow]) {
    println!(
        "K={} g=({:o},{:o}) trials={} payload={} tail={} seed={}",
        config.code.constraint_length,
        config.code.g1,
        config.code.g2,
        config.trials,
        config.payload_len,
        config.tail_len,
        config.seed
    );
    let label = if config.points.is_ebn0() { "Eb/N0 dB" } else { "p_flip" };
    println!(
        "{:>10} {:>10} {:>10} {:>12} {:>12}",
        label, "errors", "bits", "BER", "uncoded BER"
    );
    for row in rows {
        let uncoded = row
            .uncoded
            .map(|u| format!("{:.4e}", u.ber))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>10.3} {:>10} {:>10} {:>12.4e} {:>12}",
            row.parameter, row.errors, row.total_bits, row.ber, uncoded
        );
    }
}

fn report_crossover(config: &SweepConfig, rows: &[SweepRow]) -> Option<f64> {
    if !config.points.is_ebn0() {
        return None;
    }
    let crossover = crossover_point(rows);
    match crossover {
        Some(ebn0) => println!("Coded BER at or below uncoded from {:.2} dB", ebn0),
        None => warn!("Coded BER never stays at or below uncoded over this sweep"),
    }
    crossover
}

fn software_command(
    config: &SweepConfig,
    parallel: bool,
    json: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows = if parallel {
        info!("Running {} points in parallel", config.points.len());
        run_software_sweep_parallel(config)?
    } else {
        run_software_sweep(config)?
    };

    print_rows(config, &rows);
    let crossover_ebn0_db = report_crossover(config, &rows);

    if let Some(path) = json {
        let report = RunReport {
            config,
            calibration: None,
            rows: &rows,
            crossover_ebn0_db,
        };
        write_json(path, &report)?;
    }
    Ok(())
}

fn device_command(
    config: &SweepConfig,
    device: SimulatedDevice,
    device_config: DeviceConfig,
    json: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = StreamDriver::new(device, device_config)?;
    let session = run_device_session(&mut driver, config)?;

    let calibration = &session.calibration;
    println!(
        "Calibration: {} (errors y0_is_v1={}, y1_is_v1={}){}",
        calibration.mapping,
        calibration.errors[0],
        calibration.errors[1],
        if calibration.reliable { "" } else { " UNRELIABLE" }
    );
    print_rows(config, &session.rows);
    let crossover_ebn0_db = report_crossover(config, &session.rows);
    println!("Clock edges issued: {}", driver.cycles());

    if let Some(path) = json {
        let report = RunReport {
            config,
            calibration: Some(calibration),
            rows: &session.rows,
            crossover_ebn0_db,
        };
        write_json(path, &report)?;
    }
    Ok(())
}

fn illustrate_command(
    code_args: &CodeArgs,
    ebn0: f64,
    sps: usize,
    seed: u64,
    json: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut code = CodeConfig::default();
    apply_code_args(&mut code, code_args);
    let trellis = Arc::new(code.build_trellis()?);
    let mut rng = SimRng::seed_from_u64(seed);
    let illustration = make_signal_illustration(trellis, ebn0, sps, &mut rng)?;

    println!(
        "Eb/N0 {:.2} dB, {} samples, {} symbol centers, {} eye traces",
        ebn0,
        illustration.tx.len(),
        illustration.centers.len(),
        illustration.eye.len()
    );
    if let Some(path) = json {
        write_json(path, &illustration)?;
    }
    Ok(())
}
