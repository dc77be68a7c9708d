use std::sync::Arc;
use viterbisim_core::{
    crossover_point, run_device_session, run_software_sweep, run_software_sweep_parallel,
    ChannelKind, ConvolutionalEncoder, DeviceConfig, SeedStrategy, SimError, SimulatedDevice,
    StreamDriver, SweepConfig, SweepPoints, TrellisModel, ViterbiDecoder, WireMapping,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn bits(v: &[u8]) -> Vec<bool> {
    v.iter().map(|&b| b == 1).collect()
}

fn simulated_driver(config: &SweepConfig, swapped: bool) -> StreamDriver<SimulatedDevice> {
    let trellis = Arc::new(config.code.build_trellis().expect("Failed to build trellis"));
    let device = SimulatedDevice::new(trellis, config.tail_len).with_swapped_wires(swapped);
    StreamDriver::new(device, DeviceConfig::default()).expect("Failed to create driver")
}

#[test]
fn test_readme_example_single_flip() {
    let trellis = Arc::new(TrellisModel::new(3, 0b111, 0b101).expect("Failed to build trellis"));
    let payload = bits(&[1, 1, 0, 1, 1]);

    let mut encoder = ConvolutionalEncoder::new(trellis.clone());
    let mut coded = encoder.encode_sequence(&[payload.clone(), vec![false; 5]].concat());
    coded[3].v1 = !coded[3].v1;

    let decoded = ViterbiDecoder::new(trellis).decode(&coded);
    assert_eq!(decoded.len(), 10);
    assert_eq!(&decoded[..5], &payload[..]);
    assert!(decoded[5..].iter().all(|&b| !b));
}

#[test]
fn test_sweep_is_deterministic() {
    init_logger();
    let mut config = SweepConfig::awgn(vec![0.0, 3.0, 6.0]);
    config.trials = 5;
    config.payload_len = 100;

    let first = run_software_sweep(&config).expect("First sweep failed");
    let second = run_software_sweep(&config).expect("Second sweep failed");
    assert_eq!(first, second);

    let first_json = serde_json::to_string(&first).expect("Failed to serialize");
    let second_json = serde_json::to_string(&second).expect("Failed to serialize");
    assert_eq!(first_json, second_json, "Output must be byte-identical");
}

#[test]
fn test_different_seeds_differ() {
    let mut config = SweepConfig::bit_flip(vec![0.1]);
    config.trials = 5;
    let a = run_software_sweep(&config).expect("Sweep failed");
    config.seed += 1;
    let b = run_software_sweep(&config).expect("Sweep failed");
    assert_ne!(a[0].errors, 0);
    assert_ne!(a, b);
}

#[test]
fn test_noiseless_flip_channel_recovers_everything() {
    let config = SweepConfig::bit_flip(vec![0.0]);
    let rows = run_software_sweep(&config).expect("Sweep failed");
    assert_eq!(rows[0].errors, 0);
    assert_eq!(rows[0].total_bits, 20 * 200);
    assert_eq!(rows[0].channel, ChannelKind::BitFlip);
}

#[test]
fn test_flip_sweep_ber_increases() {
    let mut config = SweepConfig::bit_flip(vec![0.0, 0.02, 0.05, 0.1]);
    config.trials = 30;
    let rows = run_software_sweep(&config).expect("Sweep failed");
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].ber, 0.0);
    assert!(rows[1].ber < rows[3].ber);
    assert!(rows[3].ber < 0.5);
}

#[test]
fn test_coded_beats_uncoded_above_crossover() {
    init_logger();
    let mut config = SweepConfig::awgn(vec![4.0, 5.0, 6.0, 7.0]);
    config.samples_per_symbol = 1;
    config.trials = 50;

    let rows = run_software_sweep(&config).expect("Sweep failed");
    for row in &rows {
        let uncoded = row.uncoded.expect("AWGN rows carry an uncoded reference");
        assert_eq!(uncoded.total_bits, row.total_bits);
        assert!(
            row.ber <= uncoded.ber,
            "Coded BER {} above uncoded {} at {} dB",
            row.ber,
            uncoded.ber,
            row.parameter
        );
    }
    assert_eq!(crossover_point(&rows), Some(4.0));
}

#[test]
fn test_parallel_sweep_matches_sequential() {
    let mut config = SweepConfig::awgn(vec![1.0, 3.0, 5.0]);
    config.trials = 12;
    config.payload_len = 64;
    config.seed_strategy = SeedStrategy::PerTrial;

    let sequential = run_software_sweep(&config).expect("Sequential sweep failed");
    let parallel = run_software_sweep_parallel(&config).expect("Parallel sweep failed");
    assert_eq!(sequential, parallel);
}

#[test]
fn test_larger_code_round_trips_through_sweep() {
    let json = r#"{
        "code": { "constraint_length": 7, "g1": 91, "g2": 121 },
        "points": { "kind": "flip_probability", "values": [0.0, 0.01] },
        "trials": 4,
        "payload_len": 128,
        "tail_len": 12
    }"#;
    let config: SweepConfig = serde_json::from_str(json).expect("Failed to parse config");
    let rows = run_software_sweep(&config).expect("Sweep failed");
    assert_eq!(rows[0].errors, 0);
    assert_eq!(rows[1].code.constraint_length, 7);
}

#[test]
fn test_device_session_calibrates_swapped_wires() {
    init_logger();
    let mut config = SweepConfig::bit_flip(vec![0.0, 0.02]);
    config.trials = 5;
    config.payload_len = 100;

    let mut driver = simulated_driver(&config, true);
    let session = run_device_session(&mut driver, &config).expect("Device session failed");

    assert_eq!(session.calibration.mapping, WireMapping::Y1IsV1);
    assert!(session.calibration.reliable);
    assert_eq!(session.rows.len(), 2);
    assert_eq!(session.rows[0].errors, 0);
    assert!(session.rows[1].ber < 0.05);
    for row in &session.rows {
        assert_eq!(row.mapping, Some(WireMapping::Y1IsV1));
        assert_eq!(row.clock_period_ns, Some(10));
    }
}

#[test]
fn test_device_session_over_awgn() {
    let mut config = SweepConfig::awgn(vec![8.0]);
    config.trials = 3;
    config.payload_len = 80;

    let mut driver = simulated_driver(&config, false);
    let session = run_device_session(&mut driver, &config).expect("Device session failed");
    assert_eq!(session.calibration.mapping, WireMapping::Y0IsV1);
    assert_eq!(session.rows[0].errors, 0);
    assert!(session.rows[0].uncoded.is_some());
}

#[test]
fn test_device_timeout_aborts_session() {
    let config = SweepConfig::bit_flip(vec![0.0]);
    let trellis = Arc::new(config.code.build_trellis().expect("Failed to build trellis"));
    let device = SimulatedDevice::new(trellis, config.tail_len).with_encoder_latency(64);
    let mut driver = StreamDriver::new(device, DeviceConfig::default()).expect("Failed to create driver");

    let result = run_device_session(&mut driver, &config);
    assert!(matches!(result, Err(SimError::Timeout { .. })));
}

#[test]
fn test_invalid_configurations_rejected() {
    let mut config = SweepConfig::default();
    config.code.constraint_length = 1;
    assert!(matches!(run_software_sweep(&config), Err(SimError::InvalidConfig(_))));

    let mut config = SweepConfig::default();
    config.code.g2 = 0;
    assert!(matches!(run_software_sweep(&config), Err(SimError::InvalidConfig(_))));

    let config = SweepConfig {
        points: SweepPoints::FlipProbability(vec![-0.01]),
        ..SweepConfig::default()
    };
    assert!(matches!(run_software_sweep(&config), Err(SimError::InvalidConfig(_))));

    let config = DeviceConfig {
        timeout_cycles: 0,
        ..DeviceConfig::default()
    };
    let trellis = Arc::new(TrellisModel::new(3, 0b111, 0b101).expect("Failed to build trellis"));
    assert!(StreamDriver::new(SimulatedDevice::new(trellis, 12), config).is_err());
}
