//! Reference scenarios at reduced resolution, run via cargo test.

use crate::{
    validate_final_time, validate_frame_order, validate_log_order, ExpectedResult,
    FinalTimeCheck, FrameCountCheck, InitialAreaCheck, ReferenceTest,
};
use orchestrator::config::{FrameSettings, SimulationConfig};
use orchestrator::output::frame_file_name;

/// Coarser grid and small frames; physics and schedule unchanged
fn reduced_config() -> SimulationConfig {
    SimulationConfig {
        base_resolution: 32,
        max_level: 7,
        frame: FrameSettings {
            width: 64,
            height: 64,
            ..FrameSettings::default()
        },
        ..SimulationConfig::default()
    }
}

/// Full impact duration: 0.03 s with a frame every 1e-4 s
fn reduced_impact_test() -> ReferenceTest {
    let config = reduced_config();
    ReferenceTest {
        name: "Droplet Impact (reduced)".to_string(),
        expected: ExpectedResult {
            frame_count: Some(FrameCountCheck { min_frames: 300 }),
            final_time: Some(FinalTimeCheck {
                min_time: config.end_time,
            }),
            log_order: true,
            frame_order: true,
            initial_area: Some(InitialAreaCheck { tolerance: 0.02 }),
        },
        config,
    }
}

#[test]
fn test_reduced_droplet_impact() {
    let test = reduced_impact_test();
    let result = test.run().expect("Test should run successfully");
    result.print_summary();
    assert!(result.passed, "Droplet impact test failed");
    assert_eq!(result.summary.frames_failed, 0);
}

#[test]
fn test_short_run_orders_frames() {
    let test = ReferenceTest {
        name: "Short Impact".to_string(),
        config: SimulationConfig {
            end_time: 1e-3,
            ..reduced_config()
        },
        expected: ExpectedResult {
            frame_count: Some(FrameCountCheck { min_frames: 11 }),
            final_time: Some(FinalTimeCheck { min_time: 1e-3 }),
            log_order: true,
            frame_order: true,
            ..ExpectedResult::default()
        },
    };
    let result = test.run().expect("Test should run successfully");
    result.print_summary();
    assert!(result.passed, "Short impact test failed");
}

#[test]
fn test_log_checks_detect_disorder() {
    assert!(validate_log_order("0 0\n1 0.0001\n2 0.0002\n").passed);
    assert!(!validate_log_order("0 0\n2 0.0001\n1 0.0002\n").passed);
    assert!(!validate_log_order("0 0\n1 0.0002\n2 0.0001\n").passed);
    assert!(!validate_log_order("0 0\ngarbage\n").passed);

    let check = FinalTimeCheck { min_time: 0.03 };
    assert!(validate_final_time("0 0\n300 0.03\n", &check).passed);
    assert!(!validate_final_time("0 0\n299 0.0299\n", &check).passed);
    assert!(!validate_final_time("", &check).passed);
}

#[test]
fn test_frame_order_check() {
    let frames: Vec<String> = [(0, 0.0), (9, 0.0009), (10, 0.001), (1000, 0.1)]
        .iter()
        .rev()
        .map(|&(i, t)| frame_file_name(i, t))
        .collect();
    assert!(validate_frame_order(&frames).passed);

    let unpadded = vec!["9_t=0.png".to_string(), "10_t=1.png".to_string()];
    assert!(!validate_frame_order(&unpadded).passed);
}
