use stripview_core::{Reading, TelemetrySnapshot, PANEL_HEIGHT, PANEL_WIDTH};
use stripview_scenario_harness::fixtures::{self, STRIP_HEIGHT};
use stripview_scenario_harness::ScenarioHarness;

fn snapshot(sequence: u32, heap_kib: i32) -> TelemetrySnapshot {
    TelemetrySnapshot {
        sequence,
        readings: vec![
            Reading {
                label: "Uptime",
                value: sequence as i32,
                unit: "s",
            },
            Reading {
                label: "Free heap",
                value: heap_kib,
                unit: "KiB",
            },
        ],
    }
}

#[test]
fn overlay_suspends_background_until_released() {
    let mut harness = ScenarioHarness::new();
    harness.publish_telemetry(snapshot(1, 180));
    assert!(harness.render_background());
    assert!(!harness.render_background());

    let strips = fixtures::strips(
        &fixtures::gradient(u32::from(PANEL_WIDTH), u32::from(PANEL_HEIGHT)),
        STRIP_HEIGHT,
    );
    harness.upload_strips(&strips, Some("0"));
    let shown = harness.frame();

    harness.publish_telemetry(snapshot(2, 150));
    assert!(!harness.render_background());
    assert_eq!(harness.frame(), shown);

    harness.delete();
    assert!(harness.render_background());
    assert_eq!(harness.pixel(120, 279), Some(0));
}

#[test]
fn background_screenshot() {
    if std::env::var("SCENARIO_CAPTURE").is_err() {
        return;
    }
    let mut harness = ScenarioHarness::new();
    harness.publish_telemetry(snapshot(42, 163));
    harness.render_background();
    let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("target/scenario-snapshots/background.png");
    harness
        .save_screenshot_png(&path)
        .expect("screenshot capture should succeed");
}
