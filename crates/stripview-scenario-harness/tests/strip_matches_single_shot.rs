use stripview_core::{OverlayPhase, TickEvent, PANEL_HEIGHT, PANEL_WIDTH};
use stripview_scenario_harness::fixtures::{self, STRIP_HEIGHT};
use stripview_scenario_harness::ScenarioHarness;

fn panel_gradient() -> image::RgbImage {
    fixtures::gradient(u32::from(PANEL_WIDTH), u32::from(PANEL_HEIGHT))
}

fn single_shot_frame(img: &image::RgbImage) -> Vec<u16> {
    let harness = ScenarioHarness::new();
    let reply = harness.post_image(Some("0"), &fixtures::jpeg(img));
    assert_eq!(reply.status, 200, "{}", reply.body_str());
    assert_eq!(harness.run_decode(), Some(TickEvent::Displayed));
    harness.frame()
}

#[test]
fn strips_in_order_match_single_shot_decode() {
    let img = panel_gradient();
    let expected = single_shot_frame(&img);

    let strips = fixtures::strips(&img, STRIP_HEIGHT);
    assert_eq!(strips.len(), 7);

    let harness = ScenarioHarness::new();
    for (i, reply) in harness.upload_strips(&strips, Some("0")).iter().enumerate() {
        assert_eq!(reply.status, 200, "strip {}: {}", i, reply.body_str());
        assert_eq!(reply.body_str(), r#"{"success":true}"#);
    }
    assert_eq!(harness.phase(), OverlayPhase::Displaying);
    assert!(!harness.has_session());

    let got = harness.frame();
    let mismatch = got.iter().zip(&expected).position(|(a, b)| a != b);
    assert_eq!(
        mismatch.map(|i| (i % 240, i / 240)),
        None,
        "first differing pixel (x, y)"
    );

    let status = harness.status();
    assert_eq!(status["phase"], "displaying");
    assert_eq!(status["rows_written"], 280);
    assert_eq!(status["image_height"], 280);
}

#[test]
fn skipped_strip_aborts_and_leaves_no_partial_image() {
    let img = panel_gradient();
    let strips = fixtures::strips(&img, STRIP_HEIGHT);

    let mut harness = ScenarioHarness::new();
    assert_eq!(harness.post_strip(0, "total=7", &strips[0]).status, 200);
    assert_eq!(harness.post_strip(1, "", &strips[1]).status, 200);
    assert_ne!(harness.pixel(0, 40), Some(0));

    let reply = harness.post_strip(3, "", &strips[3]);
    assert_eq!(reply.status, 409);
    assert!(reply.body_str().contains("expected 2"), "{}", reply.body_str());
    assert_eq!(harness.phase(), OverlayPhase::Idle);
    assert!(!harness.has_session());
    assert_eq!(harness.working_set().current(), 0);

    // the abandoned strip sequence cannot be resumed
    assert_eq!(harness.post_strip(2, "", &strips[2]).status, 409);

    // the background takes the panel back and repaints all of it
    assert!(harness.render_background());
    assert_eq!(harness.pixel(0, 40), Some(0));
    assert_eq!(harness.pixel(239, 279), Some(0));
}

#[test]
fn strip_wider_than_announced_is_rejected() {
    let strips = fixtures::strips(&panel_gradient(), STRIP_HEIGHT);
    let harness = ScenarioHarness::new();
    let reply = harness.post_strip(0, "width=200&height=280", &strips[0]);
    assert_eq!(reply.status, 400, "{}", reply.body_str());
    assert_eq!(harness.phase(), OverlayPhase::Idle);
}

#[test]
fn maybe_capture_screenshot() {
    if std::env::var("SCENARIO_CAPTURE").is_err() {
        return;
    }
    let harness = ScenarioHarness::new();
    let strips = fixtures::strips(&panel_gradient(), STRIP_HEIGHT);
    harness.upload_strips(&strips, None);
    let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("target/scenario-snapshots/gradient_strips.png");
    harness
        .save_screenshot_png(&path)
        .expect("screenshot capture should succeed");
}
