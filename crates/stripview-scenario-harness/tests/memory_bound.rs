//! Peak working set during strip ingestion does not grow with the image.

use stripview_core::{OverlayPhase, StripAssembler, PANEL_HEIGHT, PANEL_WIDTH};
use stripview_scenario_harness::fixtures::{self, STRIP_HEIGHT};
use stripview_prep::encode_strips;
use stripview_scenario_harness::ScenarioHarness;

/// Keeps the noisiest strip well under the per-strip ceiling
const NOISE_QUALITY: u8 = 75;

#[test]
fn peak_minus_largest_strip_is_constant() {
    let harness = ScenarioHarness::new();
    let mut overheads = Vec::new();
    let mut largest = Vec::new();

    for (seed, amplitude) in [(1, 0u8), (2, 16), (3, 48), (4, 96)] {
        let img = fixtures::noise(
            u32::from(PANEL_WIDTH),
            u32::from(PANEL_HEIGHT),
            amplitude,
            seed,
        );
        let strips = encode_strips(&img, STRIP_HEIGHT, NOISE_QUALITY).unwrap();
        let max_strip = strips.iter().map(Vec::len).max().unwrap_or(0);

        assert_eq!(harness.working_set().current(), 0);
        harness.working_set().reset_peak();
        for reply in harness.upload_strips(&strips, Some("0")) {
            assert_eq!(reply.status, 200, "{}", reply.body_str());
        }
        assert_eq!(harness.phase(), OverlayPhase::Displaying);

        overheads.push(harness.working_set().peak() - max_strip);
        largest.push(max_strip);
    }

    assert!(
        largest.windows(2).all(|w| w[0] < w[1]),
        "fixtures should grow: {:?}",
        largest
    );
    assert!(
        overheads.iter().all(|&o| o == overheads[0]),
        "overhead varies with image size: {:?}",
        overheads
    );
    assert_eq!(overheads[0], StripAssembler::work_area_bytes());
}

#[test]
fn strip_buffers_are_released_between_requests() {
    let harness = ScenarioHarness::new();
    let img = fixtures::gradient(u32::from(PANEL_WIDTH), u32::from(PANEL_HEIGHT));
    let strips = fixtures::strips(&img, STRIP_HEIGHT);

    assert_eq!(harness.post_strip(0, "total=7", &strips[0]).status, 200);
    assert_eq!(
        harness.working_set().current(),
        StripAssembler::work_area_bytes()
    );
    assert_eq!(harness.post_strip(1, "", &strips[1]).status, 200);
    assert_eq!(
        harness.working_set().current(),
        StripAssembler::work_area_bytes()
    );
}

#[test]
fn strip_that_does_not_fit_the_heap_is_507() {
    let harness = ScenarioHarness::new();
    let img = fixtures::gradient(u32::from(PANEL_WIDTH), u32::from(PANEL_HEIGHT));
    let strips = fixtures::strips(&img, STRIP_HEIGHT);

    harness.set_free_heap(strips[0].len() + 1000);
    let reply = harness.post_strip(0, "total=7", &strips[0]);
    assert_eq!(reply.status, 507, "{}", reply.body_str());
    assert!(reply.body_str().contains("insufficient memory"));
    assert_eq!(harness.phase(), OverlayPhase::Idle);
    assert_eq!(harness.working_set().allocations(), 0);
}
