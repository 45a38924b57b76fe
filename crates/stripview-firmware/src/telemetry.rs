//! Telemetry sampler thread
//!
//! Samples device health once per period and publishes it to the render
//! loop over a bounded channel. It never touches the image service, so a
//! long upload cannot stall sampling.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

use stripview_core::{Reading, TelemetrySnapshot};

use crate::runtime_diagnostics::{min_free_heap, uptime_ms};
use crate::wifi_manager::station_rssi;

const SNAPSHOT_QUEUE_DEPTH: usize = 2;

pub struct TelemetrySampler {
    rx: Receiver<TelemetrySnapshot>,
}

impl TelemetrySampler {
    pub fn spawn(period: Duration) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel(SNAPSHOT_QUEUE_DEPTH);
        thread::Builder::new()
            .name("telemetry".into())
            .spawn(move || run(tx, period))?;
        log::info!("[TELEMETRY] sampler started, period {:?}", period);
        Ok(Self { rx })
    }

    /// Newest snapshot published since the last call
    pub fn latest(&self) -> Option<TelemetrySnapshot> {
        self.rx.try_iter().last()
    }
}

fn run(tx: SyncSender<TelemetrySnapshot>, period: Duration) {
    let mut sequence = 0u32;
    loop {
        sequence = sequence.wrapping_add(1);
        match tx.try_send(sample(sequence)) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("[TELEMETRY] render loop gone, sampler exiting");
                return;
            }
        }
        thread::sleep(period);
    }
}

fn sample(sequence: u32) -> TelemetrySnapshot {
    let free = unsafe { esp_idf_svc::sys::esp_get_free_heap_size() };
    let mut readings = vec![
        Reading {
            label: "Uptime",
            value: (uptime_ms() / 1_000).min(i32::MAX as u64) as i32,
            unit: "s",
        },
        Reading {
            label: "Free heap",
            value: (free / 1024) as i32,
            unit: "KiB",
        },
        Reading {
            label: "Min free",
            value: (min_free_heap() / 1024) as i32,
            unit: "KiB",
        },
    ];
    if let Some(rssi) = station_rssi() {
        readings.push(Reading {
            label: "RSSI",
            value: i32::from(rssi),
            unit: "dBm",
        });
    }
    TelemetrySnapshot { sequence, readings }
}
