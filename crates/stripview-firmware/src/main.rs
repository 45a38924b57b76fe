mod image_api;
mod runtime_diagnostics;
mod telemetry;
mod wifi_manager;

use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::{
    delay::FreeRtos,
    gpio::{AnyIOPin, PinDriver},
    peripherals::Peripherals,
    spi::{config::Config, SpiDeviceDriver, SpiDriver, SpiDriverConfig},
    units::Hertz,
};
use st7789::{Builder, ColorOrder, Dimensions, Display, Interface, Offset};
use stripview_core::{
    BackgroundScreen, ImageApiConfig, ImageService, MonotonicClock, OverlayPhase, PanelCanvas,
    PixelOrder, TickEvent, PANEL_HEIGHT, PANEL_WIDTH,
};

use image_api::ImageApiServer;
use runtime_diagnostics::{log_heap, EspHeap};
use telemetry::TelemetrySampler;
use wifi_manager::{WifiManager, WifiSettings};

const LOOP_PERIOD_MS: u32 = 50;
const SPI_BAUDRATE_HZ: u32 = 60_000_000;
/// The 280-row glass starts 20 rows into controller RAM
const PANEL_ROW_OFFSET: u16 = 20;
const TELEMETRY_PERIOD: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log_heap("startup");

    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let sys_loop = EspSystemEventLoop::take()?;

    // Panel: SCK=18 MOSI=23 CS=5 DC=16 RST=17 BL=4
    let spi = SpiDriver::new(
        peripherals.spi2,
        peripherals.pins.gpio18,
        peripherals.pins.gpio23,
        Option::<AnyIOPin>::None,
        &SpiDriverConfig::default(),
    )?;
    let spi_config = Config::default()
        .baudrate(Hertz(SPI_BAUDRATE_HZ))
        .data_mode(embedded_hal::spi::MODE_3);
    let spi_device = SpiDeviceDriver::new(spi, Some(peripherals.pins.gpio5), &spi_config)?;
    let dc = PinDriver::output(peripherals.pins.gpio16)?;
    let rst = PinDriver::output(peripherals.pins.gpio17)?;
    let mut backlight = PinDriver::output(peripherals.pins.gpio4)?;

    let panel_config = Builder::new()
        .dimensions(Dimensions::new(PANEL_WIDTH, PANEL_HEIGHT)?)
        .offset(Offset {
            x: 0,
            y: PANEL_ROW_OFFSET,
        })
        .color_order(ColorOrder::Bgr)
        .build()?;
    let order = PixelOrder::from(panel_config.color_order);
    let mut display = Display::new(Interface::new(spi_device, dc, rst), panel_config);
    display
        .reset(&mut FreeRtos)
        .map_err(|e| anyhow!("panel init failed: {:?}", e))?;
    display
        .clear(0x0000)
        .map_err(|e| anyhow!("panel clear failed: {:?}", e))?;
    backlight.set_high()?;
    log_heap("after_panel_init");

    let api_config = ImageApiConfig::builder()
        .panel(PANEL_WIDTH, PANEL_HEIGHT)
        .pixel_order(order)
        .build()?;
    let service = Arc::new(Mutex::new(ImageService::new(
        api_config,
        display,
        EspHeap,
        MonotonicClock::new(),
    )));

    let mut wifi = WifiManager::new(peripherals.modem, sys_loop, WifiSettings::default());
    if let Err(err) = wifi.start() {
        log::error!("[WIFI] no network: {:#}", err);
    }

    let _server = ImageApiServer::start(service.clone())?;
    runtime_diagnostics::configure_pthread_defaults();
    let sampler = TelemetrySampler::spawn(TELEMETRY_PERIOD)?;
    let mut screen = BackgroundScreen::new("StripView");
    log_heap("ready");

    let mut last_phase = OverlayPhase::Idle;
    loop {
        if let Some(snapshot) = sampler.latest() {
            screen.update(snapshot);
        }

        match service.try_lock() {
            Ok(mut svc) => {
                match svc.tick() {
                    Some(TickEvent::Decoding { rows_done }) => {
                        log::debug!("[IMG] decoded {} rows", rows_done)
                    }
                    Some(TickEvent::Displayed) => log::info!("[IMG] buffered image on screen"),
                    Some(TickEvent::Failed(err)) => log::warn!("[IMG] decode failed: {}", err),
                    Some(TickEvent::Expired) => log::info!("[IMG] overlay expired"),
                    Some(TickEvent::Stalled) => log::warn!("[IMG] stalled upload dropped"),
                    None => {}
                }

                let phase = svc.phase();
                if phase != last_phase {
                    match phase {
                        OverlayPhase::Displaying => log_heap("image_displayed"),
                        OverlayPhase::Idle if last_phase == OverlayPhase::Displaying => {
                            log_heap("image_dismissed")
                        }
                        _ => {}
                    }
                    last_phase = phase;
                }

                if svc.take_background_invalidated() {
                    screen.invalidate();
                }
                let drawn = svc.with_background_panel(|panel| {
                    screen.render(&mut PanelCanvas::new(panel, order))
                });
                if let Some(Err(err)) = drawn {
                    log::warn!("[LCD] background draw failed: {:?}", err);
                }
            }
            Err(TryLockError::WouldBlock) => {}
            Err(TryLockError::Poisoned(_)) => {
                log::error!("[IMG] image service lock poisoned, clearing");
                service.clear_poison();
            }
        }

        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
