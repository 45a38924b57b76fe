//! Station-first Wi-Fi bring-up with an access-point fallback

use anyhow::{anyhow, bail, Context, Result};
use embedded_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration,
};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

const STA_SSID: Option<&str> = option_env!("STRIPVIEW_WIFI_SSID");
const STA_PASSWORD: Option<&str> = option_env!("STRIPVIEW_WIFI_PASS");
const AP_SSID: &str = "StripView";
const AP_PASSWORD: &str = match option_env!("STRIPVIEW_AP_PASS") {
    Some(pass) => pass,
    None => "stripview",
};
const AP_CHANNEL: u8 = 6;
const AP_MAX_CLIENTS: u16 = 4;
const CONNECT_ATTEMPTS: u32 = 3;

type Ssid = heapless::String<32>;
type Password = heapless::String<64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiMode {
    AccessPoint,
    Station,
}

impl WifiMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::AccessPoint => "Hotspot",
            Self::Station => "Wi-Fi",
        }
    }
}

/// Where clients can reach the HTTP API
#[derive(Debug, Clone)]
pub struct NetworkInfo {
    pub mode: WifiMode,
    pub ssid: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct WifiSettings {
    pub ap_ssid: String,
    pub ap_password: String,
    pub sta_ssid: String,
    pub sta_password: String,
}

impl Default for WifiSettings {
    /// Compile-time credentials; no station SSID means hotspot only
    fn default() -> Self {
        Self {
            ap_ssid: AP_SSID.into(),
            ap_password: AP_PASSWORD.into(),
            sta_ssid: STA_SSID.unwrap_or_default().into(),
            sta_password: STA_PASSWORD.unwrap_or_default().into(),
        }
    }
}

/// Trimmed SSID and password ready for the driver
fn credentials(ssid: &str, password: &str) -> Result<(Ssid, AuthMethod, Password)> {
    let ssid = ssid.trim();
    if ssid.is_empty() {
        bail!("SSID is empty");
    }
    let ssid = Ssid::try_from(ssid).map_err(|_| anyhow!("SSID longer than 32 bytes"))?;
    let password = password.trim();
    if password.is_empty() {
        return Ok((ssid, AuthMethod::None, Password::new()));
    }
    if password.len() < 8 {
        bail!("password must be empty or at least 8 characters");
    }
    let password =
        Password::try_from(password).map_err(|_| anyhow!("password longer than 64 bytes"))?;
    Ok((ssid, AuthMethod::WPA2Personal, password))
}

pub struct WifiManager {
    wifi: Option<BlockingWifi<EspWifi<'static>>>,
    modem: Option<Modem>,
    nvs: Option<EspDefaultNvsPartition>,
    sys_loop: EspSystemEventLoop,
    settings: WifiSettings,
    info: Option<NetworkInfo>,
}

impl WifiManager {
    pub fn new(modem: Modem, sys_loop: EspSystemEventLoop, settings: WifiSettings) -> Self {
        Self {
            wifi: None,
            modem: Some(modem),
            nvs: EspDefaultNvsPartition::take().ok(),
            sys_loop,
            settings,
            info: None,
        }
    }

    pub fn info(&self) -> Option<&NetworkInfo> {
        self.info.as_ref()
    }

    /// Join the configured network, falling back to the hotspot
    pub fn start(&mut self) -> Result<&NetworkInfo> {
        let info = match self.join_station() {
            Ok(info) => info,
            Err(err) => {
                if !self.settings.sta_ssid.trim().is_empty() {
                    log::warn!("[WIFI] station unavailable ({:#}), starting hotspot", err);
                }
                self.open_hotspot()?
            }
        };
        log::info!("[WIFI] {} up: {} at {}", info.mode.label(), info.ssid, info.url);
        Ok(self.info.insert(info))
    }

    fn driver(&mut self) -> Result<&mut BlockingWifi<EspWifi<'static>>> {
        if self.wifi.is_none() {
            let modem = self.modem.take().context("Wi-Fi modem already released")?;
            let esp_wifi = EspWifi::new(modem, self.sys_loop.clone(), self.nvs.take())
                .context("wifi driver init")?;
            self.wifi = Some(
                BlockingWifi::wrap(esp_wifi, self.sys_loop.clone()).context("wifi wrapper init")?,
            );
        }
        self.wifi.as_mut().context("wifi driver missing")
    }

    fn join_station(&mut self) -> Result<NetworkInfo> {
        let (ssid, auth_method, password) =
            credentials(&self.settings.sta_ssid, &self.settings.sta_password)?;
        let wifi = self.driver()?;
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: ssid.clone(),
            auth_method,
            password,
            ..Default::default()
        }))
        .context("station config")?;
        wifi.start().context("station start")?;

        let mut attempt = 1;
        while let Err(err) = wifi.connect() {
            if attempt >= CONNECT_ATTEMPTS {
                let _ = wifi.stop();
                return Err(err).context(format!("connect to '{}'", ssid));
            }
            log::warn!("[WIFI] connect attempt {} failed: {}", attempt, err);
            attempt += 1;
        }
        wifi.wait_netif_up().context("station netif")?;

        let ip = wifi.wifi().sta_netif().get_ip_info().context("station ip")?.ip;
        Ok(NetworkInfo {
            mode: WifiMode::Station,
            ssid: ssid.as_str().into(),
            url: format!("http://{}/", ip),
        })
    }

    fn open_hotspot(&mut self) -> Result<NetworkInfo> {
        let (ssid, auth_method, password) =
            credentials(&self.settings.ap_ssid, &self.settings.ap_password)?;
        let wifi = self.driver()?;
        wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
            ssid: ssid.clone(),
            channel: AP_CHANNEL,
            auth_method,
            password,
            max_connections: AP_MAX_CLIENTS,
            ..Default::default()
        }))
        .context("hotspot config")?;
        wifi.start().context("hotspot start")?;
        wifi.wait_netif_up().context("hotspot netif")?;

        let ip = wifi.wifi().ap_netif().get_ip_info().context("hotspot ip")?.ip;
        Ok(NetworkInfo {
            mode: WifiMode::AccessPoint,
            ssid: ssid.as_str().into(),
            url: format!("http://{}/", ip),
        })
    }
}

/// Signal strength of the joined access point; `None` when not associated
pub fn station_rssi() -> Option<i8> {
    let mut record = sys::wifi_ap_record_t::default();
    let err = unsafe { sys::esp_wifi_sta_get_ap_info(&mut record) };
    (err == sys::ESP_OK).then_some(record.rssi)
}
