//! ESP32 firmware binary: brings up Wi-Fi, wires a `UartDriver`-backed
//! `SerialPort` to the UPS bridge's `Supervisor`, and runs forever.
//!
//! Wiring (SPM2K-class UPS over a TTL/RS-232 adapter):
//!   ESP32 GPIO17 (TX2) -> UPS RX
//!   ESP32 GPIO16 (RX2) -> UPS TX
//!   ESP32 3.3V/5V -> UPS adapter VCC (per adapter's level requirements)
//!   ESP32 GND -> UPS adapter GND

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::uart::{config::Config as UartConfig, UartDriver};
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::info;

use ups_bridge_core::adapter::Spm2kAdapter;
use ups_bridge_core::config::Config;
use ups_bridge_core::error::{Error, Result};
use ups_bridge_core::serial::SerialPort;
use ups_bridge_core::Supervisor;

/// `SerialPort` backed by the ESP-IDF `UartDriver`. The lock is purely
/// in-process (there is only ever one engine on this UART), so `try_lock`
/// degrades to a plain flag rather than a hardware mutex.
struct Esp32Uart<'d> {
    driver: UartDriver<'d>,
    locked: bool,
    tx_in_flight: bool,
}

impl<'d> Esp32Uart<'d> {
    fn new(driver: UartDriver<'d>) -> Self {
        Self {
            driver,
            locked: false,
            tx_in_flight: false,
        }
    }
}

impl<'d> SerialPort for Esp32Uart<'d> {
    fn try_lock(&mut self) -> bool {
        if self.locked {
            return false;
        }
        self.locked = true;
        true
    }

    fn unlock(&mut self) {
        self.locked = false;
    }

    fn send_async(&mut self, bytes: &[u8]) -> Result<()> {
        self.driver.write(bytes).map_err(|_| Error::TxStartFail)?;
        self.tx_in_flight = true;
        Ok(())
    }

    fn tx_done(&mut self) -> bool {
        // `UartDriver::write` blocks until queued by the IDF driver; from the
        // engine's point of view the transmit is complete as soon as it was
        // accepted, so report done immediately once in flight.
        self.tx_in_flight
    }

    fn tx_done_clear(&mut self) {
        self.tx_in_flight = false;
    }

    fn discard_input(&mut self) {
        let mut sink = [0u8; 64];
        while self.driver.read(&mut sink, 0).unwrap_or(0) > 0 {}
    }

    fn read(&mut self, dst: &mut [u8]) -> usize {
        self.driver.read(dst, 0).unwrap_or(0)
    }

    fn tick_ms(&self) -> u32 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1000) as u32
    }
}

fn connect_wifi(
    wifi: &mut BlockingWifi<EspWifi<'static>>,
    ssid: &str,
    password: &str,
    connect_timeout_ms: u32,
) -> anyhow::Result<()> {
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: ssid.try_into().map_err(|_| anyhow::anyhow!("ssid too long"))?,
        password: password
            .try_into()
            .map_err(|_| anyhow::anyhow!("password too long"))?,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to {ssid}");
    wifi.connect()?;
    info!("wifi connected, waiting for netif");
    wifi.wait_netif_up()?;

    let _ = connect_timeout_ms;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("========================================");
    info!("  UPS-to-SNMP bridge");
    info!("========================================");

    let mut config = Config::default();
    config.apply_env_overrides();

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs))?,
        sys_loop,
    )?;
    connect_wifi(&mut wifi, &config.wifi_ssid, &config.wifi_password, config.connect_timeout_ms)?;
    // Leaked deliberately: the interface must outlive `main`, and the
    // supervisor never needs to touch the driver directly once connected.
    std::mem::forget(wifi);

    let uart_config = UartConfig::default().baudrate(Hertz(9600));
    let uart = UartDriver::new(
        peripherals.uart2,
        peripherals.pins.gpio17, // TX
        peripherals.pins.gpio16, // RX
        Option::<gpio::Gpio0>::None,
        Option::<gpio::Gpio1>::None,
        &uart_config,
    )?;
    info!("UART2 initialized at 9600 baud");

    let serial = Esp32Uart::new(uart);
    let supervisor = Supervisor::new(serial, Spm2kAdapter::new(), config);

    info!("entering supervisor main loop");
    supervisor.run_forever();
}
