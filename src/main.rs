//! BLE WiFi provisioning firmware binary.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    // Initialize ESP-IDF logger for log crate integration
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("=== BLE WiFi provisioning starting ===");

    if let Err(e) = run() {
        // Nothing to recover to without a radio; stay up so the log is readable.
        log::error!("Provisioning failed to start: {}", e);
        loop {
            std::thread::sleep(std::time::Duration::from_secs(60));
        }
    }
}

#[cfg(feature = "esp32")]
fn run() -> Result<(), Box<dyn std::error::Error>> {
    use ble_wifi_provision::ble::NimbleRadio;
    use ble_wifi_provision::config::ProvisionConfig;
    use ble_wifi_provision::indicator::LedIndicator;
    use ble_wifi_provision::provision::Provisioner;
    use ble_wifi_provision::wifi::EspNetwork;
    use esp_idf_hal::gpio::OutputPin;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let config = ProvisionConfig::default();

    let network = EspNetwork::new(peripherals.modem, sysloop)?;
    // On-board LED on most ESP32 dev kits
    let led = LedIndicator::new(peripherals.pins.gpio2.downgrade_output())?;
    let radio = Arc::new(NimbleRadio::new(&config.device_name)?);

    let (mut provisioner, mut handler) =
        Provisioner::start(radio.clone(), network, led, &config)?;
    radio.set_event_sink(move |event| handler.handle_event(event));

    let shutdown = AtomicBool::new(false);
    provisioner.run(&shutdown);
    Ok(())
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-provision' to run the simulator on the host.");
}
