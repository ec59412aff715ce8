//! Host simulator for the provisioning service.
//!
//! Runs the provisioning core against an in-memory radio and a simulated
//! WiFi station. The console plays the phone: connect, write credentials,
//! read the status byte. Connect attempts run on their own thread exactly
//! as they do on the device's main loop.
//!
//! # Usage
//!
//! ```bash
//! SIM_NETWORKS="HomeNet:pw1234,Cafe:" cargo run --bin host-provision
//! PROVISION_CONFIG=provision.json cargo run --bin host-provision
//! ```
//!
//! Without `SIM_NETWORKS` a single network `HomeNet` / `pw1234` is known.

#[cfg(not(feature = "esp32"))]
mod sim {
    use ble_wifi_provision::ble::{CharHandle, ServiceHandles};
    use ble_wifi_provision::console::{ConsoleCommand, HELP_TEXT};
    use ble_wifi_provision::provision::ServiceHandler;
    use ble_wifi_provision::{
        ConnectionState, LogIndicator, NetworkInterface, RadioEvent, SimNetwork, SimRadio,
    };
    use std::io::Write;
    use std::sync::{Mutex, PoisonError};

    pub type Handler = Mutex<ServiceHandler<SimRadio, LogIndicator>>;

    /// Default network when `SIM_NETWORKS` is not set.
    pub const DEFAULT_NETWORKS: &str = "HomeNet:pw1234";

    pub fn print_prompt() {
        print!("> ");
        let _ = std::io::stdout().flush();
    }

    fn dispatch(handler: &Handler, event: RadioEvent) {
        handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle_event(event);
    }

    fn write(radio: &SimRadio, handler: &Handler, handle: CharHandle, value: &str) {
        if !radio.is_central_connected() {
            println!("Not connected; use 'connect' first");
            return;
        }
        match radio.central_write(handle, value.as_bytes()) {
            Ok(event) => dispatch(handler, event),
            Err(e) => println!("Write failed: {}", e),
        }
    }

    fn show_status(radio: &SimRadio, handles: &ServiceHandles, network: &SimNetwork) {
        match radio.central_read(handles.status) {
            Ok(value) => {
                let byte = value.first().copied().unwrap_or_default();
                match ConnectionState::from_status_byte(byte) {
                    Some(state) => println!("Status: 0x{:02x} ({})", byte, state),
                    None => println!("Status: 0x{:02x} (unknown)", byte),
                }
            }
            Err(e) => println!("Status read failed: {}", e),
        }
        match network.current_network_id() {
            Some(id) => println!("Station associated with '{}'", id),
            None => println!("Station not associated"),
        }
        println!(
            "Advertising: {}, status notifications received: {}",
            if radio.is_advertising() { "yes" } else { "no" },
            radio.notifications().len()
        );
    }

    /// Execute one console command. Returns `false` to quit.
    pub fn handle_command(
        cmd: ConsoleCommand,
        radio: &SimRadio,
        handler: &Handler,
        handles: &ServiceHandles,
        network: &SimNetwork,
    ) -> bool {
        match cmd {
            ConsoleCommand::Connect => {
                if radio.is_central_connected() {
                    println!("Already connected");
                } else {
                    let event = radio.central_connect();
                    radio.central_subscribe(true);
                    dispatch(handler, event);
                    println!("Connected, subscribed to status notifications");
                }
            }
            ConsoleCommand::Disconnect => {
                if radio.is_central_connected() {
                    let event = radio.central_disconnect();
                    dispatch(handler, event);
                    println!("Disconnected");
                } else {
                    println!("Not connected");
                }
            }
            ConsoleCommand::NetworkId(id) => write(radio, handler, handles.network_id, &id),
            ConsoleCommand::Secret(secret) => {
                write(radio, handler, handles.network_secret, &secret)
            }
            ConsoleCommand::Status => show_status(radio, handles, network),
            ConsoleCommand::Help => println!("{}", HELP_TEXT),
            ConsoleCommand::Quit => return false,
            ConsoleCommand::Unknown(msg) => {
                if !msg.is_empty() {
                    println!("{}", msg);
                }
            }
        }
        true
    }
}

#[cfg(not(feature = "esp32"))]
#[tokio::main(flavor = "current_thread")]
async fn main() {
    use ble_wifi_provision::console::ConsoleCommand;
    use ble_wifi_provision::{LogIndicator, ProvisionConfig, Provisioner, SimNetwork, SimRadio};
    use log::{error, info};
    use std::io::BufRead;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== BLE WiFi provisioning simulator ===");

    let config = match std::env::var("PROVISION_CONFIG") {
        Ok(path) => match ProvisionConfig::from_json_file(&path) {
            Ok(config) => {
                info!("Configuration loaded from {}", path);
                config
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        Err(_) => ProvisionConfig::default(),
    };

    let spec = std::env::var("SIM_NETWORKS").unwrap_or_else(|_| sim::DEFAULT_NETWORKS.into());
    let network = match SimNetwork::from_spec(&spec) {
        Ok(network) => network,
        Err(e) => {
            error!("SIM_NETWORKS: {}", e);
            std::process::exit(1);
        }
    };
    info!("Simulated networks: {}", network.known_networks().join(", "));

    let radio = Arc::new(SimRadio::new());
    let (mut provisioner, handler) =
        match Provisioner::start(radio.clone(), network.clone(), LogIndicator::new(), &config) {
            Ok(parts) => parts,
            Err(e) => {
                error!("Provisioning failed to start: {}", e);
                std::process::exit(1);
            }
        };
    let handles = handler.handles();
    let handler = Arc::new(Mutex::new(handler));

    // Connect attempts block, so the main loop gets its own thread
    let shutdown = Arc::new(AtomicBool::new(false));
    let loop_shutdown = shutdown.clone();
    let main_loop = std::thread::spawn(move || provisioner.run(&loop_shutdown));

    let cancel = CancellationToken::new();

    println!();
    println!("=== Provisioning simulator ===");
    println!("Advertising as '{}'", config.device_name);
    println!("Type 'help' for commands");
    println!();

    let stdin_cancel = cancel.clone();
    let stdin_task = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();

        sim::print_prompt();
        while !stdin_cancel.is_cancelled() {
            let Some(Ok(line)) = lines.next() else {
                break;
            };
            let cmd = ConsoleCommand::parse(&line);
            if !sim::handle_command(cmd, &radio, &handler, &handles, &network) {
                break;
            }
            sim::print_prompt();
        }
        stdin_cancel.cancel();
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            cancel.cancel();
        }
        result = stdin_task => {
            if let Err(e) = result {
                error!("Console task error: {}", e);
            }
        }
    }

    shutdown.store(true, Ordering::SeqCst);
    if main_loop.join().is_err() {
        error!("Provisioning loop panicked");
    }

    info!("Shutdown complete");
    // The console thread may still be blocked reading stdin
    std::process::exit(0);
}

#[cfg(feature = "esp32")]
fn main() {
    println!("host-provision runs on the host only.");
    println!("Build without the 'esp32' feature to use the simulator.");
}
