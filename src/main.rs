use anyhow::Result;
use microbit_connect::domain::models::{
    AppConnectionStatus, AppEvent, BoardVersion, DeviceKind, HostCapabilities, RawDeviceStatus,
};
use microbit_connect::domain::pairing;
use microbit_connect::domain::settings::{Settings, SettingsService};
use microbit_connect::infrastructure::device::firmware::FirmwareStore;
use microbit_connect::infrastructure::device::simulated::SimulatedDevice;
use microbit_connect::infrastructure::device::transport::Devices;
use microbit_connect::infrastructure::device::ConnectionService;
use microbit_connect::infrastructure::logging::init_logger;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Commands read from stdin, one per line
#[derive(Debug, Clone, PartialEq)]
enum ConnectionCommand {
    Start,
    Next,
    Back,
    Switch,
    TryAgain,
    Close,
    Flash,
    ConnectWireless,
    ConnectBridge,
    SetName(String),
    Disconnect,
    Reconnect,
    /// Simulate the device dropping off the link
    Drop,
    State,
    Quit,
}

fn parse_command(line: &str) -> Option<ConnectionCommand> {
    let mut parts = line.split_whitespace();
    let command = match parts.next()? {
        "start" => ConnectionCommand::Start,
        "next" => ConnectionCommand::Next,
        "back" => ConnectionCommand::Back,
        "switch" => ConnectionCommand::Switch,
        "retry" => ConnectionCommand::TryAgain,
        "close" => ConnectionCommand::Close,
        "flash" => ConnectionCommand::Flash,
        "connect" => ConnectionCommand::ConnectWireless,
        "bridge" => ConnectionCommand::ConnectBridge,
        "name" => ConnectionCommand::SetName(parts.next()?.to_string()),
        "disconnect" => ConnectionCommand::Disconnect,
        "reconnect" => ConnectionCommand::Reconnect,
        "drop" => ConnectionCommand::Drop,
        "state" => ConnectionCommand::State,
        "quit" | "exit" => ConnectionCommand::Quit,
        _ => return None,
    };
    Some(command)
}

fn main() -> Result<()> {
    let settings_service = SettingsService::new()?;

    let _logging_guard = init_logger(&settings_service.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting micro:bit connection wizard");
    let settings = settings_service.get().clone();

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(command) => {
                    let quit = command == ConnectionCommand::Quit;
                    if cmd_tx.send(command).is_err() || quit {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => println!("Unknown command: {}", line.trim()),
            }
        }
    });

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(settings, cmd_rx))
}

async fn run(
    settings: Settings,
    mut commands: mpsc::UnboundedReceiver<ConnectionCommand>,
) -> Result<()> {
    let firmware = FirmwareStore::new(&settings.firmware_dir);
    if !firmware.dir().is_dir() {
        warn!(
            "Firmware directory {} not found; flashing will fail",
            firmware.dir().display()
        );
    }

    let device = Arc::new(SimulatedDevice::new(BoardVersion::V2, 1));
    let devices = Devices {
        usb: device.clone(),
        wireless: device.clone(),
        radio: device.clone(),
    };
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut service = ConnectionService::new(
        devices,
        firmware,
        HostCapabilities::default(),
        settings.connection.clone(),
        event_tx,
    );

    let mut tick = tokio::time::interval(Duration::from_millis(50));
    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    None | Some(ConnectionCommand::Quit) => break,
                    Some(command) => handle_command(&mut service, &device, command).await,
                }
            }
            Some(event) = event_rx.recv() => print_event(&event),
            _ = tick.tick() => {
                service.process_pending_events();
            }
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn handle_command(
    service: &mut ConnectionService,
    device: &SimulatedDevice,
    command: ConnectionCommand,
) {
    match command {
        ConnectionCommand::Start => {
            service.start_connect();
        }
        ConnectionCommand::Next => {
            service.on_next_click();
        }
        ConnectionCommand::Back => {
            service.on_back_click();
        }
        ConnectionCommand::Switch => {
            service.switch_transport();
        }
        ConnectionCommand::TryAgain => {
            service.on_try_again();
        }
        ConnectionCommand::Close => service.close_wizard(),
        ConnectionCommand::Flash => {
            if let Err(e) = service.connect_and_flash().await {
                error!("Flashing failed: {}", e);
            }
        }
        ConnectionCommand::ConnectWireless => service.connect_wireless().await,
        ConnectionCommand::ConnectBridge => service.connect_bridge().await,
        ConnectionCommand::SetName(name) => service.on_change_device_name(&name),
        ConnectionCommand::Disconnect => service.disconnect().await,
        ConnectionCommand::Reconnect => service.reconnect().await,
        ConnectionCommand::Drop => {
            let kind = if service.status().transport.is_radio() {
                DeviceKind::RadioRemote
            } else {
                DeviceKind::Wireless
            };
            device.emit(kind, RawDeviceStatus::Disconnected);
        }
        ConnectionCommand::State => print_state(service),
        ConnectionCommand::Quit => {}
    }
}

fn print_event(event: &AppEvent) {
    match event {
        AppEvent::ConnectionStatus(state) => {
            println!("status: {:?} ({:?})", state.status, state.transport)
        }
        AppEvent::StageChanged(stage) => {
            println!("wizard: {} - {}", stage, stage.step().title())
        }
        AppEvent::FlashProgress(progress) => println!("flashing: {:.0}%", progress * 100.0),
        AppEvent::DownloadFirmware(file) => println!("download for manual flashing: {}", file),
        AppEvent::LogMessage(message) => {
            println!("[{:?}] {}", message.severity, message.message)
        }
    }
}

fn print_state(service: &ConnectionService) {
    let wizard = service.wizard();
    let status = service.status();
    println!(
        "wizard {} ({}), status {:?} ({:?})",
        wizard.stage(),
        if wizard.is_open() { "open" } else { "closed" },
        status.status,
        status.transport
    );
    if let Some(name) = wizard.wireless_device_name() {
        println!("  wireless device: {}", name);
        let pattern = pairing::encode_pattern(name);
        for row in 0..pairing::PATTERN_ROWS {
            let line: String = (0..pairing::NAME_LENGTH)
                .map(|col| if pattern.cell(row, col) { '#' } else { '.' })
                .collect();
            println!("    {}", line);
        }
    }
    if let Some(id) = wizard.radio_remote_device_id() {
        println!("  radio remote: {}", id);
    }
    if let Some(id) = wizard.radio_bridge_device_id() {
        println!("  radio bridge: {}", id);
    }
    if status.status == AppConnectionStatus::FailedToReconnectTwice {
        println!("  reconnect failed twice; start the wizard again");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("next"), Some(ConnectionCommand::Next));
        assert_eq!(parse_command("close"), Some(ConnectionCommand::Close));
        assert_eq!(
            parse_command("name  zuzuv"),
            Some(ConnectionCommand::SetName("zuzuv".to_string()))
        );
        assert_eq!(parse_command("name"), None);
        assert_eq!(parse_command("fly"), None);
        assert_eq!(parse_command(""), None);
    }
}
