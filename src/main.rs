// ==========================================================
//  iotscout  — local network IoT discovery and control
// ==========================================================

use iotscout::net::{interface, subnet::SubnetPrefix};
use iotscout::{
    table, CommandDispatcher, DiscoveryEngine, IoTCommand, NetworkDevice, NetworkDiscoveryError,
    ScanConfig,
};
use serde_json::Value;
use std::net::IpAddr;
use std::path::Path;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{info, warn};

fn print_usage() {
    println!("Usage: iotscout [OPTIONS] [INTERFACE_NAME|CIDR_NETWORK]");
    println!("Options:");
    println!("  -j, --jobs <N>                   set concurrent probe limit (default: 64)");
    println!("  -c, --config <FILE>              load settings from a TOML/JSON/YAML file");
    println!("  --json                           print discovered devices as JSON");
    println!("  --send <IP> <COMMAND> [K=V ...]  probe one host and send it a command");
    println!("  --list                           list all available network interfaces");
    println!("  -v, --verbose                    enable debug logging");
    println!("  -h, --help                       show this help message");
    println!();
    println!("Without a network argument the local /24 is scanned.");
}

#[tokio::main]
async fn main() -> Result<(), NetworkDiscoveryError> {
    let raw_args: Vec<String> = std::env::args().collect();
    let mut args = raw_args.iter().skip(1);

    let mut jobs = None;
    let mut positional = None;
    let mut config_path = None;
    let mut json = false;
    let mut verbose = false;
    let mut send = None;

    // Parse command line arguments
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--jobs" | "-j" => jobs = args.next().and_then(|s| s.parse().ok()),
            "--config" | "-c" => config_path = args.next().cloned(),
            "--json" => json = true,
            "--verbose" | "-v" => verbose = true,
            "--send" => send = Some(args.by_ref().cloned().collect::<Vec<String>>()),
            "--list" => {
                interface::list_network_interfaces()?;
                return Ok(());
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            _ => positional = Some(arg.clone()),
        }
    }

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ScanConfig::load(config_path.as_deref().map(Path::new))?;

    // Determine target network
    if let Some(arg) = positional {
        let subnet = match arg.parse::<SubnetPrefix>() {
            Ok(subnet) => subnet,
            Err(_) if !arg.contains('/') => interface::get_network_from_interface(&arg)?,
            Err(e) => return Err(e),
        };
        config.subnet = Some(subnet.to_string());
    }

    let mut engine = DiscoveryEngine::new(config);
    if let Some(j) = jobs {
        engine.set_concurrency(j);
    }

    if let Some(send_args) = send {
        return send_command(&engine, &send_args, json).await;
    }

    let scan_start = Instant::now();
    let (tx, mut rx) = oneshot::channel::<Vec<NetworkDevice>>();
    let handle = engine.spawn_discovery(move |devices| {
        let _ = tx.send(devices);
    });

    let devices = loop {
        tokio::select! {
            result = &mut rx => break result.unwrap_or_default(),
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling scan");
                handle.cancel();
            }
        }
    };

    print_devices(&devices, json, scan_start)
}

fn print_devices(
    devices: &[NetworkDevice],
    json: bool,
    scan_start: Instant,
) -> Result<(), NetworkDiscoveryError> {
    if json {
        let rendered = serde_json::to_string_pretty(devices)
            .map_err(|e| NetworkDiscoveryError::Other(e.to_string()))?;
        println!("{}", rendered);
    } else {
        table::print_results(devices, scan_start.elapsed());
    }
    Ok(())
}

/// `KEY=VALUE` values are read as JSON when possible (`true`, `42`, `[1,2]`), otherwise as text
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

async fn send_command(
    engine: &DiscoveryEngine,
    args: &[String],
    json: bool,
) -> Result<(), NetworkDiscoveryError> {
    let [ip_arg, command, params @ ..] = args else {
        return Err(NetworkDiscoveryError::Other(
            "--send requires an IP address and a command".to_string(),
        ));
    };

    let ip: IpAddr = ip_arg
        .parse()
        .map_err(|e| NetworkDiscoveryError::Other(format!("invalid IP address '{}': {}", ip_arg, e)))?;

    let mut iot_command = IoTCommand::new(ip.to_string(), command.clone());
    for param in params {
        let (key, value) = param.split_once('=').ok_or_else(|| {
            NetworkDiscoveryError::Other(format!("expected KEY=VALUE, got '{}'", param))
        })?;
        iot_command = iot_command.with_parameter(key, parse_value(value));
    }

    let scan_start = Instant::now();
    let device = engine.probe_host(ip).await;
    print_devices(std::slice::from_ref(&device), json, scan_start)?;

    let dispatcher = CommandDispatcher::new(engine.config())?;
    let protocol = dispatcher.try_dispatch(&device, &iot_command).await?;
    info!(%ip, %protocol, "Command '{}' delivered", command);
    println!("Command '{}' delivered to {} over {}", command, ip, protocol);
    Ok(())
}
