use crate::model::{DeviceType, NetworkDevice};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use std::time::Duration;

/// Render discovered devices as a table, sorted by address
pub fn device_table(devices: &[NetworkDevice]) -> Table {
    let mut sorted: Vec<&NetworkDevice> = devices.iter().collect();
    sorted.sort_by_key(|d| d.ip);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    table.set_header(vec!["IP", "Name", "MAC", "Type", "Ports", "Capabilities", "RTT"]);

    for device in sorted {
        let ports = join_or_dash(device.open_ports.iter());
        let capabilities = join_or_dash(device.capabilities.iter());
        let rtt = device
            .response_time
            .map_or("—".to_string(), |rtt| format!("{} ms", rtt.as_millis()));

        table.add_row(vec![
            Cell::new(device.ip),
            Cell::new(&device.name),
            Cell::new(device.mac_or_unknown()),
            Cell::new(device.device_type),
            Cell::new(ports),
            Cell::new(capabilities),
            Cell::new(rtt),
        ]);
    }

    table
}

fn join_or_dash<T: ToString>(items: impl Iterator<Item = T>) -> String {
    let joined = items.map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "—".to_string()
    } else {
        joined
    }
}

/// Print the table followed by a short summary
pub fn print_results(devices: &[NetworkDevice], scan_duration: Duration) {
    println!("{}", device_table(devices));

    let classified = devices
        .iter()
        .filter(|d| d.device_type != DeviceType::Unknown)
        .count();
    let controllable = devices
        .iter()
        .filter(|d| crate::dispatch::DISPATCH_PRIORITY.iter().any(|p| d.has_capability(*p)))
        .count();

    println!("\nScan Results Summary:");
    println!("=====================");
    println!("Scan completed in {:.2} seconds", scan_duration.as_secs_f64());
    println!("Devices found: {}", devices.len());
    println!("Classified: {}/{}", classified, devices.len());
    println!("Controllable (HTTP/MQTT/Modbus): {}", controllable);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Capability;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn rows_are_sorted_and_sentinels_rendered() {
        let mut web = NetworkDevice::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 20)));
        web.open_ports.insert(80);
        web.capabilities.insert(Capability::Http);
        web.device_type = DeviceType::WebDevice;
        let bare = NetworkDevice::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)));

        let rendered = device_table(&[web, bare]).to_string();

        let first = rendered.find("10.0.0.3").unwrap();
        let second = rendered.find("10.0.0.20").unwrap();
        assert!(first < second);
        assert!(rendered.contains("Web Device"));
        assert!(rendered.contains("unknown"));
        assert!(rendered.contains("Unknown Device"));
    }
}
