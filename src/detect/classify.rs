use crate::model::DeviceType;
use std::collections::BTreeSet;

/// Ports consulted by the classifier, earliest entry wins when several are open
const PRECEDENCE: &[(&[u16], DeviceType)] = &[
    (&[80, 8080], DeviceType::WebDevice),
    (&[1883], DeviceType::MqttDevice),
    (&[22], DeviceType::LinuxDevice),
    (&[23], DeviceType::TelnetDevice),
    (&[554], DeviceType::Camera),
    (&[8123], DeviceType::HomeAssistant),
    (&[502], DeviceType::ModbusDevice),
];

/// Map the set of open ports to exactly one device type
pub fn classify(open_ports: &BTreeSet<u16>) -> DeviceType {
    PRECEDENCE
        .iter()
        .find(|(ports, _)| ports.iter().any(|p| open_ports.contains(p)))
        .map(|&(_, device_type)| device_type)
        .unwrap_or(DeviceType::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[], DeviceType::Unknown)]
    #[case(&[443], DeviceType::Unknown)]
    #[case(&[80], DeviceType::WebDevice)]
    #[case(&[8080], DeviceType::WebDevice)]
    #[case(&[80, 1883], DeviceType::WebDevice)]
    #[case(&[1883, 22], DeviceType::MqttDevice)]
    #[case(&[22, 23], DeviceType::LinuxDevice)]
    #[case(&[23, 554], DeviceType::TelnetDevice)]
    #[case(&[554, 8123], DeviceType::Camera)]
    #[case(&[8123, 502], DeviceType::HomeAssistant)]
    #[case(&[502, 443], DeviceType::ModbusDevice)]
    #[case(&[80, 443, 22, 23, 1883, 502, 554, 8080, 8123], DeviceType::WebDevice)]
    fn first_matching_port_wins(#[case] ports: &[u16], #[case] expected: DeviceType) {
        let open_ports = ports.iter().copied().collect();
        assert_eq!(classify(&open_ports), expected);
    }
}
