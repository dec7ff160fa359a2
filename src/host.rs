use std::net::UdpSocket;

use sysinfo::System;

/// Host identity attached to every alert.
#[derive(Debug, Clone, PartialEq)]
pub struct HostDetails {
    pub hostname: String,
    pub ip: String,
    pub uptime: String,
}

impl HostDetails {
    pub fn collect() -> Self {
        Self {
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            ip: outbound_ip().unwrap_or_else(|| "N/A".to_string()),
            uptime: format_uptime(System::uptime()),
        }
    }
}

/// Address of the interface used for outbound traffic. No packet is sent.
fn outbound_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

pub fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    format!("{hours}h {minutes}m")
}
