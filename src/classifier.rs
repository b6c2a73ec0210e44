// Device classification heuristics. Pure functions: an authoritative
// identification result always outranks passive port/TTL fingerprinting.

use crate::models::{Classification, DeviceType, WindowsDetail};

pub const PRINTER_PORTS: [u16; 2] = [9100, 515];
pub const WEB_PORTS: [u16; 2] = [80, 443];
pub const SSH_PORT: u16 = 22;
pub const RTSP_PORT: u16 = 554;

/// Passive reachability signals gathered before classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortSignals {
    pub printer: bool,
    pub rtsp: bool,
    pub ssh: bool,
    pub web: bool,
}

/// TTL bands observed in the wild: 60-70 Unix-like, 120-130 Windows-like,
/// above 250 network gear.
pub fn os_guess_from_ttl(ttl: u8) -> Option<&'static str> {
    match ttl {
        60..=70 => Some("Linux/Unix Based"),
        120..=130 => Some("Windows Based"),
        251..=255 => Some("Cisco/Network"),
        _ => None,
    }
}

fn ttl_in(ttl: Option<u8>, range: std::ops::RangeInclusive<u8>) -> bool {
    ttl.is_some_and(|t| range.contains(&t))
}

/// First match wins. Passive signals rank printer > camera > ssh+ttl >
/// ttl-only > web > generic network.
pub fn classify(
    ident: Option<&WindowsDetail>,
    ttl: Option<u8>,
    ports: PortSignals,
) -> Classification {
    if let Some(detail) = ident {
        if detail.os.contains("Server") {
            return Classification {
                device_type: DeviceType::ServerWindows,
                icon: "ph-hard-drives",
                confidence: "Alta (WMI)",
            };
        }
        return Classification {
            device_type: DeviceType::Windows,
            icon: "ph-windows-logo",
            confidence: "Alta (WMI)",
        };
    }

    if ports.printer {
        Classification {
            device_type: DeviceType::Printer,
            icon: "ph-printer",
            confidence: "Média (Porta 9100)",
        }
    } else if ports.rtsp {
        Classification {
            device_type: DeviceType::Camera,
            icon: "ph-video-camera",
            confidence: "Média (Porta RTSP)",
        }
    } else if ports.ssh && ttl_in(ttl, 60..=70) {
        Classification {
            device_type: DeviceType::Linux,
            icon: "ph-linux-logo",
            confidence: "Média (SSH + TTL)",
        }
    } else if ttl_in(ttl, 120..=130) {
        Classification {
            device_type: DeviceType::WindowsLocked,
            icon: "ph-windows-logo",
            confidence: "Baixa (Apenas TTL)",
        }
    } else if ports.web {
        Classification {
            device_type: DeviceType::WebDevice,
            icon: "ph-wifi-high",
            confidence: "Baixa (Web)",
        }
    } else {
        Classification {
            device_type: DeviceType::Network,
            icon: "ph-globe",
            confidence: "Baixa",
        }
    }
}
