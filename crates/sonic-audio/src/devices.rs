//! Output device enumeration and connectivity heuristics.

use cpal::traits::{DeviceTrait, HostTrait};
use sonic_core::{Error, Result};
use tracing::warn;

/// Substrings that mark an output route as wireless. Matched case
/// insensitively against the device name.
const WIRELESS_KEYWORDS: &[&str] = &[
    "bluetooth",
    "airpods",
    "wireless",
    "headphone",
    "headset",
    "buds",
    "beats",
    "bose",
    "sony",
    "wh-1000",
    "wf-1000",
];

/// How the active output device is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Wireless,
    Wired,
    /// Device name was unavailable; callers must not assume either way.
    Unknown,
}

impl Connectivity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Wireless => "wireless",
            Self::Wired => "wired",
            Self::Unknown => "unknown",
        }
    }
}

/// One enumerated output device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub connectivity: Connectivity,
}

/// Classify a device by name. A name that matches no wireless keyword is
/// assumed wired; an unreadable name degrades to [`Connectivity::Unknown`]
/// rather than guessing.
pub fn detect_connectivity(name: &str) -> Connectivity {
    if name.trim().is_empty() {
        return Connectivity::Unknown;
    }
    let lowered = name.to_lowercase();
    if WIRELESS_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        Connectivity::Wireless
    } else {
        Connectivity::Wired
    }
}

/// Enumerate output devices on the default host.
pub fn list_output_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host
        .default_output_device()
        .and_then(|d| d.name().ok());

    let devices = host
        .output_devices()
        .map_err(|e| Error::DeviceUnavailable(format!("cannot enumerate outputs: {e}")))?;

    let mut infos = Vec::new();
    for device in devices {
        match device.name() {
            Ok(name) => {
                let is_default = default_name.as_deref() == Some(name.as_str());
                let connectivity = detect_connectivity(&name);
                infos.push(DeviceInfo {
                    name,
                    is_default,
                    connectivity,
                });
            }
            Err(e) => {
                warn!("skipping unnamed output device: {e}");
                infos.push(DeviceInfo {
                    name: String::new(),
                    is_default: false,
                    connectivity: Connectivity::Unknown,
                });
            }
        }
    }
    Ok(infos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bluetooth_names_are_wireless() {
        assert_eq!(detect_connectivity("AirPods Pro"), Connectivity::Wireless);
        assert_eq!(detect_connectivity("Sony WH-1000XM5"), Connectivity::Wireless);
        assert_eq!(detect_connectivity("Galaxy Buds2"), Connectivity::Wireless);
    }

    #[test]
    fn test_plain_names_are_wired() {
        assert_eq!(
            detect_connectivity("Built-in Output"),
            Connectivity::Wired
        );
        assert_eq!(detect_connectivity("HDA Intel PCH"), Connectivity::Wired);
    }

    #[test]
    fn test_missing_name_degrades_to_unknown() {
        assert_eq!(detect_connectivity(""), Connectivity::Unknown);
        assert_eq!(detect_connectivity("   "), Connectivity::Unknown);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        assert_eq!(detect_connectivity("BLUETOOTH speaker"), Connectivity::Wireless);
    }
}
