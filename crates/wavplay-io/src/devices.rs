//! Output device enumeration and lookup.

use crate::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

/// Extract device name via `description()` (cpal 0.17+).
pub(crate) fn device_name(device: &Device) -> Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Output device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Whether this is the host's default output.
    pub is_default: bool,
}

/// List all output devices on the default host.
pub fn list_output_devices() -> Result<Vec<AudioDevice>, DeviceError> {
    let host = cpal::default_host();
    let default_name = host
        .default_output_device()
        .and_then(|d| device_name(&d).ok());

    let outputs = host
        .output_devices()
        .map_err(|e| DeviceError::DeviceUnavailable(e.to_string()))?;

    // Unnamed devices stay in the list so indices match `find_output_device`.
    let mut devices = Vec::new();
    for device in outputs {
        let name = device_name(&device).unwrap_or_else(|_| "<unnamed>".to_string());
        let default_sample_rate = device
            .default_output_config()
            .map(|c| c.sample_rate())
            .unwrap_or(48000);
        devices.push(AudioDevice {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            default_sample_rate,
        });
    }

    Ok(devices)
}

/// Find an output device by index, exact name, or case-insensitive partial name.
pub(crate) fn find_output_device(host: &Host, name_or_index: &str) -> Result<Device, DeviceError> {
    let devices: Vec<_> = host
        .output_devices()
        .map_err(|e| DeviceError::DeviceUnavailable(e.to_string()))?
        .collect();

    if let Ok(index) = name_or_index.parse::<usize>() {
        return devices.get(index).cloned().ok_or_else(|| {
            DeviceError::DeviceUnavailable(format!(
                "output device index {} (only {} devices available)",
                index,
                devices.len()
            ))
        });
    }

    for device in &devices {
        if device_name(device).is_ok_and(|n| n == name_or_index) {
            return Ok(device.clone());
        }
    }

    let search_lower = name_or_index.to_lowercase();
    let mut matches: Vec<_> = devices
        .iter()
        .filter_map(|d| {
            device_name(d)
                .ok()
                .filter(|name| name.to_lowercase().contains(&search_lower))
                .map(|name| (d.clone(), name))
        })
        .collect();

    match matches.len() {
        0 => Err(DeviceError::DeviceUnavailable(format!(
            "no output device matching '{}'",
            name_or_index
        ))),
        1 => Ok(matches.remove(0).0),
        _ => {
            let names: Vec<_> = matches.iter().map(|(_, n)| n.as_str()).collect();
            tracing::warn!(
                search = name_or_index,
                candidates = ?names,
                "multiple output devices match, using the first"
            );
            Ok(matches.remove(0).0)
        }
    }
}
