//! Sound device lookup
//!
//! Devices are addressed by `input:<name>` or `output:<name>` identifiers; a bare name is looked
//! up among the input devices.

use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

use crate::audio::buffer::DEVICE_RATE;
use crate::error::AudioError;

/// Direction of a device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::Input => "input:",
            Direction::Output => "output:",
        }
    }
}

/// Listing entry for `--list-devices`
#[derive(Debug, Clone, Serialize)]
pub struct AudioDeviceInfo {
    pub id: String,
    pub name: String,
    pub direction: Direction,
    pub is_default: bool,
    /// Whether the device accepts the 48 kHz link rate
    pub supports_link_rate: bool,
    pub max_channels: u16,
}

/// cpal device together with the direction it was opened for
pub struct AudioDevice {
    inner: cpal::Device,
    pub name: String,
    pub direction: Direction,
}

impl AudioDevice {
    fn new(device: cpal::Device, direction: Direction) -> Self {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Self {
            inner: device,
            name,
            direction,
        }
    }

    pub fn into_inner(self) -> cpal::Device {
        self.inner
    }

    pub fn default_input_config(&self) -> Result<cpal::SupportedStreamConfig, AudioError> {
        Ok(self.inner.default_input_config()?)
    }

    pub fn default_output_config(&self) -> Result<cpal::SupportedStreamConfig, AudioError> {
        Ok(self.inner.default_output_config()?)
    }
}

/// Parse an identifier into direction and device name
pub fn parse_device_id(id: &str) -> (Direction, &str) {
    if let Some(name) = id.strip_prefix(Direction::Input.prefix()) {
        (Direction::Input, name)
    } else if let Some(name) = id.strip_prefix(Direction::Output.prefix()) {
        (Direction::Output, name)
    } else {
        (Direction::Input, id)
    }
}

/// Enumerate the input and output devices of the default host
pub fn list_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Some(info) = describe(&device, Direction::Input, default_input.as_deref()) {
                devices.push(info);
            }
        }
    }
    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Some(info) = describe(&device, Direction::Output, default_output.as_deref()) {
                devices.push(info);
            }
        }
    }
    devices
}

fn describe(
    device: &cpal::Device,
    direction: Direction,
    default_name: Option<&str>,
) -> Option<AudioDeviceInfo> {
    let name = device.name().ok()?;
    let ranges: Vec<cpal::SupportedStreamConfigRange> = match direction {
        Direction::Input => device.supported_input_configs().ok()?.collect(),
        Direction::Output => device.supported_output_configs().ok()?.collect(),
    };
    let rate = cpal::SampleRate(DEVICE_RATE);
    let supports_link_rate = ranges
        .iter()
        .any(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate());
    let max_channels = ranges.iter().map(|r| r.channels()).max().unwrap_or(0);

    Some(AudioDeviceInfo {
        id: format!("{}{}", direction.prefix(), name),
        is_default: default_name == Some(name.as_str()),
        name,
        direction,
        supports_link_rate,
        max_channels,
    })
}

/// Find a device by identifier
pub fn get_device_by_id(id: &str) -> Result<AudioDevice, AudioError> {
    let host = cpal::default_host();
    let (direction, name) = parse_device_id(id);

    let devices = match direction {
        Direction::Input => host.input_devices(),
        Direction::Output => host.output_devices(),
    }
    .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;

    devices
        .filter(|d| d.name().map(|n| n == name).unwrap_or(false))
        .map(|d| AudioDevice::new(d, direction))
        .next()
        .ok_or_else(|| AudioError::DeviceNotFound(id.to_string()))
}

pub fn get_default_input_device() -> Result<AudioDevice, AudioError> {
    cpal::default_host()
        .default_input_device()
        .map(|d| AudioDevice::new(d, Direction::Input))
        .ok_or_else(|| AudioError::DeviceNotFound("No default input device".to_string()))
}

pub fn get_default_output_device() -> Result<AudioDevice, AudioError> {
    cpal::default_host()
        .default_output_device()
        .map(|d| AudioDevice::new(d, Direction::Output))
        .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()))
}
