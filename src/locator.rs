//! Touchscreen discovery: picks the input node whose device info mentions
//! touch, falling back to the first conventional node.

use log::{debug, info};
use serde::Serialize;

use crate::config::{DiscoverySettings, INDEX_PLACEHOLDER};
use crate::error::ToggleError;
use crate::sys::DeviceProbe;

/// A touchscreen node and the sysfs control file belonging to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceHandle {
    device_path: String,
    control_path: String,
}

impl DeviceHandle {
    pub fn for_device(device_path: &str, control_template: &str) -> Result<Self, ToggleError> {
        let index = event_index(device_path)
            .ok_or_else(|| ToggleError::BadDevicePath(device_path.to_string()))?;
        Ok(Self {
            device_path: device_path.to_string(),
            control_path: control_template.replace(INDEX_PLACEHOLDER, &index.to_string()),
        })
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn control_path(&self) -> &str {
        &self.control_path
    }
}

/// `N` of a `.../eventN` path.
pub fn event_index(path: &str) -> Option<u32> {
    let name = path.rsplit('/').next()?;
    let digits = name.strip_prefix("event")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn matches_touch(text: &str, keywords: &[String]) -> bool {
    let text = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .any(|k| !k.is_empty() && text.contains(&k))
}

/// Scanned nodes first, then the fallback list, without duplicates.
pub fn candidates<P: DeviceProbe>(probe: &P, settings: &DiscoverySettings) -> Vec<String> {
    let mut out: Vec<String> = vec![];
    for c in probe.enumerate().into_iter().chain(settings.fallback.iter().cloned()) {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

pub fn discover<P: DeviceProbe>(
    probe: &P,
    settings: &DiscoverySettings,
) -> Result<DeviceHandle, ToggleError> {
    let template = &settings.control_template;

    for device in candidates(probe, settings) {
        if !probe.exists(&device) {
            continue;
        }
        match probe.query_info(&device) {
            Ok(text) if matches_touch(&text, &settings.keywords) => {
                match DeviceHandle::for_device(&device, template) {
                    Ok(handle) => {
                        info!("found touchscreen device: {device}");
                        return Ok(handle);
                    }
                    Err(e) => debug!("skipping {device}: {e}"),
                }
            }
            Ok(_) => debug!("{device}: no touch keyword in device info"),
            Err(source) => {
                let e = ToggleError::Query {
                    path: device.clone(),
                    source,
                };
                debug!("skipping candidate: {e}");
            }
        }
    }

    if let Some(first) = settings.fallback.first() {
        if probe.exists(first) {
            match DeviceHandle::for_device(first, template) {
                Ok(handle) => {
                    info!("using fallback device: {first}");
                    return Ok(handle);
                }
                Err(e) => debug!("unusable fallback {first}: {e}"),
            }
        }
    }

    Err(ToggleError::NotFound)
}
