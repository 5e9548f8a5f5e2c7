use log::{error, info};
use serde::Serialize;
use std::fmt;

use crate::config::DiscoverySettings;
use crate::error::ToggleError;
use crate::locator::{self, DeviceHandle};
use crate::sys::{DeviceProbe, PrivilegedWriter};

/// Logical target state; not re-read from hardware after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleState {
    #[default]
    Enabled,
    Disabled,
}

impl ToggleState {
    // driver convention: "1" disables, "0" enables
    pub fn marker(self) -> &'static str {
        match self {
            ToggleState::Enabled => "0",
            ToggleState::Disabled => "1",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            ToggleState::Enabled => ToggleState::Disabled,
            ToggleState::Disabled => ToggleState::Enabled,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            ToggleState::Enabled => "enable",
            ToggleState::Disabled => "disable",
        }
    }
}

impl fmt::Display for ToggleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleState::Enabled => write!(f, "enabled"),
            ToggleState::Disabled => write!(f, "disabled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Uninitialized,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self { ok: true, detail: None }
    }

    pub fn failure(detail: impl fmt::Display) -> Self {
        Self {
            ok: false,
            detail: Some(detail.to_string()),
        }
    }
}

pub struct Controller<P, W> {
    probe: P,
    writer: W,
    discovery: DiscoverySettings,
    handle: Option<DeviceHandle>,
    state: ToggleState,
}

impl<P: DeviceProbe, W: PrivilegedWriter> Controller<P, W> {
    pub fn new(probe: P, writer: W, discovery: DiscoverySettings) -> Self {
        Self {
            probe,
            writer,
            discovery,
            handle: None,
            state: ToggleState::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        match (&self.handle, self.state) {
            (None, _) => Phase::Uninitialized,
            (Some(_), ToggleState::Enabled) => Phase::Enabled,
            (Some(_), ToggleState::Disabled) => Phase::Disabled,
        }
    }

    pub fn state(&self) -> ToggleState {
        self.state
    }

    pub fn handle(&self) -> Option<&DeviceHandle> {
        self.handle.as_ref()
    }

    fn ensure_handle(&mut self) -> Result<&DeviceHandle, ToggleError> {
        if self.handle.is_none() {
            let handle = locator::discover(&self.probe, &self.discovery).inspect_err(|e| {
                error!("{e}");
            })?;
            self.handle = Some(handle);
        }
        self.handle.as_ref().ok_or(ToggleError::NotFound)
    }

    pub fn initialize(&mut self) -> Outcome {
        let device = match self.ensure_handle() {
            Ok(h) => h.device_path().to_string(),
            Err(e) => {
                error!("failed to initialize touchscreen device");
                return Outcome::failure(e);
            }
        };
        let status = self.get_status();
        self.state = if status.ok {
            ToggleState::Enabled
        } else {
            ToggleState::Disabled
        };
        info!("touchscreen device initialized: {device} ({})", self.state);
        Outcome::success()
    }

    pub fn rediscover(&mut self) -> Outcome {
        self.handle = None;
        match self.ensure_handle() {
            Ok(_) => Outcome::success(),
            Err(e) => Outcome::failure(e),
        }
    }

    pub fn get_status(&mut self) -> Outcome {
        let device = match self.ensure_handle() {
            Ok(h) => h.device_path().to_string(),
            Err(e) => return Outcome::failure(e),
        };
        match self.probe.is_listable(&device) {
            Ok(true) => Outcome::success(),
            Ok(false) => Outcome::failure(format!("{device} is not accessible")),
            Err(source) => {
                let e = ToggleError::Listing { path: device, source };
                error!("error checking touchscreen status: {e}");
                Outcome::failure(e)
            }
        }
    }

    pub fn enable(&mut self) -> Outcome {
        self.apply(ToggleState::Enabled)
    }

    pub fn disable(&mut self) -> Outcome {
        self.apply(ToggleState::Disabled)
    }

    pub fn toggle(&mut self) -> Outcome {
        self.apply(self.state.flipped())
    }

    fn apply(&mut self, target: ToggleState) -> Outcome {
        let control = match self.ensure_handle() {
            Ok(h) => h.control_path().to_string(),
            Err(e) => return Outcome::failure(e),
        };
        match self.writer.write(&control, target.marker()) {
            Ok(()) => {
                self.state = target;
                info!("touchscreen {target}");
                Outcome::success()
            }
            Err(source) => {
                let e = ToggleError::Write {
                    path: control,
                    source,
                };
                error!("failed to {} touchscreen: {e}", target.verb());
                Outcome::failure(e)
            }
        }
    }
}
