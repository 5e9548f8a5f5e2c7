//! Entry points called by the plugin host.

use log::info;

use crate::config::Settings;
use crate::controller::{Controller, Outcome};
use crate::migrate::{self, HostDirs};
use crate::sys::{DeviceProbe, HostProbe, PrivilegedWriter, SudoWriter};

pub struct Plugin<P, W> {
    controller: Controller<P, W>,
    dirs: HostDirs,
}

impl Plugin<HostProbe, SudoWriter> {
    pub fn from_settings(settings: &Settings, dirs: HostDirs) -> Self {
        let controller = Controller::new(
            HostProbe::new(settings),
            SudoWriter::new(settings),
            settings.discovery.clone(),
        );
        Self::new(controller, dirs)
    }
}

/// The four exposed operations report through [`Outcome::ok`]; `detail`
/// carries the diagnostic for the host to surface.
impl<P: DeviceProbe, W: PrivilegedWriter> Plugin<P, W> {
    pub fn new(controller: Controller<P, W>, dirs: HostDirs) -> Self {
        Self { controller, dirs }
    }

    pub fn controller(&self) -> &Controller<P, W> {
        &self.controller
    }

    pub fn dirs(&self) -> &HostDirs {
        &self.dirs
    }

    pub fn enable_touchscreen(&mut self) -> Outcome {
        self.controller.enable()
    }

    pub fn disable_touchscreen(&mut self) -> Outcome {
        self.controller.disable()
    }

    pub fn toggle_touchscreen(&mut self) -> Outcome {
        self.controller.toggle()
    }

    pub fn get_touchscreen_status(&mut self) -> Outcome {
        self.controller.get_status()
    }

    pub fn rediscover(&mut self) -> Outcome {
        self.controller.rediscover()
    }

    /// Startup hook.
    pub fn main(&mut self) -> Outcome {
        info!("touchscreen toggle loaded");
        self.controller.initialize()
    }

    pub fn unload(&self) {
        info!("touchscreen toggle unloading");
    }

    pub fn uninstall(&self) {
        info!("touchscreen toggle uninstalling");
    }

    /// Runs before [`Plugin::main`]; never fails the startup.
    pub fn migration(&self) {
        info!("migrating touchscreen toggle files");
        let moved = migrate::run(&self.dirs);
        if !moved.is_empty() {
            info!("migrated {} legacy file(s)", moved.len());
        }
    }
}
