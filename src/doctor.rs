use evdev::{AbsoluteAxisCode, Device, EventType};
use std::{fs, path::Path};

use crate::config::{Settings, config_path};
use crate::locator;
use crate::migrate::HostDirs;
use crate::sys::{DeviceProbe, HostProbe};

#[derive(Debug, serde::Serialize)]
pub struct NodeReport {
    pub path: String,
    pub name: Option<String>,
    pub multitouch: bool,
    pub touch_keyword: Option<bool>,
}

fn inspect_node(path: &Path) -> (Option<String>, bool) {
    match Device::open(path) {
        Ok(dev) => {
            let has_abs = dev.supported_events().contains(EventType::ABSOLUTE);
            let has_mt = dev.supported_absolute_axes().is_some_and(|a| {
                a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
                    && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
                    && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
            });
            (dev.name().map(str::to_string), has_abs && has_mt)
        }
        // usually EACCES without input group membership
        Err(_) => (None, false),
    }
}

/// Candidate nodes in discovery order, with what evdev and the device
/// info query say about each.
pub fn scan_nodes(settings: &Settings) -> Vec<NodeReport> {
    let probe = HostProbe::new(settings);
    locator::candidates(&probe, &settings.discovery)
        .into_iter()
        .filter(|c| probe.exists(c))
        .map(|c| {
            let (name, multitouch) = inspect_node(Path::new(&c));
            let touch_keyword = probe
                .query_info(&c)
                .ok()
                .map(|text| locator::matches_touch(&text, &settings.discovery.keywords));
            NodeReport {
                path: c,
                name,
                multitouch,
                touch_keyword,
            }
        })
        .collect()
}

pub fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    in_group(&s, "input", &user)
}

fn in_group(group_file: &str, group: &str, user: &str) -> bool {
    group_file
        .lines()
        .filter(|l| l.split(':').next() == Some(group))
        .any(|l| l.split(':').nth(3).unwrap_or("").split(',').any(|u| u == user))
}

pub fn report(settings: &Settings, dirs: &HostDirs) -> serde_json::Value {
    serde_json::json!({
        "nodes": scan_nodes(settings),
        "input_group_member": check_in_input_group(),
        "config": config_path(&dirs.settings_dir),
        "socket": dirs.socket_path(),
        "log_file": dirs.log_file(),
        "control_template": settings.discovery.control_template,
        "hints": {
            "privilege": "the control write runs `sudo sh -c`; allow it without a password for this user",
            "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPS: &str = "root:x:0:\ninput:x:97:deck,alice\ninputx:x:98:bob\n";

    #[test]
    fn group_membership_matches_exact_names() {
        assert!(in_group(GROUPS, "input", "deck"));
        assert!(in_group(GROUPS, "input", "alice"));
        assert!(!in_group(GROUPS, "input", "bob"));
        assert!(!in_group(GROUPS, "input", "dec"));
        assert!(!in_group(GROUPS, "video", "deck"));
    }

    #[test]
    fn scan_of_empty_tree_has_no_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Settings::default();
        s.discovery.input_dir = dir.path().to_path_buf();
        s.discovery.fallback = vec![dir.path().join("event0").display().to_string()];
        assert!(scan_nodes(&s).is_empty());
    }
}
