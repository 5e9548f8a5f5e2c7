use anyhow::{Result, anyhow};
use log::info;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::locator::event_index;

pub const INDEX_PLACEHOLDER: &str = "{index}";

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySettings {
    pub input_dir: PathBuf,
    pub fallback: Vec<String>,
    pub keywords: Vec<String>,
    pub query_command: Vec<String>,
    pub query_timeout_secs: u64,
    pub control_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlSettings {
    #[serde(default)]
    pub privilege_command: Vec<String>,
    pub write_timeout_secs: u64,
    pub list_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub discovery: DiscoverySettings,
    pub control: ControlSettings,
}

impl DiscoverySettings {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl ControlSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }
}

fn default_settings_text() -> &'static str {
    include_str!("../config/default.toml")
}

pub fn config_path(settings_dir: &Path) -> PathBuf {
    settings_dir.join("config.toml")
}

#[cfg(test)]
impl Default for Settings {
    fn default() -> Self {
        Self::parse(default_settings_text(), Path::new("<embedded>")).unwrap()
    }
}

impl Settings {
    /// Loads `config.toml` from the settings directory, writing the bundled
    /// default there first if it does not exist yet.
    pub fn load_or_install_default(settings_dir: &Path) -> Result<Self> {
        fs::create_dir_all(settings_dir)?;
        let path = config_path(settings_dir);
        if !path.exists() {
            fs::write(&path, default_settings_text())?;
            info!("installed default config at {}", path.display());
        }
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        Self::parse(&txt, path)
    }

    fn parse(txt: &str, path: &Path) -> Result<Self> {
        let settings: Settings =
            toml::from_str(txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
        validate_settings(&settings)?;
        Ok(settings)
    }
}

fn validate_settings(s: &Settings) -> Result<()> {
    let d = &s.discovery;
    if d.query_timeout_secs == 0
        || s.control.write_timeout_secs == 0
        || s.control.list_timeout_secs == 0
    {
        return Err(anyhow!("timeouts must be positive durations"));
    }
    if d.query_command.is_empty() || d.query_command[0].trim().is_empty() {
        return Err(anyhow!("discovery.query_command must name a program"));
    }
    if d.keywords.iter().all(|k| k.trim().is_empty()) {
        return Err(anyhow!("discovery.keywords needs at least one keyword"));
    }
    if d.fallback.is_empty() {
        return Err(anyhow!("discovery.fallback needs at least one device node"));
    }
    for f in &d.fallback {
        if event_index(f).is_none() {
            return Err(anyhow!("fallback '{}' is not an eventN device node", f));
        }
    }
    if !d.control_template.contains(INDEX_PLACEHOLDER) {
        return Err(anyhow!(
            "discovery.control_template must contain {}",
            INDEX_PLACEHOLDER
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_default_is_valid() {
        let s = Settings::parse(default_settings_text(), Path::new("default.toml")).unwrap();
        assert_eq!(s.discovery.input_dir, PathBuf::from("/dev/input"));
        assert_eq!(s.discovery.fallback.len(), 4);
        assert_eq!(s.discovery.fallback[0], "/dev/input/event0");
        assert_eq!(s.discovery.keywords, vec!["touchscreen", "touch"]);
        assert_eq!(s.discovery.query_timeout(), Duration::from_secs(5));
        assert_eq!(s.control.write_timeout(), Duration::from_secs(10));
        assert_eq!(s.control.privilege_command, vec!["sudo"]);
        assert_eq!(
            s.discovery.control_template,
            "/sys/class/input/event{index}/uevent"
        );
    }

    #[test]
    fn install_writes_default_once() {
        let dir = tempfile::tempdir().unwrap();
        let settings_dir = dir.path().join("settings");

        Settings::load_or_install_default(&settings_dir).unwrap();
        let path = config_path(&settings_dir);
        assert!(path.exists());

        // user edits survive a second load
        let edited = default_settings_text().replace("write_timeout_secs = 10", "write_timeout_secs = 3");
        fs::write(&path, edited).unwrap();
        let s = Settings::load_or_install_default(&settings_dir).unwrap();
        assert_eq!(s.control.write_timeout_secs, 3);
    }

    #[test]
    fn rejects_zero_timeout() {
        let txt = default_settings_text().replace("query_timeout_secs = 5", "query_timeout_secs = 0");
        let err = Settings::parse(&txt, Path::new("x.toml")).unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn rejects_template_without_index() {
        let txt = default_settings_text().replace("event{index}", "event0");
        assert!(Settings::parse(&txt, Path::new("x.toml")).is_err());
    }

    #[test]
    fn rejects_non_event_fallback() {
        let txt = default_settings_text().replace("\"/dev/input/event3\"", "\"/dev/input/mouse0\"");
        let err = Settings::parse(&txt, Path::new("x.toml")).unwrap_err();
        assert!(err.to_string().contains("mouse0"));
    }

    #[test]
    fn privilege_command_may_be_omitted() {
        let txt = default_settings_text().replace("privilege_command = [\"sudo\"]\n", "");
        let s = Settings::parse(&txt, Path::new("x.toml")).unwrap();
        assert!(s.control.privilege_command.is_empty());
    }
}
