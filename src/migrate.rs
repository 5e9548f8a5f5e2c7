//! Host-managed directories and relocation of legacy files.

use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::{
    env,
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

const APP: &str = "touchtoggle";
const LEGACY: &str = "touchscreen-toggle";
const LEGACY_USER_DIR: &str = "decky-touchscreen-toggle";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostDirs {
    pub host_home: PathBuf,
    pub user_home: PathBuf,
    pub settings_dir: PathBuf,
    pub log_dir: PathBuf,
    pub runtime_dir: PathBuf,
}

impl HostDirs {
    pub fn from_env() -> Result<Self> {
        let home = UserDirs::new()
            .map(|d| d.home_dir().to_path_buf())
            .ok_or_else(|| anyhow!("cannot determine home directory"))?;
        Ok(Self::resolve(|k| env::var_os(k), home))
    }

    // host-provided variables win; anything unset derives from `home`
    pub fn resolve(lookup: impl Fn(&str) -> Option<OsString>, home: PathBuf) -> Self {
        let var = |k: &str| lookup(k).filter(|v| !v.is_empty()).map(PathBuf::from);
        let user_home = var("DECKY_USER_HOME").unwrap_or(home);
        Self {
            host_home: var("DECKY_HOME").unwrap_or_else(|| user_home.join("homebrew")),
            settings_dir: var("DECKY_PLUGIN_SETTINGS_DIR")
                .unwrap_or_else(|| user_home.join(".config").join(APP)),
            log_dir: var("DECKY_PLUGIN_LOG_DIR")
                .unwrap_or_else(|| user_home.join(".local").join("state").join(APP)),
            runtime_dir: var("DECKY_PLUGIN_RUNTIME_DIR")
                .unwrap_or_else(|| user_home.join(".local").join("run").join(APP)),
            user_home,
        }
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(format!("{APP}.log"))
    }

    pub fn socket_path(&self) -> PathBuf {
        self.runtime_dir.join(format!("{APP}.sock"))
    }

    fn legacy_config(&self) -> PathBuf {
        self.user_home.join(".config").join(LEGACY_USER_DIR)
    }

    pub fn legacy_sources(&self) -> Vec<(PathBuf, &Path)> {
        vec![
            (
                self.legacy_config().join(format!("{LEGACY}.log")),
                self.log_dir.as_path(),
            ),
            (
                self.host_home.join("settings").join(format!("{LEGACY}.json")),
                self.settings_dir.as_path(),
            ),
            (self.legacy_config(), self.settings_dir.as_path()),
            (self.host_home.join(LEGACY), self.runtime_dir.as_path()),
            (
                self.user_home.join(".local").join("share").join(LEGACY_USER_DIR),
                self.runtime_dir.as_path(),
            ),
        ]
    }
}

/// Moves every legacy source it can and returns the `(from, to)` pairs moved.
pub fn run(dirs: &HostDirs) -> Vec<(PathBuf, PathBuf)> {
    let mut moved = vec![];
    for (src, dest) in dirs.legacy_sources() {
        if let Err(e) = migrate_any(&src, dest, &mut moved) {
            error!("migrating {} failed: {e}", src.display());
        }
    }
    moved
}

// a file lands in `dest` under its own name; a directory is merged into `dest`
pub fn migrate_any(src: &Path, dest: &Path, moved: &mut Vec<(PathBuf, PathBuf)>) -> Result<()> {
    let meta = match fs::symlink_metadata(src) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("nothing to migrate at {}", src.display());
            return Ok(());
        }
        Err(e) => return Err(anyhow!("failed to inspect {}: {e}", src.display())),
    };

    if meta.is_dir() {
        for e in fs::read_dir(src)? {
            let e = e?;
            let target = dest.join(e.file_name());
            if e.file_type()?.is_dir() {
                migrate_any(&e.path(), &target, moved)?;
            } else {
                move_file(&e.path(), &target, moved)?;
            }
        }
        // leave the source behind if anything was skipped
        let _ = fs::remove_dir(src);
        Ok(())
    } else {
        let name = src
            .file_name()
            .ok_or_else(|| anyhow!("{} has no file name", src.display()))?;
        move_file(src, &dest.join(name), moved)
    }
}

fn move_file(src: &Path, to: &Path, moved: &mut Vec<(PathBuf, PathBuf)>) -> Result<()> {
    if to.exists() {
        warn!(
            "not migrating {}: {} already exists",
            src.display(),
            to.display()
        );
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(src, to).is_err() {
        // rename fails across filesystems
        fs::copy(src, to)
            .map_err(|e| anyhow!("failed to copy {} to {}: {e}", src.display(), to.display()))?;
        fs::remove_file(src)?;
    }
    info!("migrated {} -> {}", src.display(), to.display());
    moved.push((src.to_path_buf(), to.to_path_buf()));
    Ok(())
}
