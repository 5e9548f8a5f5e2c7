use env_logger::{Builder, Env, Target};
use std::{fs::OpenOptions, path::Path};

const FILTER_ENV: &str = "TOUCHTOGGLE_LOG";

fn builder() -> Builder {
    Builder::from_env(Env::default().filter_or(FILTER_ENV, "info"))
}

/// Logs to stderr. Filter with `TOUCHTOGGLE_LOG` (env_logger syntax).
pub fn init() {
    let _ = builder().try_init();
}

/// Appends to `file`, falling back to stderr if it cannot be opened.
pub fn init_to_file(file: &Path) {
    if let Some(parent) = file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match OpenOptions::new().create(true).append(true).open(file) {
        Ok(f) => {
            let _ = builder().target(Target::Pipe(Box::new(f))).try_init();
        }
        Err(e) => {
            init();
            log::warn!("cannot open log file {}: {e}; logging to stderr", file.display());
        }
    }
}
