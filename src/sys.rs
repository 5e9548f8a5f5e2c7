//! Device probing and the privileged control write, via bounded subprocesses.

use log::debug;
use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::config::Settings;
use crate::error::CommandError;
use crate::locator::event_index;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub trait DeviceProbe {
    // existing `eventN` nodes, ascending `N`
    fn enumerate(&self) -> Vec<String>;
    fn exists(&self, path: &str) -> bool;
    fn query_info(&self, path: &str) -> Result<String, CommandError>;
    fn is_listable(&self, path: &str) -> Result<bool, CommandError>;
}

pub trait PrivilegedWriter {
    fn write(&self, path: &str, value: &str) -> Result<(), CommandError>;
}

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

fn describe(cmd: &Command) -> String {
    let mut s = cmd.get_program().to_string_lossy().into_owned();
    for a in cmd.get_args() {
        s.push(' ');
        s.push_str(&a.to_string_lossy());
    }
    s
}

fn spawn_reader<R: Read + Send + 'static>(mut r: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = r.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(reader: Option<JoinHandle<String>>) -> String {
    reader.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Runs `cmd` to completion, killing it once `timeout` has elapsed.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CommandOutput, CommandError> {
    let command = describe(&cmd);
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| CommandError::Spawn {
            command: command.clone(),
            source,
        })?;

    // drain pipes concurrently so a chatty child cannot block on a full pipe
    let out = child.stdout.take().map(spawn_reader);
    let err = child.stderr.take().map(spawn_reader);

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CommandError::Timeout { command, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => return Err(CommandError::Spawn { command, source }),
        }
    };

    Ok(CommandOutput {
        status,
        stdout: collect(out),
        stderr: collect(err),
    })
}

fn require_success(command: String, out: CommandOutput) -> Result<CommandOutput, CommandError> {
    if out.status.success() {
        Ok(out)
    } else {
        Err(CommandError::Failed {
            command,
            status: out.status.to_string(),
            stderr: out.stderr.trim().to_string(),
        })
    }
}

pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

pub fn list_event_nodes(dir: &Path) -> Vec<PathBuf> {
    let mut nodes: Vec<(u32, PathBuf)> = vec![];
    if let Ok(rd) = fs::read_dir(dir) {
        for e in rd.flatten() {
            let p = e.path();
            if let Some(n) = p.to_str().and_then(event_index) {
                nodes.push((n, p));
            }
        }
    }
    nodes.sort();
    nodes.into_iter().map(|(_, p)| p).collect()
}

#[derive(Debug, Clone)]
pub struct HostProbe {
    input_dir: PathBuf,
    query_command: Vec<String>,
    query_timeout: Duration,
    list_timeout: Duration,
}

impl HostProbe {
    pub fn new(settings: &Settings) -> Self {
        Self {
            input_dir: settings.discovery.input_dir.clone(),
            query_command: settings.discovery.query_command.clone(),
            query_timeout: settings.discovery.query_timeout(),
            list_timeout: settings.control.list_timeout(),
        }
    }
}

impl DeviceProbe for HostProbe {
    fn enumerate(&self) -> Vec<String> {
        list_event_nodes(&self.input_dir)
            .into_iter()
            .map(|p| p.display().to_string())
            .collect()
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn query_info(&self, path: &str) -> Result<String, CommandError> {
        let (program, args) = match self.query_command.split_first() {
            Some(split) => split,
            None => {
                return Err(CommandError::Spawn {
                    command: String::new(),
                    source: std::io::Error::other("empty query command"),
                });
            }
        };
        let mut cmd = Command::new(program);
        cmd.args(args).arg(path);
        // a nonzero exit still yields whatever text was printed
        let out = run_with_timeout(cmd, self.query_timeout)?;
        debug!(
            "{path}: {} bytes of device info ({})",
            out.stdout.len(),
            out.status
        );
        Ok(out.stdout)
    }

    fn is_listable(&self, path: &str) -> Result<bool, CommandError> {
        let mut cmd = Command::new("ls");
        cmd.arg(path);
        let out = run_with_timeout(cmd, self.list_timeout)?;
        Ok(out.status.success())
    }
}

// `<privilege_command> sh -c "echo '<v>' > <path>"`
#[derive(Debug, Clone)]
pub struct SudoWriter {
    privilege_command: Vec<String>,
    timeout: Duration,
}

impl SudoWriter {
    pub fn new(settings: &Settings) -> Self {
        Self {
            privilege_command: settings.control.privilege_command.clone(),
            timeout: settings.control.write_timeout(),
        }
    }

    fn command(&self, path: &str, value: &str) -> Command {
        let script = format!("echo {} > {}", shell_quote(value), shell_quote(path));
        let mut cmd = match self.privilege_command.split_first() {
            Some((program, args)) => {
                let mut c = Command::new(program);
                c.args(args).arg("sh");
                c
            }
            None => Command::new("sh"),
        };
        cmd.arg("-c").arg(script);
        cmd
    }
}

impl PrivilegedWriter for SudoWriter {
    fn write(&self, path: &str, value: &str) -> Result<(), CommandError> {
        let cmd = self.command(path, value);
        let command = describe(&cmd);
        require_success(command, run_with_timeout(cmd, self.timeout)?)?;
        Ok(())
    }
}
