use anyhow::{Result, anyhow};
use log::{error, info};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    fs,
    io::{self, BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use super::dispatch::respond;
use crate::config::Settings;
use crate::logging;
use crate::migrate::HostDirs;
use crate::plugin::Plugin;
use crate::sys::{DeviceProbe, PrivilegedWriter};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn run_daemon() -> Result<()> {
    let dirs = HostDirs::from_env()?;
    logging::init_to_file(&dirs.log_file());
    let settings = Settings::load_or_install_default(&dirs.settings_dir)?;

    // socket
    fs::create_dir_all(&dirs.runtime_dir)?;
    let sock = dirs.socket_path();
    if daemon_running(&sock) {
        return Err(anyhow!("daemon already listening on {}", sock.display()));
    }
    if sock.exists() {
        let _ = fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // signals
    let stop = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let flag = stop.clone();
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("daemon: received signal {sig}");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let mut plugin = Plugin::from_settings(&settings, dirs);
    plugin.migration();
    plugin.main();

    serve(&listener, &mut plugin, &stop)?;

    plugin.unload();
    let _ = fs::remove_file(&sock);
    info!("daemon: stopped");
    Ok(())
}

/// Handles one client at a time until a shutdown request or `stop` is set.
fn serve<P: DeviceProbe, W: PrivilegedWriter>(
    listener: &UnixListener,
    plugin: &mut Plugin<P, W>,
    stop: &AtomicBool,
) -> Result<()> {
    listener.set_nonblocking(true)?;
    while !stop.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, _)) => match handle_client(stream, plugin) {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => error!("ipc client error: {e}"),
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                error!("accept failed: {e}");
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
    Ok(())
}

/// Returns whether the client asked the daemon to shut down.
fn handle_client<P: DeviceProbe, W: PrivilegedWriter>(
    mut stream: UnixStream,
    plugin: &mut Plugin<P, W>,
) -> Result<bool> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(CLIENT_TIMEOUT))?;

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(false);
    }

    let reply = match serde_json::from_str::<serde_json::Value>(&line) {
        Ok(req) => respond(&req, plugin),
        Err(e) => {
            let body = serde_json::json!({"ok": false, "error": format!("bad request: {e}")});
            writeln!(stream, "{body}")?;
            return Ok(false);
        }
    };

    writeln!(stream, "{}", reply.body)?;
    Ok(reply.shutdown)
}

// client helper
pub fn client_request(socket: &Path, req: serde_json::Value) -> Result<serde_json::Value> {
    if !socket.exists() {
        return Err(anyhow!(
            "touchtoggle daemon is not running (socket missing at {})",
            socket.display()
        ));
    }
    let mut stream = UnixStream::connect(socket)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}

// a stale socket file left by a crashed daemon does not count
pub fn daemon_running(socket: &Path) -> bool {
    client_request(socket, serde_json::json!({"op": "info"})).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::controller::tests::{FakeWriter, touch_probe};
    use crate::locator::tests::FakeProbe;
    use std::path::PathBuf;

    fn plugin() -> Plugin<FakeProbe, FakeWriter> {
        let controller = Controller::new(
            touch_probe(),
            FakeWriter::default(),
            Settings::default().discovery,
        );
        Plugin::new(controller, HostDirs::resolve(|_| None, PathBuf::from("/home/deck")))
    }

    #[test]
    fn serves_requests_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("t.sock");
        let listener = UnixListener::bind(&sock).unwrap();

        let client_sock = sock.clone();
        let client = thread::spawn(move || {
            let a = client_request(&client_sock, serde_json::json!({"op": "toggle"})).unwrap();
            let b = client_request(&client_sock, serde_json::json!({"op": "status"})).unwrap();
            let c = client_request(&client_sock, serde_json::json!({"op": "shutdown"})).unwrap();
            (a, b, c)
        });

        let mut p = plugin();
        let stop = AtomicBool::new(false);
        serve(&listener, &mut p, &stop).unwrap();

        let (a, b, c) = client.join().unwrap();
        assert_eq!(a["data"]["state"], serde_json::json!("disabled"));
        assert_eq!(b["ok"], serde_json::json!(true));
        assert_eq!(c["data"], serde_json::json!("shutting down"));
        assert_eq!(p.controller().state(), crate::controller::ToggleState::Disabled);
    }

    #[test]
    fn malformed_line_gets_error_reply() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("t.sock");
        let listener = UnixListener::bind(&sock).unwrap();

        let client_sock = sock.clone();
        let client = thread::spawn(move || {
            let mut s = UnixStream::connect(&client_sock).unwrap();
            s.write_all(b"not json\n").unwrap();
            let mut resp = String::new();
            BufReader::new(s).read_line(&mut resp).unwrap();
            client_request(&client_sock, serde_json::json!({"op": "shutdown"})).unwrap();
            resp
        });

        let mut p = plugin();
        serve(&listener, &mut p, &AtomicBool::new(false)).unwrap();
        let resp: serde_json::Value = serde_json::from_str(&client.join().unwrap()).unwrap();
        assert_eq!(resp["ok"], serde_json::json!(false));
        assert!(resp["error"].as_str().unwrap().starts_with("bad request"));
    }

    #[test]
    fn running_daemon_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("t.sock");
        let listener = UnixListener::bind(&sock).unwrap();

        let client_sock = sock.clone();
        let client = thread::spawn(move || {
            let up = daemon_running(&client_sock);
            client_request(&client_sock, serde_json::json!({"op": "shutdown"})).unwrap();
            up
        });

        serve(&listener, &mut plugin(), &AtomicBool::new(false)).unwrap();
        assert!(client.join().unwrap());
    }

    #[test]
    fn stale_socket_file_is_not_a_running_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("t.sock");
        drop(UnixListener::bind(&sock).unwrap());
        assert!(sock.exists());
        assert!(!daemon_running(&sock));
        assert!(!daemon_running(&dir.path().join("missing.sock")));
    }

    #[test]
    fn missing_socket_means_not_running() {
        let err = client_request(Path::new("/nonexistent/t.sock"), serde_json::json!({"op": "info"}))
            .unwrap_err();
        assert!(err.to_string().contains("not running"));
    }
}
