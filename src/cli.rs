use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, process::Command};

use crate::config::Settings;
use crate::migrate::{self, HostDirs};
use crate::plugin::Plugin;
use crate::sys::HostProbe;
use crate::{doctor, ipc, locator, logging};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`); it sets up its own file logging
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }
    logging::init();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let sock = HostDirs::from_env()?.socket_path();
            if ipc::daemon_running(&sock) {
                return Err(anyhow!(
                    "touchtoggle daemon is already running (socket {})",
                    sock.display()
                ));
            }
            let exe = env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("touchtoggle: started daemon (pid={})", child.id());
            Ok(())
        }

        Some(op @ ("stop" | "status" | "info" | "enable" | "disable" | "toggle" | "rediscover")) => {
            let op = if op == "stop" { "shutdown" } else { op };
            let dirs = HostDirs::from_env()?;
            let r = ipc::client_request(&dirs.socket_path(), serde_json::json!({ "op": op }))?;
            print_response(&r);
            Ok(())
        }

        Some("discover") => {
            let (settings, _) = load()?;
            let probe = HostProbe::new(&settings);
            let body = match locator::discover(&probe, &settings.discovery) {
                Ok(h) => serde_json::json!({"ok": true, "data": h}),
                Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
            };
            print_response(&body);
            Ok(())
        }

        Some("doctor") => {
            let (settings, dirs) = load()?;
            print_response(&serde_json::json!({"ok": true, "data": doctor::report(&settings, &dirs)}));
            Ok(())
        }

        Some("migrate") => {
            let dirs = HostDirs::from_env()?;
            let moved = migrate::run(&dirs);
            let pairs: Vec<_> = moved
                .iter()
                .map(|(from, to)| serde_json::json!({"from": from, "to": to}))
                .collect();
            print_response(&serde_json::json!({"ok": true, "data": {"moved": pairs}}));
            Ok(())
        }

        Some("uninstall") => {
            let (settings, dirs) = load()?;
            let sock = dirs.socket_path();
            if sock.exists() {
                let r = ipc::client_request(&sock, serde_json::json!({"op": "shutdown"}))?;
                print_response(&r);
            }
            Plugin::from_settings(&settings, dirs).uninstall();
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Err(anyhow!("unknown subcommand: {other}"))
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn load() -> Result<(Settings, HostDirs)> {
    let dirs = HostDirs::from_env()?;
    let settings = Settings::load_or_install_default(&dirs.settings_dir)?;
    Ok((settings, dirs))
}

fn print_help() {
    println!(
        r#"touchtoggle - enable or disable the touchscreen through sysfs

USAGE:
  touchtoggle help [command]     Show general or command-specific help
  touchtoggle start              Start the daemon
  touchtoggle stop               Stop the daemon
  touchtoggle status             Check that the touchscreen node is accessible
  touchtoggle info               Show daemon state without touching the device
  touchtoggle enable             Enable the touchscreen
  touchtoggle disable            Disable the touchscreen
  touchtoggle toggle             Flip the touchscreen state
  touchtoggle rediscover         Forget the cached device and search again
  touchtoggle discover           Run device discovery once, without the daemon
  touchtoggle doctor             Diagnose devices and permissions
  touchtoggle migrate            Move files left by older installs
  touchtoggle uninstall          Stop the daemon and run the uninstall hook

TIPS:
  - Config: ~/.config/touchtoggle/config.toml (or $DECKY_PLUGIN_SETTINGS_DIR)
  - Log filter: TOUCHTOGGLE_LOG=debug
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: touchtoggle start\nStarts the background daemon."),
        "stop" => println!("usage: touchtoggle stop\nStops the running daemon."),
        "status" => println!(
            "usage: touchtoggle status\nReports whether the touchscreen node can be listed, plus phase and paths."
        ),
        "info" => println!("usage: touchtoggle info\nShows phase, device paths, socket and PID."),
        "enable" | "disable" | "toggle" => println!(
            "usage: touchtoggle {cmd}\nWrites the control file through sudo; the state only changes if the write succeeds."
        ),
        "rediscover" => println!(
            "usage: touchtoggle rediscover\nDrops the cached device and runs discovery again; the state is kept."
        ),
        "discover" => println!(
            "usage: touchtoggle discover\nPrints the device and control file discovery would pick."
        ),
        "doctor" => println!(
            "usage: touchtoggle doctor\nLists candidate input nodes, their names and whether they look like a touchscreen."
        ),
        "migrate" => println!(
            "usage: touchtoggle migrate\nMoves legacy log, settings and runtime files into the host directories."
        ),
        "uninstall" => println!("usage: touchtoggle uninstall\nStops the daemon if running."),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
