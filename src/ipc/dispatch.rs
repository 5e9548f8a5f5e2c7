use serde_json::{Value, json};

use crate::controller::Outcome;
use crate::plugin::Plugin;
use crate::sys::{DeviceProbe, PrivilegedWriter};

pub struct Reply {
    pub body: Value,
    pub shutdown: bool,
}

impl Reply {
    fn keep_running(body: Value) -> Self {
        Self {
            body,
            shutdown: false,
        }
    }
}

fn snapshot<P: DeviceProbe, W: PrivilegedWriter>(plugin: &Plugin<P, W>) -> Value {
    let c = plugin.controller();
    json!({
        "phase": c.phase(),
        "state": c.state(),
        "device": c.handle(),
    })
}

fn outcome_body<P: DeviceProbe, W: PrivilegedWriter>(out: Outcome, plugin: &Plugin<P, W>) -> Value {
    let mut body = json!({"ok": out.ok, "data": snapshot(plugin)});
    if let Some(detail) = out.detail {
        body["error"] = json!(detail);
    }
    body
}

pub fn respond<P: DeviceProbe, W: PrivilegedWriter>(
    req: &Value,
    plugin: &mut Plugin<P, W>,
) -> Reply {
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let out = match op {
        "enable" => plugin.enable_touchscreen(),
        "disable" => plugin.disable_touchscreen(),
        "toggle" => plugin.toggle_touchscreen(),
        "status" => plugin.get_touchscreen_status(),
        "rediscover" => plugin.rediscover(),
        "info" => {
            let mut data = snapshot(plugin);
            data["socket"] = json!(plugin.dirs().socket_path());
            data["pid"] = json!(std::process::id());
            return Reply::keep_running(json!({"ok": true, "data": data}));
        }
        "shutdown" => {
            return Reply {
                body: json!({"ok": true, "data": "shutting down"}),
                shutdown: true,
            };
        }
        _ => {
            return Reply::keep_running(
                json!({"ok": false, "error": format!("unknown op: {op}")}),
            );
        }
    };

    Reply::keep_running(outcome_body(out, plugin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::controller::Controller;
    use crate::controller::tests::{FakeWriter, touch_probe};
    use crate::locator::tests::FakeProbe;
    use crate::migrate::HostDirs;
    use std::path::PathBuf;

    fn plugin(probe: FakeProbe) -> Plugin<FakeProbe, FakeWriter> {
        let controller = Controller::new(probe, FakeWriter::default(), Settings::default().discovery);
        Plugin::new(controller, HostDirs::resolve(|_| None, PathBuf::from("/home/deck")))
    }

    fn call<P: DeviceProbe, W: PrivilegedWriter>(p: &mut Plugin<P, W>, op: &str) -> Value {
        let r = respond(&json!({"op": op}), p);
        assert!(!r.shutdown);
        r.body
    }

    #[test]
    fn toggle_reports_new_state_and_paths() {
        let mut p = plugin(touch_probe());
        let v = call(&mut p, "toggle");
        assert_eq!(v["ok"], json!(true));
        assert_eq!(v["data"]["state"], json!("disabled"));
        assert_eq!(v["data"]["phase"], json!("disabled"));
        assert_eq!(v["data"]["device"]["device_path"], json!("/dev/input/event2"));
        assert_eq!(
            v["data"]["device"]["control_path"],
            json!("/sys/class/input/event2/uevent")
        );
        assert!(v.get("error").is_none());
    }

    #[test]
    fn failure_carries_error_text() {
        let mut p = plugin(FakeProbe::with(&[]));
        let v = call(&mut p, "enable");
        assert_eq!(v["ok"], json!(false));
        assert_eq!(v["error"], json!("no touchscreen device found"));
        assert_eq!(v["data"]["phase"], json!("uninitialized"));
        assert_eq!(v["data"]["device"], Value::Null);
    }

    #[test]
    fn info_does_not_discover() {
        let mut p = plugin(touch_probe());
        let v = call(&mut p, "info");
        assert_eq!(v["ok"], json!(true));
        assert_eq!(v["data"]["phase"], json!("uninitialized"));
        assert_eq!(
            v["data"]["socket"],
            json!("/home/deck/.local/run/touchtoggle/touchtoggle.sock")
        );
    }

    #[test]
    fn status_then_rediscover() {
        let mut p = plugin(touch_probe());
        assert_eq!(call(&mut p, "status")["ok"], json!(true));
        let v = call(&mut p, "rediscover");
        assert_eq!(v["ok"], json!(true));
        assert_eq!(v["data"]["phase"], json!("enabled"));
    }

    #[test]
    fn unknown_op_is_rejected() {
        let mut p = plugin(touch_probe());
        let r = respond(&json!({"cmd": "x"}), &mut p);
        assert_eq!(r.body["error"], json!("unknown op: "));
        let v = call(&mut p, "reboot");
        assert_eq!(v["error"], json!("unknown op: reboot"));
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let mut p = plugin(touch_probe());
        let r = respond(&json!({"op": "shutdown"}), &mut p);
        assert!(r.shutdown);
        assert_eq!(r.body["ok"], json!(true));
    }
}
