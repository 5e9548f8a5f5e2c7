//! Daemon side and client side of the Unix socket protocol: one JSON
//! request line in, one JSON response line out.

mod dispatch;
mod server;

pub use server::{client_request, daemon_running, run_daemon};
