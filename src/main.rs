mod cli;
mod config;
mod controller;
mod doctor;
mod error;
mod ipc;
mod locator;
mod logging;
mod migrate;
mod plugin;
mod sys;

fn main() -> anyhow::Result<()> {
    cli::run()
}
