use std::env;
use std::sync::Arc;

use ubnt_discover::config::EngineConfig;
use ubnt_discover::device::Device;
use ubnt_discover::engine::Engine;
use ubnt_discover::logger;

struct Settings {
    interfaces: Vec<String>,
    syslog: bool,
}

impl Settings {
    fn parse(args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut interfaces = Vec::new();
        let mut syslog = false;

        for arg in args {
            match arg.as_str() {
                "--syslog" => syslog = true,
                other if other.starts_with("--") => {
                    anyhow::bail!("unknown flag: {other}")
                }
                other => interfaces.push(other.to_string()),
            }
        }

        if interfaces.is_empty() {
            anyhow::bail!("usage: ubnt-discover [--syslog] <interface>...");
        }

        Ok(Self { interfaces, syslog })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse(env::args().skip(1))?;
    logger::init(settings.syslog);

    let notify: ubnt_discover::registry::NotifySink = Arc::new(|device: Device| {
        println!("found new device:\n{device}");
    });

    let engine = Engine::auto_discover(Some(notify), &settings.interfaces, EngineConfig::default())
        .await
        .map_err(|err| anyhow::anyhow!(err))?;

    wait_for_shutdown_signal().await;
    tracing::info!("shutting down");
    engine.close().await;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}
