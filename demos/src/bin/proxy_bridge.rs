//! Bridges two MQTT brokers so modules on either one can address each
//! other through a namespace tag (§4.G). Mirrors the original proxy demo's
//! shape — load a config, start one proxy, block forever — but with a TOML
//! config written on first run instead of an embedded YAML file.

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use messaging::{MqttEngine, MqttSettingsBuilder, Proxy, ProxyConfig as ForwardingPolicy, Side};
use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../../proxy.toml");

#[derive(Parser, Debug)]
#[command(name = "proxy_bridge", about = "bridges two MQTT brokers via a namespace-tagging proxy")]
struct Opt {
    #[arg(short, long, default_value = "proxy.toml")]
    config: String,
}

#[derive(Deserialize, Debug)]
struct SideConfig {
    host: String,
    port: u16,
    tag: String,
    #[serde(default)]
    prefix: String,
    client_id: String,
}

impl SideConfig {
    fn into_engine(self) -> MqttEngine {
        MqttEngine::new(MqttSettingsBuilder::new(self.host, self.port, self.client_id).build())
    }
}

#[derive(Deserialize, Debug)]
struct ProxyConfig {
    side_a: SideConfig,
    side_b: SideConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::parse();

    if !Path::new(&opt.config).exists() {
        std::fs::write(&opt.config, DEFAULT_CONFIG).with_context(|| format!("writing default config to {}", opt.config))?;
        log::info!("wrote default config to {}", opt.config);
    }
    let raw = std::fs::read_to_string(&opt.config).with_context(|| format!("reading {}", opt.config))?;
    let config: ProxyConfig = toml::from_str(&raw).context("parsing proxy config")?;

    let tag_a = config.side_a.tag.clone();
    let prefix_a = config.side_a.prefix.clone();
    let tag_b = config.side_b.tag.clone();
    let prefix_b = config.side_b.prefix.clone();

    let proxy = Proxy::new(
        Side::new(tag_a.clone(), prefix_a, config.side_a.into_engine()),
        Side::new(tag_b.clone(), prefix_b, config.side_b.into_engine()),
        ForwardingPolicy::default(),
        None,
    );
    proxy.run().await;
    log::info!("proxy bridging {tag_a} <-> {tag_b}, waiting (ctrl-c to stop)");

    tokio::signal::ctrl_c().await?;
    Ok(())
}
