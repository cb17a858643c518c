//! Answers every `Echo` request with the content it was sent, over a real
//! MQTT broker. The in-process counterpart to this round trip is exercised
//! directly in `messaging-core`'s and `messaging-proxy`'s test suites; this
//! binary is for poking at a live broker by hand.

use clap::Parser;
use messaging::{Adapter, AdapterSettingsBuilder, Handlers, MqttEngine, MqttSettingsBuilder, RespCode};

#[derive(Parser, Debug)]
#[command(name = "echo_server", about = "answers every Echo request with its own content")]
struct Opt {
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    #[arg(short, long, default_value_t = 1883)]
    port: u16,

    #[arg(short, long, default_value = "EchoServer")]
    module: String,

    #[arg(long, default_value = "")]
    prefix: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::parse();

    let client_id = format!("{}-{}", opt.module, std::process::id());
    let mqtt = MqttSettingsBuilder::new(opt.host.clone(), opt.port, client_id).build();
    let settings = AdapterSettingsBuilder::new(opt.module.clone()).prefix(opt.prefix).build();

    let handlers = Handlers::new().on_request(|header, content| {
        log::info!("{} asked {}/{} with {} bytes", header.from, header.to, header.route, content.len());
        (RespCode::Success, content)
    });

    let adapter = Adapter::new(settings, MqttEngine::new(mqtt), handlers);
    adapter.link().await?;
    adapter.wait_linked().await;
    log::info!("{} linked to {}:{}, echoing requests (ctrl-c to stop)", opt.module, opt.host, opt.port);

    tokio::signal::ctrl_c().await?;
    adapter.stop().await?;
    Ok(())
}
