//! Sends one request to a module (by default `echo_server`'s `EchoServer`)
//! and prints the response.

use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use messaging::{Adapter, AdapterSettingsBuilder, Handlers, MqttEngine, MqttSettingsBuilder, Packet};

#[derive(Parser, Debug)]
#[command(name = "echo_client", about = "sends one request and prints the response")]
struct Opt {
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    #[arg(short, long, default_value_t = 1883)]
    port: u16,

    #[arg(short, long, default_value = "EchoClient")]
    module: String,

    #[arg(long, default_value = "")]
    prefix: String,

    #[arg(short, long, default_value = "EchoServer")]
    target: String,

    #[arg(short, long, default_value = "Echo")]
    route: String,

    #[arg(long, default_value = "hello")]
    message: String,

    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::parse();

    let client_id = format!("{}-{}", opt.module, std::process::id());
    let mqtt = MqttSettingsBuilder::new(opt.host.clone(), opt.port, client_id).build();
    let settings = AdapterSettingsBuilder::new(opt.module)
        .prefix(opt.prefix)
        .timeout(Duration::from_millis(opt.timeout_ms))
        .build();

    let adapter = Adapter::new(settings, MqttEngine::new(mqtt), Handlers::new());
    adapter.link().await?;
    adapter.wait_linked().await;

    let response = adapter.req(&opt.target, &opt.route, Bytes::from(opt.message.into_bytes())).await;
    match response {
        Packet::Response { header, content } => {
            println!("{:?} from {}: {}", header.resp_code, opt.target, String::from_utf8_lossy(&content));
        }
        other => println!("unexpected packet in reply: {other:?}"),
    }

    adapter.stop().await?;
    Ok(())
}
