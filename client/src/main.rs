use clap::Parser;
use client::input::{IdleInput, InputSource, ScriptedInput};
use client::network::{Client, ClientConfig};
use env_logger::Env;
use log::info;
use shared::{validate_slot, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host to connect to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Player slot to claim (0 or 1)
    #[arg(short, long, default_value = "0")]
    slot: i64,

    /// Reconnect attempts after a lost connection
    #[arg(short, long, default_value = "5")]
    reconnect_attempts: u32,

    /// Frames per second for prediction and pose reports
    #[arg(short, long, default_value = "60")]
    frame_rate: u32,

    /// Fly forward and fire instead of idling
    #[arg(long)]
    patrol: bool,
}

async fn run<I: InputSource>(config: ClientConfig, input: I) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = Client::new(config, input);
    client.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let slot = validate_slot(args.slot)?;

    let config = ClientConfig {
        server_addr: format!("{}:{}", args.host, args.port),
        slot,
        reconnect_attempts: args.reconnect_attempts,
        reconnect_delay: Duration::from_secs(1),
        frame_rate: args.frame_rate,
        ..Default::default()
    };

    info!("Starting client...");
    info!("Connecting to {} as slot {}", config.server_addr, slot);

    if args.patrol {
        run(config, ScriptedInput::patrol(15)).await
    } else {
        run(config, IdleInput).await
    }
}
