use clap::Parser;
use env_logger::Env;
use log::info;
use server::config::{MatchConfig, ServerConfig};
use server::network::Server;
use shared::{PlayField, DEFAULT_MATCH_DURATION, DEFAULT_MAX_ASTEROIDS, DEFAULT_PORT, DEFAULT_TICK_RATE};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Match length in seconds
    #[arg(short = 'd', long, default_value_t = DEFAULT_MATCH_DURATION)]
    match_duration: u32,

    /// Asteroids kept alive on the field
    #[arg(short = 'a', long, default_value_t = DEFAULT_MAX_ASTEROIDS)]
    max_asteroids: usize,

    /// Ships colliding with each other both take damage
    #[arg(long)]
    ship_collisions: bool,

    /// File that finished matches are appended to
    #[arg(long, default_value = "winners.txt")]
    results_file: PathBuf,

    /// Do not write match results
    #[arg(long)]
    no_results: bool,

    /// Seed for asteroid spawns
    #[arg(long)]
    seed: Option<u64>,

    /// Milliseconds a socket write may block before the slot is dropped
    #[arg(long, default_value = "2000")]
    write_timeout_ms: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            tick_rate: self.tick_rate,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            results_path: (!self.no_results).then_some(self.results_file),
            match_config: MatchConfig {
                field: PlayField::default(),
                duration: Duration::from_secs(u64::from(self.match_duration)),
                max_asteroids: self.max_asteroids,
                ship_collisions: self.ship_collisions,
                seed: self.seed,
            },
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();

    info!("Starting server...");
    info!(
        "Tick rate {}Hz, match {}s, {} asteroids, ship collisions {}",
        config.tick_rate,
        config.match_config.duration.as_secs(),
        config.match_config.max_asteroids,
        if config.match_config.ship_collisions { "on" } else { "off" }
    );
    if let Some(path) = &config.results_path {
        info!("Recording results to {}", path.display());
    }

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
