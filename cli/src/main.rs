use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tendrils_engine::{AutoplayConfig, GameApi, Router};
use tracing_subscriber::EnvFilter;

mod display;
mod http;
mod repl;

use http::HttpApi;

#[derive(Parser)]
#[command(name = "tendrils")]
#[command(about = "Terminal client for the Tendrils combat server")]
struct Cli {
    /// Base URL of the game server
    #[arg(long, env = "TENDRILS_SERVER", default_value = "http://127.0.0.1:8000")]
    server: String,
    /// Bearer token sent with every request
    #[arg(long, env = "TENDRILS_TOKEN")]
    token: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// Pause between auto-play actions, in milliseconds
    #[arg(long, default_value_t = 300)]
    step_delay_ms: u64,
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let api = HttpApi::new(
        &cli.server,
        cli.token,
        Duration::from_secs(cli.timeout_secs),
    )?;

    let info = match api.ping().await {
        Ok(info) => info,
        Err(err) => {
            println!("Cannot reach server at {}. Is it running?", api.base_url());
            display::print_error(&err.to_string());
            return Ok(ExitCode::FAILURE);
        }
    };
    tracing::info!(server = %api.base_url(), "connected");

    println!("{}", display::render_banner(&info));
    println!("Connected to {}", api.base_url());
    println!("Type 'help' for commands.");

    let autoplay = AutoplayConfig {
        step_delay: Duration::from_millis(cli.step_delay_ms),
        ..AutoplayConfig::default()
    };
    let mut repl = repl::Repl::new(Router::new(api), autoplay);
    repl.run().await?;
    Ok(ExitCode::SUCCESS)
}
