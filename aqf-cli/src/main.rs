//! AQF CLI - Command line tool for collecting air quality readings and
//! forecasting them.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "aqf",
    version,
    about = "Air quality collection and forecasting toolkit"
)]
struct Cli {
    #[command(subcommand)]
    command: aqf_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    log::debug!("starting aqf {}", env!("CARGO_PKG_VERSION"));
    aqf_cmd::run(cli.command).await
}
