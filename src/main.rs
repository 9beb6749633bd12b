use clap::Parser;
use hivesync::cli::{self, Cli};
use hivesync::config::Config;
use hivesync::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(cli.config_path())?;
    logging::init(&config.logging);

    cli::run(cli, config).await
}
