use clap::Parser;
use tracing_subscriber::EnvFilter;

use bootcamp_api_rust::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    // Errors are already reported in the selected output format
    if let Err(e) = bootcamp_api_rust::cli::run(cli).await {
        if let Ok("true") | Ok("1") = std::env::var("CLI_VERBOSE").as_deref() {
            eprintln!("{e:?}");
        }
        std::process::exit(1);
    }

    Ok(())
}
