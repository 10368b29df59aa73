use anyhow::Result;
use clap::Parser;
use gdoc_flatten::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Credential paths may come from a local .env file.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    tracing::debug!("gdoc-flatten starting");

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "gdoc-flatten failed");
        return Err(e);
    }
    Ok(())
}
