use anyhow::Result;
use arca::cli::Cli;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    arca::logging::init(cli.verbose);
    cli.run().await
}
