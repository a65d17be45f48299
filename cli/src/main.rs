use clap::Parser;
use gate_cli::Cli;
use gate_cli::build_engine;
use gate_cli::init_logging;
use gate_cli::run_stdin_driver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let engine = build_engine(&cli)?;
    run_stdin_driver(engine, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
