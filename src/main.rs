use anyhow::Result;
use clap::Parser;
use medreport_analyzer::cli;
use tracing::error;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        error!("{:#}", err);
        // Config and logging setup errors happen before a subscriber exists.
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
