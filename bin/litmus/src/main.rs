//! The light-client entrypoint: validate the on-chain anchor, then run the tournament over the
//! configured provers and report the survivors.

use clap::Parser;

mod chain_info;
mod cli;
mod judge;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse().init_telemetry()?;
    let verified = cli.run().await?;
    if !verified {
        // Survivors-by-elimination are not a verified chain; make the distinction visible to
        // whatever drives this process.
        std::process::exit(1);
    }
    Ok(())
}
