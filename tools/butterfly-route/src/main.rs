use anyhow::Result;
use butterfly_route::cli::Cli;
use clap::Parser;

fn main() -> Result<()> {
    Cli::parse().run()
}
