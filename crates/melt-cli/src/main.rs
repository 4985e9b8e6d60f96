use anyhow::Result;
use clap::Parser;
use tracing::Level;

mod cli;
mod commands;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    if let Some(count) = cli.serial {
        commands::print_serials(count);
        return Ok(());
    }

    let world = commands::World::new();
    if let Some(dir) = &cli.load {
        commands::load(&world, dir)?;
    }
    if cli.demo {
        commands::demo(&world)?;
    }
    if let Some(dir) = &cli.dump {
        commands::dump(&world, dir)?;
    }
    Ok(())
}
