use std::path::PathBuf;

use clap::Parser;

/// Command-line flags of the `melt` driver.
#[derive(Parser, Debug)]
#[command(name = "melt", version, about = "MELT persistent object substrate")]
pub struct Cli {
    /// Print N freshly drawn serials and object ids, then exit
    #[arg(long, value_name = "N")]
    pub serial: Option<usize>,

    /// Load a dumped store from this directory
    #[arg(long, value_name = "DIR")]
    pub load: Option<PathBuf>,

    /// Build a small demonstration object graph
    #[arg(long)]
    pub demo: bool,

    /// Dump the object graph into this directory
    #[arg(long, value_name = "DIR")]
    pub dump: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
