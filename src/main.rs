mod api;
mod cli;
mod error;
mod logging;
mod model;
mod orchestrator;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;
mod view;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    logging::init_logging(&args)?;
    let is_non_tui = !args.is_tui();

    let res = cli::run(args).await;
    // Exit explicitly on success in scripted modes so a detached download task
    // cannot keep the runtime alive.
    if res.is_ok() && is_non_tui {
        std::process::exit(0);
    }
    res
}
