mod cli;
mod commands;
mod config;
mod source;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Search {
            target,
            start,
            goal,
            max_hops,
            max_offset,
            word_size,
            json,
        } => {
            let options = commands::search::SearchOptions {
                start,
                goal,
                max_hops,
                max_offset,
                word_size,
                json,
            };
            commands::search::handle(&target, options)?;
        }

        Commands::Regions {
            target,
            analyze,
            word_size,
        } => {
            commands::regions::handle(&target, analyze, word_size)?;
        }

        Commands::Configure {
            max_hops,
            max_offset,
            word_size,
            show,
        } => {
            commands::configure::handle(max_hops, max_offset, word_size, show)?;
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout only carries results
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "ptrchain=debug,ptrchain_cli=debug"
    } else {
        "ptrchain=info,ptrchain_cli=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
