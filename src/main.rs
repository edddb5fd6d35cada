// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(command) = cli.command else {
        println!("esa-install v{}", env!("CARGO_PKG_VERSION"));
        println!("Run 'esa-install --help' for usage information");
        return Ok(());
    };

    let config = commands::load_config(cli.config.as_deref(), cli.root.as_deref())?;

    match command {
        Commands::Resolve {
            features,
            dir,
            allow_network,
            no_auto,
            products,
        } => commands::cmd_resolve(&config, &features, &dir, allow_network, no_auto, &products),

        Commands::PlanRemoval {
            features,
            force,
            ignore_dependents,
            strict,
        } => commands::cmd_plan_removal(&config, &features, force, &ignore_dependents, strict),

        Commands::FixCheck { fixes } => commands::cmd_fix_check(&config, &fixes),

        Commands::Verify {
            artifact,
            digest,
            algorithm,
            signature,
        } => commands::cmd_verify(
            &config,
            &artifact,
            digest.as_deref(),
            &algorithm,
            signature.as_deref(),
        ),

        Commands::Space { dir, target } => commands::cmd_space(&config, &dir, target.as_deref()),
    }
}
