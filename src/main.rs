//! bundlewright - prebuild, inspect and dev-serve component bundles.

mod cli;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }
    bundlewright::logger::set_verbose(cli.verbose);

    let config = cli::common::load_config(&cli)?;

    match &cli.command {
        Commands::Build { minify } => cli::build::run(config, *minify),
        Commands::Serve {
            interface,
            port,
            ws_port,
            watch,
        } => cli::serve::run(config, *interface, *port, *ws_port, *watch),
        Commands::Show { name } => cli::show::run(config, name.as_deref()),
    }
}
