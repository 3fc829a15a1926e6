//! Pamphlet CLI - serve, publish and view tiled pamphlets.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pamphlet::config::ConfigFile;
use pamphlet::logging::init_logging;

use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use commands::manage::ManageArgs;
use commands::publish::PublishArgs;
use commands::serve::ServeArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "pamphlet", version, about, long_about = None)]
struct Cli {
    /// Use this config file instead of ~/.pamphlet/config.ini
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP tile service
    Serve(ServeArgs),

    /// Tile page images and publish them as a pamphlet
    Publish(PublishArgs),

    /// Bump a pamphlet's version so every cache key changes
    Invalidate(ManageArgs),

    /// Delete a pamphlet's tiles and metadata
    Delete(ManageArgs),

    /// Load one page's tiles through the client loader
    Fetch(FetchArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn load_config(path: Option<&PathBuf>) -> Result<ConfigFile, CliError> {
    Ok(match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    })
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_ref())?;

    let command = match cli.command {
        Commands::Config(command) => {
            return commands::config::run(command, &config, cli.config.as_deref())
        }
        other => other,
    };

    let _guard = init_logging(config.logging.directory.as_deref(), cli.verbose)?;
    tracing::debug!(version = pamphlet::VERSION, "Starting pamphlet");

    match command {
        Commands::Serve(args) => commands::serve::run(args, config).await,
        Commands::Publish(args) => commands::publish::run(args, config).await,
        Commands::Invalidate(args) => commands::manage::invalidate(args, config).await,
        Commands::Delete(args) => commands::manage::delete(args, config).await,
        Commands::Fetch(args) => commands::fetch::run(args, config).await,
        Commands::Config(_) => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_publish() {
        let cli = Cli::try_parse_from([
            "pamphlet",
            "publish",
            "brochure",
            "page1.png",
            "page2.png",
            "--tile-size",
            "512",
        ])
        .unwrap();
        match cli.command {
            Commands::Publish(args) => {
                assert_eq!(args.id, "brochure");
                assert_eq!(args.images.len(), 2);
                assert_eq!(args.tile_size, 512);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_fetch_viewport() {
        let cli =
            Cli::try_parse_from(["pamphlet", "fetch", "brochure", "--page", "2", "--viewport", "800x600"])
                .unwrap();
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.page, 2);
                assert_eq!(args.viewport, Some((800.0, 600.0)));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.ini");
        std::fs::write(&path, "[server]\nbind = 127.0.0.1:9999\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.bind.port(), 9999);
    }

    #[test]
    fn test_publish_requires_an_image() {
        assert!(Cli::try_parse_from(["pamphlet", "publish", "brochure"]).is_err());
    }
}
