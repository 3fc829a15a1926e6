//! Configuration CLI commands.
//!
//! Provides `config list` and `config path`.

use std::path::Path;

use clap::Subcommand;
use pamphlet::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(
    command: ConfigCommands,
    config: &ConfigFile,
    override_path: Option<&Path>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::List => {
            print!("{}", render_list(config));
            Ok(())
        }
        ConfigCommands::Path => {
            let path = override_path
                .map(Path::to_path_buf)
                .unwrap_or_else(config_file_path);
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn render_list(config: &ConfigFile) -> String {
    let mut out = String::from("Configuration Settings\n======================\n");
    let mut current_section = "";

    for (section, key, value) in config.entries() {
        // Print section header when section changes
        if section != current_section {
            out.push('\n');
            out.push_str(&format!("[{}]\n", section));
            current_section = section;
        }

        if value.is_empty() {
            out.push_str(&format!("  {} = (not set)\n", key));
        } else {
            out.push_str(&format!("  {} = {}\n", key, value));
        }
    }

    out
}
