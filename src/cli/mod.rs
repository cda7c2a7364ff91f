//! CLI module - Command-line interface for varsite
//!
//! This module provides a structured CLI using clap for argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// varsite - community website with news and an admin publishing workflow
#[derive(Parser)]
#[command(name = "varsite")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the default locations
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the web server (default)
    Serve,

    /// Apply migrations and create the admin account if there are no users
    Migrate,

    /// Create a default config.toml in the current directory
    Init,

    /// List user accounts
    #[command(alias = "ls")]
    Users,
}

impl Cli {
    #[must_use]
    pub fn command_or_default(&self) -> Commands {
        self.command.unwrap_or(Commands::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::parse_from(["varsite"]);
        assert_eq!(cli.command_or_default(), Commands::Serve);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parses_subcommands() {
        let cli = Cli::parse_from(["varsite", "migrate", "--config", "site.toml"]);
        assert_eq!(cli.command_or_default(), Commands::Migrate);
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));

        assert_eq!(Cli::parse_from(["varsite", "ls"]).command_or_default(), Commands::Users);
    }
}
