//! Command line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keep a manga library in sync with user-installable source extensions.
#[derive(Parser)]
#[command(name = "hondana")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "HONDANA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Manage source extensions
    Extensions {
        #[command(subcommand)]
        command: ExtensionCommands,
    },

    /// Check favorite manga for new chapters
    Sync {
        /// Keep running, syncing every `sync.interval_secs`
        #[arg(long)]
        watch: bool,
    },

    /// Show updates found by previous syncs
    Updates {
        /// Include updates already marked as seen
        #[arg(long)]
        all: bool,

        /// Mark the listed updates as seen
        #[arg(long)]
        mark_seen: bool,

        /// Maximum number of updates to list
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

#[derive(Subcommand)]
pub(crate) enum ExtensionCommands {
    /// List extensions offered by the repository and their install state
    List,

    /// Install an extension from the repository
    Install {
        /// Source key
        key: String,
    },

    /// Update an installed extension, or every extension with an update
    Update {
        /// Source key (all sources with an update when omitted)
        key: Option<String>,
    },

    /// Uninstall an extension, keeping its library and history
    Uninstall {
        /// Source key
        key: String,

        /// Also delete everything synced from this source
        #[arg(long)]
        purge: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_nested_subcommands() {
        let cli = Cli::try_parse_from(["hondana", "extensions", "uninstall", "alpha", "--purge"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Extensions {
                command: ExtensionCommands::Uninstall { ref key, purge: true }
            } if key == "alpha"
        ));
        let cli = Cli::try_parse_from(["hondana", "updates", "--mark-seen", "--config", "hondana.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("hondana.toml")));
        assert!(matches!(cli.command, Commands::Updates { all: false, mark_seen: true, limit: 50 }));
    }
}
