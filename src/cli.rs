//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Back up lecture recordings from Echo360 course sections.
///
/// Each run downloads the recordings of the configured sections that are not
/// yet in the local index, so repeated runs only fetch what is new.
#[derive(Parser, Debug)]
#[command(name = "lecture-backup")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file [default: ~/.lecture-backup.toml]
    #[arg(long, env = "LECTURE_BACKUP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Netscape-format cookie file exported from a logged-in browser
    /// (overrides `cookie_file` in the configuration)
    #[arg(long, global = true)]
    pub cookies: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Operations the binary can perform. `sync` runs when none is given.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Download every recording that is not yet indexed
    Sync,
    /// List the recordings recorded in the index
    Index {
        /// Print one JSON object per line instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Args {
    /// The requested command, defaulting to `sync`.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["lecture-backup"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.cookies, None);
        assert_eq!(args.command(), Command::Sync);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["lecture-backup", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["lecture-backup", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["lecture-backup", "--verbose", "--verbose"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["lecture-backup", "-q"]).unwrap();
        assert!(args.quiet);

        let args = Args::try_parse_from(["lecture-backup", "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["lecture-backup", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let result = Args::try_parse_from(["lecture-backup", "--version"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let result = Args::try_parse_from(["lecture-backup", "--invalid-flag"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_config_and_cookies_paths() {
        let args = Args::try_parse_from([
            "lecture-backup",
            "--config",
            "/etc/lb.toml",
            "--cookies",
            "/tmp/cookies.txt",
            "sync",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/etc/lb.toml")));
        assert_eq!(args.cookies, Some(PathBuf::from("/tmp/cookies.txt")));
        assert_eq!(args.command(), Command::Sync);
    }

    #[test]
    fn test_cli_index_subcommand_json_flag() {
        let args = Args::try_parse_from(["lecture-backup", "index"]).unwrap();
        assert_eq!(args.command(), Command::Index { json: false });

        let args = Args::try_parse_from(["lecture-backup", "index", "--json"]).unwrap();
        assert_eq!(args.command(), Command::Index { json: true });
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["lecture-backup", "index", "-vv", "-q"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_unknown_subcommand_rejected() {
        let result = Args::try_parse_from(["lecture-backup", "purge"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }
}
