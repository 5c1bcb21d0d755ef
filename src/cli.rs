//! Command-line argument parsing

use crate::engine::{RunMode, RunOptions};
use crate::protocols::Timeouts;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Move files between local directories, remote sites and archives as
/// described by a YAML profile file
#[derive(Parser, Debug)]
#[command(name = crate::PROGRAM_NAME, version = crate::PROGRAM_VERSION, about, long_about = None)]
pub struct Args {
    /// Configuration file to use
    pub conf_file: PathBuf,

    /// Run only the specified profile; otherwise all are run
    #[arg(short, long, conflicts_with = "checkconf")]
    pub profile: Option<String>,

    /// Check the configuration file, no files are moved
    #[arg(short = 'c', long)]
    pub checkconf: bool,

    /// Log INFO lines as well
    #[arg(short, long)]
    pub verbose: bool,

    /// Append log lines to this file instead of stdout
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Connect timeout in seconds
    #[arg(short = 't', long = "timeout", default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,
}

impl Args {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            mode: if self.checkconf {
                RunMode::ValidateOnly
            } else {
                RunMode::Execute
            },
            profile: self.profile.clone(),
            ..RunOptions::default()
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.timeout),
            ..Timeouts::default()
        }
    }
}

/// Parses the process arguments, exiting with usage on error
pub fn parse_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_and_checkconf_conflict() {
        let result = Args::try_parse_from(["ltsmover", "send.yaml", "-p", "vendor", "-c"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["ltsmover", "send.yaml"]).unwrap();
        assert_eq!(args.conf_file, PathBuf::from("send.yaml"));
        assert!(!args.verbose);
        assert_eq!(args.run_options().mode, RunMode::Execute);
        assert_eq!(args.timeouts().connect, Duration::from_secs(15));
    }

    #[test]
    fn test_all_flags() {
        let args = Args::try_parse_from([
            "ltsmover", "-v", "-l", "/var/log/ltsmover.log", "-t", "30", "send.yaml", "--profile", "vendor",
        ])
        .unwrap();
        assert!(args.verbose);
        assert_eq!(args.log_file, Some(PathBuf::from("/var/log/ltsmover.log")));
        assert_eq!(args.timeouts().connect, Duration::from_secs(30));
        let options = args.run_options();
        assert_eq!(options.profile.as_deref(), Some("vendor"));

        let check = Args::try_parse_from(["ltsmover", "-c", "send.yaml"]).unwrap();
        assert_eq!(check.run_options().mode, RunMode::ValidateOnly);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(Args::try_parse_from(["ltsmover", "-t", "0", "send.yaml"]).is_err());
    }
}
