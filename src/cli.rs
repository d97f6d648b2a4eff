use std::path::PathBuf;

use clap::Parser;

use crate::checker::CheckOptions;

/// Command line surface: one project path plus the warning-promotion flag.
#[derive(Parser, Debug, Clone)]
#[command(name = "validate-ccpn")]
#[command(about = "check the integrity of a ccpn V3 project and report errors and warnings")]
#[command(version)]
pub struct Cli {
    /// Project directory to check
    #[arg(help = "the path to the project to check")]
    pub project_path: PathBuf,

    /// Treat warnings as errors
    #[arg(
        short = 'w',
        long = "warnings-are-errors",
        help = "treat warnings as errors"
    )]
    pub warnings_are_errors: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl CheckOptions {
    /// Options for this invocation: the flag comes from the command line,
    /// the data directories from the environment or their defaults.
    pub fn from_cli(cli: &Cli) -> Self {
        CheckOptions {
            warnings_are_errors: cli.warnings_are_errors,
            ..CheckOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_a_bare_project_path() {
        let cli = Cli::try_parse_from(["validate-ccpn", "/tmp/alpha.ccpn"]).unwrap();
        assert_eq!(cli.project_path, PathBuf::from("/tmp/alpha.ccpn"));
        assert!(!cli.warnings_are_errors);
    }

    #[test]
    fn test_short_and_long_warning_flags() {
        let cli = Cli::try_parse_from(["validate-ccpn", "-w", "proj.ccpn"]).unwrap();
        assert!(cli.warnings_are_errors);

        let cli =
            Cli::try_parse_from(["validate-ccpn", "--warnings-are-errors", "proj.ccpn"]).unwrap();
        assert!(cli.warnings_are_errors);
    }

    #[test]
    fn test_missing_path_is_rejected() {
        assert!(Cli::try_parse_from(["validate-ccpn"]).is_err());
    }

    #[test]
    fn test_options_carry_the_promotion_flag() {
        let cli = Cli::try_parse_from(["validate-ccpn", "-w", "p.ccpn"]).unwrap();
        let options = CheckOptions::from_cli(&cli);
        assert!(options.warnings_are_errors);
    }
}
