//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

/// Incremental arXiv metadata ingestion into a local SQLite store.
///
/// Pages through the arXiv query API by last-updated date, validates each
/// entry, and keeps article rows, category links and keyword counts current.
#[derive(Parser, Debug)]
#[command(name = "arxin")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/arxin/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Delay between API pages in milliseconds (0 to disable, max 60000)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub delay_ms: Option<u64>,

    /// Directory for rejected entry payloads
    #[arg(long, global = true, value_name = "DIR")]
    pub rejected_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ingest every article last updated within a date range
    ///
    /// Without --start, resumes from the latest stored update (or 1986-01-01
    /// on an empty database). Without --end, runs up to now.
    Backfill {
        /// Range start (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date_arg)]
        start: Option<DateTime<Utc>>,

        /// Range end (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date_arg)]
        end: Option<DateTime<Utc>>,
    },

    /// Create the database and load category and keyword reference tables
    Init,

    /// Delete all articles and reload reference tables
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

/// Parses `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub fn parse_date_arg(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| format!("invalid date '{value}'"));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| format!("invalid date '{value}': expected YYYY-MM-DD or RFC 3339"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_cli_backfill_defaults_parse() {
        let args = Args::try_parse_from(["arxin", "backfill"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(
            args.command,
            Command::Backfill {
                start: None,
                end: None
            }
        );
        assert!(args.database.is_none());
        assert!(args.delay_ms.is_none());
    }

    #[test]
    fn test_cli_backfill_accepts_dates_and_timestamps() {
        let args = Args::try_parse_from([
            "arxin",
            "backfill",
            "--start",
            "2024-01-15",
            "--end",
            "2024-02-01T12:30:00+02:00",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::Backfill {
                start: Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()),
                end: Some(Utc.with_ymd_and_hms(2024, 2, 1, 10, 30, 0).unwrap()),
            }
        );
    }

    #[test]
    fn test_cli_backfill_rejects_bad_date() {
        let err = Args::try_parse_from(["arxin", "backfill", "--start", "last week"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "arxin",
            "backfill",
            "-vv",
            "--database",
            "papers.db",
            "--delay-ms",
            "0",
            "--rejected-dir",
            "rej",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.database, Some(PathBuf::from("papers.db")));
        assert_eq!(args.delay_ms, Some(0));
        assert_eq!(args.rejected_dir, Some(PathBuf::from("rej")));
    }

    #[test]
    fn test_cli_delay_ms_range_enforced() {
        let result = Args::try_parse_from(["arxin", "--delay-ms", "60001", "init"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_reset_requires_flag_value_parse() {
        let args = Args::try_parse_from(["arxin", "reset"]).unwrap();
        assert_eq!(args.command, Command::Reset { yes: false });
        let args = Args::try_parse_from(["arxin", "reset", "--yes"]).unwrap();
        assert_eq!(args.command, Command::Reset { yes: true });
    }

    #[test]
    fn test_cli_subcommand_is_required() {
        assert!(Args::try_parse_from(["arxin"]).is_err());
    }

    #[test]
    fn test_cli_help_and_version_exit_early() {
        let err = Args::try_parse_from(["arxin", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        let err = Args::try_parse_from(["arxin", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_parse_date_arg_variants() {
        assert_eq!(
            parse_date_arg("1986-01-01").unwrap(),
            Utc.with_ymd_and_hms(1986, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date_arg("2024-03-05T06:07:08Z").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 5, 6, 7, 8).unwrap()
        );
        assert!(parse_date_arg("2024-13-01").is_err());
    }
}
