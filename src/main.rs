mod annotation;
mod config;
mod logging;
mod normalizer;
mod output;
mod run;
mod store;

use annotation::Marker;
use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use normalizer::InvalidTimestamp;
use run::{FailurePolicy, RunOptions};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use store::SessionCache;

const EXAMPLES: &str = "\
EXAMPLES:
  annotate-dashboards --profile staging \\
      --boards ApiDashboard \\
      --label 'SM-741 deployment' \\
      --start '2018-11-05T22:44:00+0530' \\
      --end '2018-11-05T23:30:00+0530'
  annotate-dashboards -b ApiDashboard -l 'Deployment Release 2.03' -s '2018-11-05 22:44:00'
  annotate-dashboards -b ApiDashboard WorkerDashboard -s '2018-11-05 22:44:00' --dry-run --verbose";

/// Add a vertical annotation to all metric graphs of one or more dashboards.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = EXAMPLES)]
struct Args {
    /// Space separated list of board names
    #[arg(short, long, num_args = 1.., required = true)]
    boards: Vec<String>,

    /// Start time of a range, or the time of a single annotation
    #[arg(short, long, visible_alias = "timestamp")]
    start: String,

    /// End time of a range
    #[arg(short, long)]
    end: Option<String>,

    #[arg(short, long, default_value = "Deployment")]
    label: String,

    /// Fill color for a range, reserved
    #[arg(short, long, default_value = "#DD9999", value_parser = NonEmptyStringValueParser::new())]
    color: String,

    /// Connection profile from the config file
    #[arg(short, long, visible_alias = "aws-profile", default_value = "default")]
    profile: String,

    /// Print the updated board JSON, but make no changes
    #[arg(short, long)]
    dry_run: bool,

    /// Log debug information
    #[arg(short, long)]
    verbose: bool,

    /// Keep going with the remaining boards after one fails
    #[arg(short, long)]
    keep_going: bool,

    #[arg(long, env = "ANNOTATE_DASHBOARDS_CONFIG", default_value = "annotate-dashboards.toml")]
    config: PathBuf,

    #[arg(long, default_value = ".")]
    backup_dir: PathBuf,

    #[arg(long, default_value = "annotate-dashboards.log")]
    log_file: PathBuf,
}

impl Args {
    fn marker(&self) -> Result<Marker, InvalidTimestamp> {
        let start = normalizer::normalize(&self.start)?;
        let end = self.end.as_deref().map(normalizer::normalize).transpose()?;
        Ok(Marker::new(self.label.clone(), start, end))
    }

    fn policy(&self) -> FailurePolicy {
        if self.keep_going {
            FailurePolicy::ContinueOnError
        } else {
            FailurePolicy::HaltOnFirstError
        }
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let run_started = Utc::now().timestamp();

    logging::init(&logging::LogConfig {
        verbose: args.verbose,
        path: std::path::absolute(&args.log_file)?,
    })?;
    tracing::debug!(argv = ?std::env::args().collect::<Vec<_>>(), "cli args");
    tracing::debug!(?args, "parsed args");

    // no board is touched unless both timestamps parse
    let marker = match args.marker() {
        Ok(marker) => marker,
        Err(error) => {
            eprintln!("{error}");
            eprintln!("{}", normalizer::FORMAT_HINT);
            return Ok(ExitCode::from(2));
        }
    };
    tracing::debug!(?marker, color = %args.color, "fill color is not applied to annotations yet");

    let options = RunOptions {
        profile: args.profile.clone(),
        marker,
        dry_run: args.dry_run,
        backup_dir: args.backup_dir.clone(),
        run_started,
        policy: args.policy(),
    };
    let mut sessions = SessionCache::new(config::load_config(&args.config)?);

    let mut out = io::stdout().lock();
    let summary = run::run(&args.boards, &options, &mut sessions, &mut out);
    output::write_summary(&mut out, &summary)?;

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_match_the_documented_ones() {
        let args = Args::try_parse_from(["annotate-dashboards", "-b", "ApiDashboard", "-s", "2018-11-05"])
            .expect("minimal invocation must parse");

        assert_eq!(args.boards, ["ApiDashboard"]);
        assert_eq!(args.label, "Deployment");
        assert_eq!(args.color, "#DD9999");
        assert_eq!(args.profile, "default");
        assert!(!args.dry_run);
        assert!(!args.verbose);
        assert_eq!(args.policy(), FailurePolicy::HaltOnFirstError);
        assert_eq!(args.backup_dir, PathBuf::from("."));
    }

    #[test]
    fn parses_several_boards_and_aliases() {
        let args = Args::try_parse_from([
            "annotate-dashboards",
            "--aws-profile",
            "staging",
            "--boards",
            "ApiDashboard",
            "WorkerDashboard",
            "--timestamp",
            "2018-11-05T22:44:00+0530",
            "-e",
            "2018-11-05T23:30:00+0530",
            "-l",
            "SM-741 deployment",
            "-dvk",
        ])
        .expect("full invocation must parse");

        assert_eq!(args.boards, ["ApiDashboard", "WorkerDashboard"]);
        assert_eq!(args.profile, "staging");
        assert!(args.dry_run && args.verbose);
        assert_eq!(args.policy(), FailurePolicy::ContinueOnError);
        assert_eq!(
            args.marker().unwrap(),
            Marker::Range {
                label: "SM-741 deployment".to_string(),
                start: "2018-11-05T17:14:00Z".to_string(),
                end: "2018-11-05T18:00:00Z".to_string(),
            }
        );
    }

    #[test]
    fn boards_and_start_are_required() {
        assert!(Args::try_parse_from(["annotate-dashboards", "-s", "2018-11-05"]).is_err());
        assert!(Args::try_parse_from(["annotate-dashboards", "-b", "ApiDashboard"]).is_err());
        assert!(Args::try_parse_from(["annotate-dashboards", "-b", "-s", "2018-11-05"]).is_err());
    }

    #[test]
    fn empty_color_is_rejected() {
        assert!(Args::try_parse_from(["annotate-dashboards", "-b", "a", "-s", "2018", "-c", ""]).is_err());
    }

    #[test]
    fn bad_end_timestamp_fails_the_marker() {
        let args = Args::try_parse_from([
            "annotate-dashboards",
            "-b",
            "ApiDashboard",
            "-s",
            "2018-11-05T22:44:00Z",
            "-e",
            "yesterday",
        ])
        .unwrap();

        let error = args.marker().unwrap_err();
        assert_eq!(error.input, "yesterday");
    }

    #[test]
    fn single_timestamp_is_a_point() {
        let args = Args::try_parse_from(["annotate-dashboards", "-b", "a", "-s", "2020-01-01T00:00:00Z"]).unwrap();
        assert_eq!(
            args.marker().unwrap(),
            Marker::Point {
                label: "Deployment".to_string(),
                at: "2020-01-01T00:00:00Z".to_string(),
            }
        );
    }
}
