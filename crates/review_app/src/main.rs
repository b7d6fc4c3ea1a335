mod platform;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use review_core::IdKind;

use platform::config::{AppConfig, DEFAULT_CONFIG_FILE};
use platform::logging::{self, LogDestination};
use platform::{Command, DEFAULT_STATE_FILE};

#[derive(Parser)]
#[command(name = "batch-review")]
#[command(version)]
#[command(
    about = "Submit, estimate and watch batch AI review jobs",
    long_about = None
)]
struct Cli {
    /// RON config file; defaults apply when it does not exist
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Where log output goes; overrides the config file
    #[arg(long, global = true, value_enum)]
    log: Option<LogDestination>,
    /// Watch-state file remembering announced completions
    #[arg(long, global = true, default_value = DEFAULT_STATE_FILE)]
    state: PathBuf,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a job from a JSON request and append its batches
    #[clap(visible_alias = "s")]
    Submit {
        /// Job request file (draft, scope, optional ids)
        request: PathBuf,
        /// Keep polling the new job until it finishes
        #[arg(short, long)]
        watch: bool,
    },
    /// Estimate tokens and cost for a job request
    #[clap(visible_alias = "e")]
    Estimate {
        request: PathBuf,
        /// JSON array of sample records; estimates locally instead of asking the backend
        #[arg(short, long)]
        records: Option<PathBuf>,
        /// Total item count to extrapolate to (defaults to the number of records)
        #[arg(short, long)]
        total: Option<u64>,
    },
    /// Render the request's prompt for a few records in its scope
    #[clap(visible_alias = "p")]
    Preview { request: PathBuf },
    /// Poll the job list, or one job, and announce completions
    #[clap(visible_alias = "w")]
    Watch {
        /// Follow a single job
        #[arg(short, long)]
        job: Option<String>,
        /// Follow the job watched last time
        #[arg(short, long, conflicts_with = "job")]
        resume: bool,
        /// Keep polling after everything has finished
        #[arg(short, long)]
        follow: bool,
    },
    /// Cancel a queued, running or paused job
    Cancel { job_id: String },
    /// Delete a finished job
    Delete { job_id: String },
    /// Check typed record or frame ids against the backend
    #[clap(visible_alias = "v")]
    Validate {
        #[arg(short, long, value_enum, default_value_t = IdKindArg::Record)]
        kind: IdKindArg,
        /// Record type the ids belong to; required for record ids
        #[arg(short, long)]
        target_type: Option<String>,
        /// Ids separated by commas or whitespace
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum IdKindArg {
    Record,
    Frame,
}

impl From<IdKindArg> for IdKind {
    fn from(kind: IdKindArg) -> Self {
        match kind {
            IdKindArg::Record => IdKind::Record,
            IdKindArg::Frame => IdKind::Frame,
        }
    }
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Submit { request, watch } => Command::Submit { request, watch },
            Commands::Estimate {
                request,
                records,
                total,
            } => Command::Estimate {
                request,
                records,
                total,
            },
            Commands::Preview { request } => Command::Preview { request },
            Commands::Watch {
                job,
                resume,
                follow,
            } => Command::Watch {
                job,
                resume,
                follow,
            },
            Commands::Cancel { job_id } => Command::Cancel { job_id },
            Commands::Delete { job_id } => Command::Delete { job_id },
            Commands::Validate {
                kind,
                target_type,
                ids,
            } => Command::Validate {
                kind: kind.into(),
                target_type,
                ids,
            },
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let result = AppConfig::load(&cli.config).and_then(|config| {
        logging::initialize(cli.log.unwrap_or(config.log_destination), cli.verbose);
        platform::run_app(&config, &cli.state, cli.command.into())
    });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn validate_takes_kind_and_ids() {
        let cli = Cli::parse_from(["batch-review", "validate", "--kind", "frame", "f1,f2", "f3"]);
        let Commands::Validate {
            kind,
            target_type,
            ids,
        } = cli.command
        else {
            panic!("expected validate");
        };
        assert_eq!(kind, IdKindArg::Frame);
        assert_eq!(target_type, None);
        assert_eq!(ids, vec!["f1,f2".to_string(), "f3".to_string()]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn validate_record_ids_with_target_type() {
        let cli = Cli::parse_from(["batch-review", "validate", "-t", "entry", "e1", "e2"]);
        let Commands::Validate {
            kind, target_type, ..
        } = cli.command
        else {
            panic!("expected validate");
        };
        assert_eq!(kind, IdKindArg::Record);
        assert_eq!(target_type.as_deref(), Some("entry"));
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::parse_from([
            "batch-review",
            "watch",
            "--resume",
            "--log",
            "both",
            "--state",
            "/tmp/watch.ron",
        ]);
        assert_eq!(cli.log, Some(LogDestination::Both));
        assert_eq!(cli.state, PathBuf::from("/tmp/watch.ron"));
        assert!(matches!(
            cli.command,
            Commands::Watch {
                job: None,
                resume: true,
                follow: false
            }
        ));
    }
}
