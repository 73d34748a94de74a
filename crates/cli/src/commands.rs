//! Command definitions and dispatch.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use lingoforge_core::{GroupId, JobId};
use lingoforge_generation::{HttpContentGenerator, TemplateBriefBuilder};
use lingoforge_observability::LogFormat;
use lingoforge_pipeline::{BatchQueueProcessor, Collaborators, JobStore, PollingJobRunner};

use crate::import::{self, ImportFile};
use crate::settings::Settings;
use crate::state::State;

#[derive(Debug, Parser)]
#[command(name = "lingoforge")]
#[command(about = "Content-generation job pipeline")]
#[command(version)]
pub struct Cli {
    /// State snapshot (created when missing)
    #[arg(long, global = true, env = "LINGOFORGE_STATE", default_value = "lingoforge-state.json")]
    pub state: PathBuf,

    /// TOML settings file
    #[arg(long, global = true, env = "LINGOFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output: json or pretty
    #[arg(long, global = true, default_value = "json")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process due jobs
    Process {
        /// Maximum jobs to process (defaults to the configured batch limit)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Select and count jobs without generating anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show job counts per status
    Status,

    /// List terminally failed jobs
    Failed {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Generate every remaining target of a group
    RunGroup { group_id: GroupId },

    /// Give a failed job a fresh retry budget
    Requeue { job_id: JobId },

    /// Purge old ready/failed jobs
    Cleanup {
        /// Age threshold (defaults to the configured retention)
        #[arg(long)]
        older_than_days: Option<u32>,
    },

    /// Create paths and groups from a JSON file
    Import { file: PathBuf },
}

impl Command {
    fn mutates_state(&self) -> bool {
        match self {
            Command::Process { dry_run, .. } => !dry_run,
            Command::Status | Command::Failed { .. } => false,
            Command::RunGroup { .. }
            | Command::Requeue { .. }
            | Command::Cleanup { .. }
            | Command::Import { .. } => true,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn collaborators(settings: &Settings, state: &State) -> Collaborators {
    Collaborators {
        generator: Arc::new(HttpContentGenerator::new(settings.generator.clone())),
        briefs: Arc::new(TemplateBriefBuilder),
        contents: state.contents.clone(),
    }
}

/// Run one command; the exit code is 1 when the run ended with terminal failures.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = Settings::load(cli.config.as_deref())?;
    let state = State::load(&cli.state)?;

    let mutates = cli.command.mutates_state();
    let result = execute(cli.command, &settings, &state).await;

    // persist whatever happened before a failure too
    if mutates {
        state
            .save(&cli.state)
            .with_context(|| format!("saving state {}", cli.state.display()))?;
    }
    result
}

async fn execute(command: Command, settings: &Settings, state: &State) -> anyhow::Result<ExitCode> {
    match command {
        Command::Process { limit, dry_run } => {
            let processor = BatchQueueProcessor::new(
                state.jobs.clone(),
                state.paths.clone(),
                collaborators(settings, state),
                settings.pipeline.clone(),
            );
            let limit = limit.unwrap_or(settings.pipeline.batch_limit);
            let report = processor.process_pending(limit, dry_run).await?;
            print_json(&report)?;

            Ok(if report.has_terminal_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }

        Command::Status => {
            print_json(&state.jobs.stats()?)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Failed { limit } => {
            print_json(&state.jobs.failed_jobs(limit)?)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::RunGroup { group_id } => {
            let runner = PollingJobRunner::new(
                state.groups.clone(),
                collaborators(settings, state),
                settings.pipeline.clone(),
            );
            let status = runner
                .generate_all_with_progress(group_id, |s| {
                    eprintln!(
                        "{}: {}/{} ready, {} generating, {} failed",
                        s.group_id, s.ready_count, s.total, s.generating_count, s.failed_count
                    );
                })
                .await?;
            print_json(&status)?;

            Ok(if status.has_failures {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }

        Command::Requeue { job_id } => {
            let job = state.jobs.requeue_failed(job_id)?;
            print_json(&job)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Cleanup { older_than_days } => {
            let retention = match older_than_days {
                Some(days) => ChronoDuration::days(i64::from(days)),
                None => ChronoDuration::from_std(settings.pipeline.retention)
                    .context("retention out of range")?,
            };
            let purged = state.jobs.purge_terminal(Utc::now() - retention)?;
            print_json(&serde_json::json!({ "purged": purged }))?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let parsed: ImportFile = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", file.display()))?;
            let summary = import::apply(state, parsed, &settings.pipeline, Utc::now())?;
            print_json(&summary)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingoforge_generation::{ContentSeed, Difficulty};
    use lingoforge_core::PathId;
    use lingoforge_pipeline::{GenerationJob, InMemoryJobStore, JobSchedule, JobStatus, LearningPath};

    #[test]
    fn parses_process_flags() {
        let cli = Cli::try_parse_from([
            "lingoforge",
            "--state",
            "s.json",
            "process",
            "--limit",
            "5",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.state, PathBuf::from("s.json"));
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(
            cli.command,
            Command::Process {
                limit: Some(5),
                dry_run: true
            }
        ));
    }

    #[test]
    fn ids_are_validated_at_parse_time() {
        assert!(Cli::try_parse_from(["lingoforge", "requeue", "not-a-uuid"]).is_err());

        let id = GroupId::new();
        let arg = id.to_string();
        let cli = Cli::try_parse_from(["lingoforge", "run-group", arg.as_str()]).unwrap();
        assert!(matches!(cli.command, Command::RunGroup { group_id } if group_id == id));
    }

    #[test]
    fn log_format_is_parsed() {
        let cli = Cli::try_parse_from(["lingoforge", "--log-format", "pretty", "status"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Pretty);
        assert!(Cli::try_parse_from(["lingoforge", "--log-format", "xml", "status"]).is_err());
    }

    #[test]
    fn read_only_commands_do_not_save() {
        assert!(!Command::Status.mutates_state());
        assert!(!Command::Process { limit: None, dry_run: true }.mutates_state());
        assert!(Command::Process { limit: None, dry_run: false }.mutates_state());
        assert!(Command::Cleanup { older_than_days: None }.mutates_state());
    }

    #[tokio::test]
    async fn dry_run_process_reports_due_jobs() {
        let state = State::default();
        let path = LearningPath::draft("P", "es", [ContentSeed::new("Greetings", Difficulty::Beginner)]);
        let path_id = path.id;
        state.paths.insert(path).unwrap();
        state
            .jobs
            .enqueue(path_id, &[1], JobSchedule::immediate(Utc::now()))
            .unwrap();

        let code = execute(
            Command::Process {
                limit: None,
                dry_run: true,
            },
            &Settings::default(),
            &state,
        )
        .await
        .unwrap();

        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(state.jobs.stats().unwrap().pending, 1);
    }

    #[tokio::test]
    async fn requeue_and_cleanup_touch_only_failed_jobs() {
        let mut failed = GenerationJob::new(PathId::new(), 1, Utc::now());
        failed.status = JobStatus::Failed;
        failed.last_error = Some("boom".into());
        failed.last_processed_at = Some(Utc::now() - ChronoDuration::days(90));
        let failed_id = failed.id;

        let state = State {
            jobs: Arc::new(InMemoryJobStore::from_jobs([failed])),
            ..State::default()
        };

        execute(Command::Requeue { job_id: failed_id }, &Settings::default(), &state)
            .await
            .unwrap();
        assert_eq!(state.jobs.get(failed_id).unwrap().unwrap().status, JobStatus::Pending);

        execute(
            Command::Cleanup {
                older_than_days: Some(30),
            },
            &Settings::default(),
            &state,
        )
        .await
        .unwrap();
        assert!(state.jobs.get(failed_id).unwrap().is_some());

        assert!(
            execute(Command::Requeue { job_id: failed_id }, &Settings::default(), &state)
                .await
                .is_err()
        );
    }
}
