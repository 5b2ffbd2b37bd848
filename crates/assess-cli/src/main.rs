//! Assessment CLI
//!
//! Terminal driver for a timed coding assessment: loads the assessment,
//! runs the countdown, and reads candidate commands from stdin.

mod commands;
mod render;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use assess_client::HttpBackend;
use assess_report::{QuestionReport, Report, ReportStatus, SubmissionCounts, SubmissionEntry};
use assess_session::{
    AssessmentId, AssessmentStatus, CandidateAction, Config, SessionController, SessionError,
    SessionEvent, SessionInbox, SubmissionRecord, SystemClock, TimerEngine,
};
use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

/// Assess - timed coding assessment client
///
/// Loads an assessment from the assessment service, starts the countdown and
/// lets the candidate edit, run and submit solutions from the terminal.
#[derive(Parser, Debug)]
#[command(name = "assess")]
#[command(version, about, long_about = None)]
struct Args {
    /// Assessment identifier
    #[arg(value_name = "ASSESSMENT_ID")]
    assessment_id: String,

    /// Candidate identifier (overrides candidateId from the config file)
    #[arg(long, value_name = "ID")]
    candidate: Option<String>,

    /// Path to configuration file (default: assess.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Output directory for reports
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Do not write a report when the session ends
    #[arg(long)]
    no_report: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Logs go to stderr so they do not interleave with the session output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Assess starting");

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Main application logic.
async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(candidate) = args.candidate {
        config.candidate_id = candidate;
    }
    if let Some(output_dir) = args.output_dir {
        config.report.output_dir = output_dir;
    }
    if args.no_report {
        config.report.enabled = false;
    }
    config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;

    print_config(&config);

    let backend = HttpBackend::from_config(&config)?;
    probe_health(&backend).await;

    let timer = TimerEngine::new(Arc::new(SystemClock), config.tick_interval());
    let assessment_id = AssessmentId::new(args.assessment_id);

    let (mut session, mut inbox) =
        match SessionController::load(&config, Arc::new(backend), assessment_id, &timer).await {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("Error: {e}");
                if let SessionError::LoadFailure { source, .. } = &e {
                    eprintln!("\nSuggestion: {}", source.kind.suggestion());
                }
                return Ok(ExitCode::from(1));
            }
        };

    if session.is_demo() {
        println!();
        println!("Running the built-in demo assessment; results are not sent anywhere.");
    }
    render::print_view(&session.view());
    println!();
    println!("Type `help` for commands.");

    run_session(&mut session, &mut inbox).await?;

    let _ = session.dispatch(CandidateAction::Teardown);

    println!();
    print_summary(&session);

    if config.report.enabled {
        generate_reports(&session, &config, Path::new(&config.report.output_dir))?;
    }

    Ok(ExitCode::SUCCESS)
}

/// Loads configuration from a file path or the default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Checks the assessment service before loading. Failures only warn.
async fn probe_health(backend: &HttpBackend) {
    match backend.health().await {
        Ok(status) if status.is_healthy() => {
            tracing::debug!(api_root = %backend.api_root(), "Assessment service healthy");
        }
        Ok(status) => {
            tracing::warn!(
                status = %status.status,
                message = %status.message,
                "Assessment service reports degraded health"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Assessment service health check failed");
        }
    }
}

/// Drives the session until the candidate quits, stdin closes or Ctrl+C.
async fn run_session(
    session: &mut SessionController,
    inbox: &mut SessionInbox,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut events = session.subscribe();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                println!();
                println!("Interrupted.");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::debug!("stdin closed");
                    break;
                };
                if handle_line(session, &line).await == Flow::Quit {
                    break;
                }
            }
            Some(input) = inbox.recv() => {
                // Rejections are reported through the error event.
                let _ = session.dispatch(input);
            }
            event = events.recv() => match event {
                Ok(event) => handle_event(session, &event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event receiver lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

async fn handle_line(session: &mut SessionController, line: &str) -> Flow {
    let command = match commands::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Flow::Continue,
        Err(message) => {
            println!("{message}");
            return Flow::Continue;
        }
    };

    let action = match command {
        Command::Show => {
            render::print_view(&session.view());
            return Flow::Continue;
        }
        Command::Help => {
            println!("{}", commands::HELP);
            return Flow::Continue;
        }
        Command::Quit => return Flow::Quit,
        Command::Question(number) => CandidateAction::SelectQuestion(number - 1),
        Command::Next => CandidateAction::SelectQuestion(session.current_index() + 1),
        Command::Prev => match session.current_index().checked_sub(1) {
            Some(index) => CandidateAction::SelectQuestion(index),
            None => {
                println!("Already at the first question.");
                return Flow::Continue;
            }
        },
        Command::Lang(language) => CandidateAction::SelectLanguage(language),
        Command::Load(path) => match read_file(&path).await {
            Some(code) => CandidateAction::Edit(code),
            None => return Flow::Continue,
        },
        Command::Input(None) => CandidateAction::SetCustomInput(None),
        Command::Input(Some(path)) => match read_file(&path).await {
            Some(input) => CandidateAction::SetCustomInput(Some(input)),
            None => return Flow::Continue,
        },
        Command::Execute(mode) => CandidateAction::Execute(mode),
        Command::Finish => CandidateAction::Finish,
    };

    let confirmation = match &action {
        CandidateAction::Edit(code) => Some(format!("Loaded {} line(s).", code.lines().count())),
        CandidateAction::SetCustomInput(Some(_)) => Some("Custom input set.".to_string()),
        CandidateAction::SetCustomInput(None) => Some("Custom input cleared.".to_string()),
        CandidateAction::Execute(mode) => Some(format!("Running {mode}...")),
        _ => None,
    };

    if session.dispatch(action).is_ok() {
        if let Some(message) = confirmation {
            println!("{message}");
        }
    }

    Flow::Continue
}

fn handle_event(session: &SessionController, event: &SessionEvent) {
    match event {
        SessionEvent::Navigated(_) => render::print_view(&session.view()),
        SessionEvent::Outcome(_) => {
            if let Some(outcome) = &session.view().outcome {
                render::print_outcome(outcome);
            }
        }
        SessionEvent::StatusChanged(change) => {
            render::print_event(event);
            if change.to.is_terminal() {
                println!("Your work is saved. Type `quit` to leave and write the report.");
            }
        }
        SessionEvent::Tick(_) | SessionEvent::Error(_) => render::print_event(event),
    }
}

async fn read_file(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Some(text),
        Err(e) => {
            println!("Cannot read '{}': {e}", path.display());
            None
        }
    }
}

/// Prints configuration summary.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Service: {}{}", config.base_url(), config.api_prefix);
    println!("  Candidate: {}", config.candidate_id);
    println!("  Environment: {:?}", config.environment);
    println!("  Submit policy: {:?}", config.submit_policy);
    if config.report.enabled {
        println!("  Report directory: {}", config.report.output_dir);
    }
}

/// Prints the final session summary.
fn print_summary(session: &SessionController) {
    println!("=== Assessment Summary ===");
    println!("Assessment: {}", session.assessment().title);
    println!("Status: {}", session.status());
    println!("Submissions: {}", session.history().len());

    let ended = session.ended_at().unwrap_or_else(Utc::now);
    let elapsed = ended - session.started_at();
    println!(
        "Duration: {}m {}s",
        elapsed.num_minutes(),
        elapsed.num_seconds() % 60
    );
}

/// Generates reports from the final session state.
///
/// Creates both Markdown and JSON reports in the output directory.
fn generate_reports(
    session: &SessionController,
    config: &Config,
    output_dir: &Path,
) -> anyhow::Result<()> {
    println!();
    println!("Generating reports...");

    let report = build_report(session, config)?;
    let paths = report.write_to_dir(output_dir)?;

    println!("  Markdown: {}", paths.markdown.display());
    println!("  JSON: {}", paths.json.display());

    Ok(())
}

fn build_report(session: &SessionController, config: &Config) -> anyhow::Result<Report> {
    let assessment = session.assessment();

    let mut builder = Report::builder()
        .assessment(assessment.id.as_str(), &assessment.title)
        .candidate(&config.candidate_id)
        .status(convert_status(session.status()))
        .window(
            session.started_at(),
            session.ended_at().unwrap_or_else(Utc::now),
        )
        .demo(session.is_demo());

    for (i, question) in session.catalog().iter().enumerate() {
        builder = builder.question(QuestionReport::new(
            i + 1,
            question.id.as_str(),
            &question.title,
            question.difficulty.as_str(),
        ));
    }

    let report = builder
        .submissions(session.history().iter().map(convert_submission).collect())
        .build()?;
    Ok(report)
}

/// Converts `AssessmentStatus` to `ReportStatus`.
const fn convert_status(status: AssessmentStatus) -> ReportStatus {
    match status {
        AssessmentStatus::NotStarted => ReportStatus::NotStarted,
        AssessmentStatus::InProgress => ReportStatus::InProgress,
        AssessmentStatus::Expired => ReportStatus::Expired,
        AssessmentStatus::Submitted => ReportStatus::Submitted,
    }
}

/// Converts a `SubmissionRecord` to a `SubmissionEntry`.
fn convert_submission(record: &SubmissionRecord) -> SubmissionEntry {
    let summary = &record.summary;
    SubmissionEntry {
        question_id: record.question_id.as_str().to_string(),
        language: record.language.as_str().to_string(),
        counts: SubmissionCounts::new(
            summary.sample_passed,
            summary.sample_total,
            summary.hidden_passed,
            summary.hidden_total,
        ),
        submitted_at: record.submitted_at,
    }
}
