//! Plain-text rendering of the session view.

use assess_session::{
    OutcomeResultView, OutcomeView, SessionEvent, SessionView, TimeBand, VerdictRow,
};

/// Longest stdout/stderr excerpt printed inline.
const MAX_OUTPUT_CHARS: usize = 2_000;

/// Prints the whole session: header, question, buffer summary and outcome.
pub fn print_view(view: &SessionView) {
    print_header(view);
    print_question(view);
    print_buffer(view);
    if let Some(outcome) = &view.outcome {
        print_outcome(outcome);
    }
    if let Some(error) = &view.last_error {
        println!("! {error}");
    }
}

/// Prints the status line.
pub fn print_header(view: &SessionView) {
    println!();
    println!(
        "== {} == [{}] {} {}",
        view.title,
        view.status,
        band_marker(view.timer.band),
        view.timer.display
    );
}

fn print_question(view: &SessionView) {
    let question = &view.question;
    println!(
        "Question {}/{}: {} ({})",
        view.question_index + 1,
        view.question_count,
        question.title,
        question.difficulty
    );
    println!();
    println!("{}", question.description.trim_end());

    for (i, sample) in question.samples.iter().enumerate() {
        println!();
        println!("Example {}:", i + 1);
        println!("  Input:    {}", inline(&sample.input));
        println!("  Expected: {}", inline(&sample.expected_output));
    }
    if question.hidden_count > 0 {
        println!();
        println!("{} hidden test case(s) are graded on submit.", question.hidden_count);
    }
}

fn print_buffer(view: &SessionView) {
    let allowed = view
        .question
        .allowed_languages
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    println!();
    println!(
        "Language: {} (allowed: {allowed}), {} line(s) of code",
        view.language,
        view.code.lines().count()
    );
    if let Some(input) = &view.custom_input {
        println!("Custom input: {}", inline(input));
    }
    if view.request_in_flight {
        println!("A request is running...");
    }
    if !view.editable {
        println!("The session is closed; code can no longer be changed.");
    }
}

/// Prints an execution outcome.
pub fn print_outcome(outcome: &OutcomeView) {
    println!();
    match &outcome.result {
        OutcomeResultView::Raw {
            success,
            stdout,
            stderr,
            error,
            execution_time_ms,
        } => {
            let state = if *success { "ok" } else { "failed" };
            println!("{} {state} in {execution_time_ms}ms", outcome.mode);
            print_block("stdout", stdout);
            print_block("stderr", stderr);
            if let Some(error) = error {
                println!("error: {error}");
            }
        }
        OutcomeResultView::Verdicts {
            summary,
            rows,
            compilation_logs,
            execution_logs,
        } => {
            println!(
                "{}: {}/{} passed",
                outcome.mode,
                summary.passed(),
                summary.total()
            );
            for row in rows {
                print_row(row);
            }
            if let Some(logs) = compilation_logs {
                print_block("compilation", logs);
            }
            if let Some(logs) = execution_logs {
                print_block("execution", logs);
            }
        }
        OutcomeResultView::Failed { kind, message } => {
            println!("{} failed ({kind}): {message}", outcome.mode);
            println!("  Suggestion: {}", kind.suggestion());
        }
    }
}

fn print_row(row: &VerdictRow) {
    match row {
        VerdictRow::Sample {
            test_case_id,
            passed,
            input,
            expected_output,
            actual_output,
            error,
        } => {
            println!("  [{}] sample {test_case_id}", pass_label(*passed));
            if !passed {
                if let Some(input) = input {
                    println!("      input:    {}", inline(input));
                }
                if let Some(expected) = expected_output {
                    println!("      expected: {}", inline(expected));
                }
                if let Some(actual) = actual_output {
                    println!("      actual:   {}", inline(actual));
                }
            }
            if let Some(error) = error {
                println!("      error:    {}", inline(error));
            }
        }
        VerdictRow::Hidden { ordinal, passed } => {
            println!("  [{}] hidden #{ordinal}", pass_label(*passed));
        }
    }
}

/// Prints a one-line rendering of an event, or nothing for quiet events.
///
/// Ticks are printed once a minute, and every ten seconds in the last minute.
pub fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Tick(tick) => {
            let due = tick.remaining_secs % 60 == 0
                || (tick.remaining_secs < 60 && tick.remaining_secs % 10 == 0);
            if due && tick.remaining_secs > 0 {
                println!("{} {} remaining", band_marker(tick.band), tick.display);
            }
        }
        SessionEvent::StatusChanged(change) => {
            println!("Assessment is now {} (was {})", change.to, change.from);
        }
        SessionEvent::Error(error) => println!("! {}", error.message),
        SessionEvent::Navigated(_) | SessionEvent::Outcome(_) => {}
    }
}

const fn band_marker(band: TimeBand) -> &'static str {
    match band {
        TimeBand::Normal => "[time]",
        TimeBand::Warning => "[time!]",
        TimeBand::Critical => "[TIME!!]",
    }
}

const fn pass_label(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

fn print_block(label: &str, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    println!("--- {label} ---");
    println!("{}", truncate(text.trim_end(), MAX_OUTPUT_CHARS));
}

/// Renders multi-line text on one line with visible newlines.
fn inline(text: &str) -> String {
    truncate(text.trim_end(), 200).replace('\n', "\\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... (truncated)", &text[..cut]),
        None => text.to_string(),
    }
}
