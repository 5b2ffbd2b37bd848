//! Line commands accepted on stdin.

use std::path::PathBuf;

use assess_session::{ExecutionMode, Language};

/// One parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Re-render the whole session.
    Show,
    /// Jump to a question by its one-based number.
    Question(usize),
    /// Next question.
    Next,
    /// Previous question.
    Prev,
    /// Switch language.
    Lang(Language),
    /// Replace the active buffer with a file's contents.
    Load(PathBuf),
    /// Set custom stdin from a file, or clear it with `None`.
    Input(Option<PathBuf>),
    /// Run, test or submit the active buffer.
    Execute(ExecutionMode),
    /// Finish the assessment.
    Finish,
    /// Leave the session.
    Quit,
    /// Print the command list.
    Help,
}

/// Usage text printed by `help`.
pub const HELP: &str = "\
Commands:
  show                 Show the current question, code and last result
  question <n>         Go to question n
  next | prev          Go to the next or previous question
  lang <language>      Switch language (python, java, cpp, javascript)
  load <file>          Replace the code with the contents of <file>
  input <file>         Use <file> as stdin for `test`
  input -              Clear the custom stdin
  test                 Run the code once with the custom stdin
  run                  Run the code against the sample cases
  submit               Grade the code against every case
  finish               Finish the assessment
  quit                 Leave without finishing
  help                 Show this list";

/// Parses one input line.
///
/// Returns `Ok(None)` for a blank line.
///
/// # Errors
///
/// Returns a message for the candidate if the line is not a valid command.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));

    let command = match word.to_ascii_lowercase().as_str() {
        "show" | "s" => Command::Show,
        "question" | "q" => {
            let number: usize = rest
                .parse()
                .map_err(|_| format!("Usage: question <n> (got '{rest}')"))?;
            if number == 0 {
                return Err("Questions are numbered from 1".to_string());
            }
            Command::Question(number)
        }
        "next" | "n" => Command::Next,
        "prev" | "p" => Command::Prev,
        "lang" | "language" => {
            let language = Language::from_str_case_insensitive(rest).ok_or_else(|| {
                format!("Unknown language '{rest}'. Use python, java, cpp or javascript")
            })?;
            Command::Lang(language)
        }
        "load" => Command::Load(required_path(rest, "load <file>")?),
        "input" => match rest {
            "-" => Command::Input(None),
            _ => Command::Input(Some(required_path(rest, "input <file> | input -")?)),
        },
        "test" => Command::Execute(ExecutionMode::Test),
        "run" => Command::Execute(ExecutionMode::Run),
        "submit" => Command::Execute(ExecutionMode::Submit),
        "finish" => Command::Finish,
        "quit" | "exit" => Command::Quit,
        "help" | "?" => Command::Help,
        other => return Err(format!("Unknown command '{other}'. Type `help` for a list")),
    };

    Ok(Some(command))
}

fn required_path(rest: &str, usage: &str) -> Result<PathBuf, String> {
    if rest.is_empty() {
        Err(format!("Usage: {usage}"))
    } else {
        Ok(PathBuf::from(rest))
    }
}
