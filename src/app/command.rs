//! Command parsing for the interactive study prompt

use std::path::PathBuf;

/// Parsed command from the study prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stage text: text <content>
    Text(String),
    /// Stage a file: file <path>
    File(PathBuf),
    /// Drop the staged text or file: clear
    Clear,
    /// Generate from the staged input: generate
    Generate,
    /// Answer a question: answer <number> <letter or option text>
    Answer {
        /// 1-based question number
        question: usize,
        /// Option letter or option text
        choice: String,
    },
    /// Regenerate from the same source: regen
    Regenerate,
    /// Discard results and start over: new
    New,
    /// Save to history and start over: save
    Save,
    /// Toggle speech of the summary: speak
    Speak,
    /// Stop speech, as if the window lost focus: stop
    Stop,
    /// Synthesize the summary to an audio file: audio
    Audio,
    /// Print the study set: show
    Show,
    /// Print the flashcards: cards
    Cards,
    /// Print the score: score
    Score,
    /// Show or hide saved sessions: history
    History,
    /// Show help: help or ?
    Help,
    /// Leave the prompt: quit or q
    Quit,
    /// Empty line
    Nop,
}

/// Result of parsing a command
#[derive(Debug)]
pub enum ParseResult {
    /// Successfully parsed command
    Ok(Command),
    /// Unknown command
    UnknownCommand(String),
    /// Command needs an argument
    MissingArgument(String),
    /// Argument could not be understood
    InvalidArgument(String),
}

/// Parse one line typed at the prompt
pub fn parse_command(input: &str) -> ParseResult {
    let input = input.trim();

    if input.is_empty() {
        return ParseResult::Ok(Command::Nop);
    }

    // Split into command and arguments
    let mut parts = input.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("");
    let args = parts.next().map(|s| s.trim()).unwrap_or("");

    match cmd.to_lowercase().as_str() {
        "text" | "t" => {
            if args.is_empty() {
                ParseResult::MissingArgument("text".to_string())
            } else {
                ParseResult::Ok(Command::Text(args.to_string()))
            }
        }
        "file" | "f" | "upload" => {
            if args.is_empty() {
                ParseResult::MissingArgument("file".to_string())
            } else {
                ParseResult::Ok(Command::File(PathBuf::from(args)))
            }
        }
        "clear" | "unstage" => ParseResult::Ok(Command::Clear),
        "generate" | "gen" | "g" => ParseResult::Ok(Command::Generate),
        "answer" | "a" => parse_answer(args),
        "regen" | "regenerate" | "r" => ParseResult::Ok(Command::Regenerate),
        "new" | "discard" => ParseResult::Ok(Command::New),
        "save" | "s" => ParseResult::Ok(Command::Save),
        "speak" => ParseResult::Ok(Command::Speak),
        "stop" => ParseResult::Ok(Command::Stop),
        "audio" => ParseResult::Ok(Command::Audio),
        "show" => ParseResult::Ok(Command::Show),
        "cards" | "flashcards" => ParseResult::Ok(Command::Cards),
        "score" => ParseResult::Ok(Command::Score),
        "history" | "hist" => ParseResult::Ok(Command::History),
        "quit" | "q" | "exit" => ParseResult::Ok(Command::Quit),
        "help" | "h" | "?" => ParseResult::Ok(Command::Help),
        _ => ParseResult::UnknownCommand(cmd.to_string()),
    }
}

fn parse_answer(args: &str) -> ParseResult {
    let mut parts = args.splitn(2, char::is_whitespace);
    let (Some(number), Some(choice)) = (parts.next().filter(|n| !n.is_empty()), parts.next())
    else {
        return ParseResult::MissingArgument("answer".to_string());
    };
    let choice = choice.trim();
    if choice.is_empty() {
        return ParseResult::MissingArgument("answer".to_string());
    }

    match number.parse::<usize>() {
        Ok(question) if question > 0 => {
            ParseResult::Ok(Command::Answer { question, choice: choice.to_string() })
        }
        _ => ParseResult::InvalidArgument(format!("not a question number: {number}")),
    }
}
