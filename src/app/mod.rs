//! Interactive study prompt

pub mod command;

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::{InputError, SessionError};
use crate::history::HistoryEntry;
use crate::narration::SpeechToggle;
use crate::session::grading::{normalize_option, option_key};
use crate::session::ports::{Generator, HistoryService, Synthesizer, Verifier};
use crate::session::{AnswerOutcome, Completion, Flashcard, Mcq, SourceFile, StudySession, Verdict};
use command::{Command, ParseResult, parse_command};

/// Width used when wrapping long text
const WRAP_WIDTH: usize = 80;

const HELP: &str = "\
Commands:
  text <content>        stage text to study
  file <path>           stage a document
  clear                 drop the staged text or document
  generate              build a study set from the staged input
  show                  print questions and summary
  cards                 print flashcards
  answer <n> <choice>   answer question n with a letter or option text
  score                 print progress
  regen                 new study set from the same source
  speak                 start or stop reading the summary aloud
  stop                  stop reading
  audio                 save the summary as an audio file
  save                  save to history and start over
  new                   discard everything and start over
  history               show or hide saved sessions
  quit                  leave";

/// The interactive study prompt
pub struct App<B> {
    session: Arc<StudySession<B>>,
}

impl<B> App<B>
where
    B: Generator + Verifier + HistoryService + Synthesizer + 'static,
{
    pub fn new(session: StudySession<B>) -> Self {
        Self { session: Arc::new(session) }
    }

    /// Read commands from stdin until `quit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        println!("Studyset. Type `help` for commands.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            match parse_command(&line) {
                ParseResult::Ok(command) => match self.handle_command(command).await {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!("Error handling command: {}", e);
                    }
                },
                ParseResult::UnknownCommand(cmd) => {
                    println!("Unknown command: {cmd}. Type `help` for commands.");
                }
                ParseResult::MissingArgument(cmd) => println!("`{cmd}` needs an argument"),
                ParseResult::InvalidArgument(reason) => println!("{reason}"),
            }
        }

        // Leaving the prompt counts as hiding the view
        self.session.on_hidden();
        self.session.discard();
        Ok(())
    }

    /// Handle one command, returns true if should exit
    pub async fn handle_command(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Text(text) => {
                let replacing = !self.session.inspect(|s| s.selector().can_use_text());
                self.session.set_text(text);
                if replacing {
                    println!("Text staged, replacing the staged document.");
                } else {
                    println!("Text staged.");
                }
            }
            Command::File(path) => {
                let file = SourceFile::read(&path).await?;
                if file.payload.is_empty() {
                    report(&InputError::EmptyFile.into());
                } else {
                    if !self.session.inspect(|s| s.selector().can_use_file()) {
                        println!("Replacing the staged text.");
                    }
                    println!("Staged {} ({} bytes).", file.filename, file.payload.len());
                    self.session.set_file(Some(file));
                }
            }
            Command::Clear => {
                self.session.clear_input();
                println!("Nothing staged.");
            }
            Command::Generate => {
                println!("Generating study set...");
                let result = self.session.generate().await;
                self.after_generation(result);
            }
            Command::Regenerate => {
                println!("Regenerating study set...");
                let result = self.session.regenerate().await;
                self.after_generation(result);
            }
            Command::Answer { question, choice } => match question.checked_sub(1) {
                Some(index) => self.answer(index, &choice),
                None => println!("Questions are numbered from 1."),
            },
            Command::Show => self.show(),
            Command::Cards => match self.session.study_set() {
                Some(set) => {
                    for (i, card) in set.flashcards.iter().enumerate() {
                        println!("{}", render_flashcard(i, card));
                    }
                }
                None => report(&InputError::NoResults.into()),
            },
            Command::Score => println!("{}", self.session.progress()),
            Command::Speak => match self.session.speak_summary() {
                Ok(SpeechToggle::Started) => println!("Reading summary aloud."),
                Ok(SpeechToggle::Stopped) => println!("Stopped reading."),
                Err(e) => report(&e),
            },
            Command::Stop => self.session.on_focus_lost(),
            Command::Audio => {
                println!("Generating audio...");
                match self.session.generate_audio().await {
                    Ok(Completion::Applied(path)) => println!("Audio saved to {}", path.display()),
                    Ok(Completion::Stale) => {}
                    Err(e) => report(&e),
                }
            }
            Command::Save => match self.session.save_and_start_new().await {
                Ok(Completion::Applied(())) => println!("Saved to history. Ready for a new source."),
                Ok(Completion::Stale) => println!("Saved to history."),
                Err(e) => report(&e),
            },
            Command::New => {
                self.session.discard();
                println!("Cleared. Ready for a new source.");
            }
            Command::History => {
                let history = self.session.history();
                if history.is_visible() {
                    history.set_visible(false).await?;
                    println!("History hidden.");
                } else {
                    if let Err(e) = history.set_visible(true).await {
                        report(&e.into());
                    }
                    print_history(&history.items());
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(true),
            Command::Nop => {}
        }
        Ok(false)
    }

    fn after_generation(&self, result: Result<Completion<()>, SessionError>) {
        match result {
            Ok(Completion::Applied(())) => self.show(),
            Ok(Completion::Stale) => tracing::debug!("Generation result discarded"),
            Err(e) => report(&e),
        }
    }

    fn show(&self) {
        let Some(set) = self.session.study_set() else {
            report(&InputError::NoResults.into());
            return;
        };
        for (i, mcq) in set.mcqs.iter().enumerate() {
            println!("{}", render_mcq(i, mcq, self.session.verdict(i).as_ref()));
        }
        println!("Summary:\n{}\n", textwrap::fill(&set.summary, WRAP_WIDTH));
        println!("{}", self.session.progress());
    }

    /// Verify in the background so other questions can be answered meanwhile
    fn answer(&self, index: usize, choice: &str) {
        let Some(set) = self.session.study_set() else {
            report(&InputError::NoResults.into());
            return;
        };
        let Some(mcq) = set.mcqs.get(index) else {
            println!("There is no question {}. Questions run 1 to {}.", index + 1, set.mcqs.len());
            return;
        };
        let Some(selected) = resolve_choice(mcq, choice) else {
            println!("Question {} has no option {:?}", index + 1, choice);
            return;
        };

        let session = Arc::clone(&self.session);
        tokio::spawn(async move {
            match session.answer(index, &selected).await {
                Ok(AnswerOutcome::Recorded(verdict)) => {
                    println!("{}", render_verdict(index, &verdict));
                    println!("{}", session.progress());
                }
                Ok(AnswerOutcome::AlreadyAnswered) => {
                    println!("Question {} is already answered.", index + 1);
                }
                Ok(AnswerOutcome::InFlight) => {
                    println!("Question {} is still being checked.", index + 1);
                }
                Ok(AnswerOutcome::Discarded) => {}
                Err(e) => report(&e),
            }
        });
    }
}

fn report(error: &SessionError) {
    if !error.is_user_correctable() {
        tracing::warn!("{}", error);
    }
    println!("{}", error_message(error));
}

fn error_message(error: &SessionError) -> String {
    if error.is_user_correctable() {
        error.to_string()
    } else if error.is_retryable() {
        format!("Error: {error}. Try again.")
    } else {
        format!("Error: {error}")
    }
}

/// Match a typed choice against the options of a question
///
/// A bare label such as `c` or `C)` picks the option carrying it, or the option in
/// that position when options are unlabelled. Anything else must match an
/// option's text.
pub fn resolve_choice(mcq: &Mcq, choice: &str) -> Option<String> {
    let wanted = normalize_option(choice);
    if wanted.is_empty() {
        let key = option_key(choice)?;
        return mcq
            .options
            .iter()
            .find(|option| option_key(option) == Some(key))
            .or_else(|| mcq.options.get((key as u8 - b'A') as usize))
            .cloned();
    }

    mcq.options.iter().find(|option| normalize_option(option) == wanted).cloned()
}

/// Render a question with its options and verdict marks
pub fn render_mcq(index: usize, mcq: &Mcq, verdict: Option<&Verdict>) -> String {
    let mut out = textwrap::fill(&format!("{}. {}", index + 1, mcq.question), WRAP_WIDTH);
    out.push('\n');
    for (i, option) in mcq.options.iter().enumerate() {
        let mark = match verdict {
            Some(v) if v.marks_option_correct(i, option) => "+",
            Some(v) if *option == v.selected_answer => "x",
            _ => " ",
        };
        out.push_str(&format!("  [{mark}] {option}\n"));
    }
    out
}

/// Render the outcome of one answer
pub fn render_verdict(index: usize, verdict: &Verdict) -> String {
    let headline = if verdict.is_correct {
        format!("Question {}: Correct!", index + 1)
    } else {
        format!("Question {}: Incorrect. Correct answer: {}", index + 1, verdict.correct_answer)
    };
    if verdict.explanation.is_empty() {
        headline
    } else {
        format!("{headline}\n{}", textwrap::fill(&verdict.explanation, WRAP_WIDTH))
    }
}

fn render_flashcard(index: usize, card: &Flashcard) -> String {
    format!(
        "Card {}\n  Front: {}\n  Back: {}",
        index + 1,
        textwrap::fill(&card.front, WRAP_WIDTH),
        textwrap::fill(&card.back, WRAP_WIDTH)
    )
}

/// Print a one-line summary of each saved session
pub fn print_history(items: &[HistoryEntry]) {
    if items.is_empty() {
        println!("No saved sessions.");
        return;
    }
    for entry in items {
        println!("{}  {}  {}", entry.id, entry.created_at, entry.headline());
    }
}

/// Print one saved session in full
pub fn print_entry(entry: &HistoryEntry) {
    println!("{}\n{}\n", entry.headline(), textwrap::fill(entry.preview(), WRAP_WIDTH));
    for (i, mcq) in entry.mcqs.iter().enumerate() {
        println!("{}", render_mcq(i, mcq, None));
    }
    for (i, card) in entry.flashcards.iter().enumerate() {
        println!("{}", render_flashcard(i, card));
    }
    if !entry.summary.is_empty() {
        println!("\nSummary:\n{}", textwrap::fill(&entry.summary, WRAP_WIDTH));
    }
}
