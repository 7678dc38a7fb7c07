//! Option matching and verdict resolution

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::models::VerifyResponse;
use crate::error::VerificationError;

use super::model::{Mcq, Verdict};

static OPTION_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Da-d])(?:[).:\-\s]|$)").expect("valid option key regex"));

static OPTION_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Da-d](?:[).:\-\s]+|$)").expect("valid option label regex"));

const DEFAULT_EXPLANATION: &str = "Checked with stored answer key.";

/// Extract the option letter ("A".."D") from a labelled option
pub fn option_key(value: &str) -> Option<char> {
    OPTION_KEY_RE
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_uppercase())
}

/// Strip a leading option label and lowercase the rest
pub fn normalize_option(value: &str) -> String {
    OPTION_LABEL_RE.replace(value.trim(), "").trim().to_lowercase()
}

/// Compare an option against an answer by label, falling back to text
pub fn is_correct_option(option: &str, answer: &str) -> bool {
    match (option_key(option), option_key(answer)) {
        (Some(a), Some(b)) => a == b,
        _ => normalize_option(option) == normalize_option(answer),
    }
}

/// Position of the selected answer among the question's options
fn selected_index(options: &[String], selected: &str) -> Option<usize> {
    options.iter().position(|o| o == selected).or_else(|| {
        let normalized = normalize_option(selected);
        options.iter().position(|o| normalize_option(o) == normalized)
    })
}

/// Turn a verifier response into a verdict for `mcq`
///
/// The verifier's `is_correct` is authoritative. Without it, correctness
/// is derived from the returned `correct_index` (by option position) or
/// the returned correct answer text. The local advisory answer is only
/// used as display text.
pub fn resolve_verdict(
    mcq: &Mcq,
    selected: &str,
    response: VerifyResponse,
) -> Result<Verdict, VerificationError> {
    if let Some(error) = response.error {
        return Err(VerificationError::Remote(error));
    }

    let correct_index = response
        .correct_index
        .and_then(|i| usize::try_from(i).ok())
        .filter(|&i| mcq.options.is_empty() || i < mcq.options.len());
    let correct_answer = response.correct_answer.filter(|a| !a.trim().is_empty());

    let is_correct = match (response.is_correct, correct_index, &correct_answer) {
        (Some(flag), _, _) => flag,
        (None, Some(ci), answer) => match selected_index(&mcq.options, selected) {
            Some(si) => si == ci,
            None => answer.as_deref().is_some_and(|a| is_correct_option(selected, a)),
        },
        (None, None, Some(answer)) => is_correct_option(selected, answer),
        (None, None, None) => {
            return Err(VerificationError::Remote(
                "Verification response carried no result".to_string(),
            ));
        }
    };

    Ok(Verdict {
        selected_answer: selected.to_string(),
        is_correct,
        correct_answer: correct_answer.unwrap_or_else(|| mcq.answer.clone()),
        correct_index,
        correct_option: response.correct_option.unwrap_or_default(),
        explanation: response
            .explanation
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string()),
    })
}
