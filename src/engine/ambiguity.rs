//! Choosing one variant when a rice ships several.
use std::io::{BufRead, Write};

/// What a resolver decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Deploy this variant.
    Choice(String),
    /// Abort the apply.
    Cancel,
}

/// Decides which variant of a multi-variant rice is applied.
#[cfg_attr(test, mockall::automock)]
pub trait AmbiguityResolver: Send + Sync {
    /// Pick one of `candidates` (sorted, at least two) or cancel.
    fn resolve(&self, candidates: &[String]) -> Resolution;
}

/// Always takes the first candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstCandidate;

impl AmbiguityResolver for FirstCandidate {
    fn resolve(&self, candidates: &[String]) -> Resolution {
        candidates
            .first()
            .map_or(Resolution::Cancel, |c| Resolution::Choice(c.clone()))
    }
}

/// Refuses to choose.
#[derive(Debug, Default, Clone, Copy)]
pub struct CancelAll;

impl AmbiguityResolver for CancelAll {
    fn resolve(&self, _candidates: &[String]) -> Resolution {
        Resolution::Cancel
    }
}

/// A choice made up front (`--choose`).
#[derive(Debug, Clone)]
pub struct Preselected(pub String);

impl AmbiguityResolver for Preselected {
    fn resolve(&self, _candidates: &[String]) -> Resolution {
        Resolution::Choice(self.0.clone())
    }
}

/// Asks on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptResolver;

impl AmbiguityResolver for PromptResolver {
    fn resolve(&self, candidates: &[String]) -> Resolution {
        let stdin = std::io::stdin();
        prompt(candidates, &mut stdin.lock(), &mut std::io::stderr())
    }
}

/// Print a numbered menu to `output` and read one answer from `input`.
///
/// Accepts a number or a variant name; anything else, an empty answer or
/// end of input cancels.
pub fn prompt(candidates: &[String], input: &mut impl BufRead, output: &mut impl Write) -> Resolution {
    let _ = writeln!(output, "This rice ships several variants:");
    for (i, c) in candidates.iter().enumerate() {
        let _ = writeln!(output, "  {}) {c}", i + 1);
    }
    let _ = write!(output, "Choose one [1-{}], empty to cancel: ", candidates.len());
    let _ = output.flush();

    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return Resolution::Cancel;
    }
    let answer = answer.trim();
    if answer.is_empty() {
        return Resolution::Cancel;
    }
    if let Ok(n) = answer.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| candidates.get(i))
            .map_or(Resolution::Cancel, |c| Resolution::Choice(c.clone()));
    }
    candidates
        .iter()
        .find(|c| c.as_str() == answer)
        .map_or(Resolution::Cancel, |c| Resolution::Choice(c.clone()))
}
