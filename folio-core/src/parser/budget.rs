//! Deadline-bounded regex execution.
//!
//! Every pattern attempt of one parse call shares a single deadline. The
//! deadline is checked before and after each attempt; an attempt that
//! starts after, or finishes past, the deadline counts as a non-match and
//! every later attempt is skipped. Inputs are truncated and patterns are
//! compiled with size limits so a single attempt stays short.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use regex::{Captures, Regex, RegexBuilder};
use tracing::warn;

/// Longest filename fragment handed to the pattern cascade.
pub const MAX_INPUT_CHARS: usize = 512;

const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Compile a pattern from a static table with bounded program size.
pub fn compile(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .dfa_size_limit(REGEX_SIZE_LIMIT)
        .build()
        .expect("static filename pattern should compile")
}

/// Truncate on a char boundary.
pub fn bounded_input(value: &str) -> &str {
    match value.char_indices().nth(MAX_INPUT_CHARS) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

#[derive(Debug)]
pub struct MatchBudget {
    deadline: Option<Instant>,
    exhausted: bool,
}

impl MatchBudget {
    pub fn new(budget: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(budget),
            exhausted: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn captures<'t>(
        &mut self,
        family: &'static str,
        pattern: &Regex,
        text: &'t str,
    ) -> Option<Captures<'t>> {
        self.attempt(family, || pattern.captures(text))
    }

    /// Remove every match of `pattern`; leaves `text` untouched once the
    /// budget is spent.
    pub fn strip<'t>(
        &mut self,
        family: &'static str,
        pattern: &Regex,
        text: &'t str,
    ) -> Cow<'t, str> {
        self.attempt(family, || Some(pattern.replace_all(text, " ")))
            .unwrap_or(Cow::Borrowed(text))
    }

    fn attempt<T>(
        &mut self,
        family: &'static str,
        run: impl FnOnce() -> Option<T>,
    ) -> Option<T> {
        if self.exhausted || self.past_deadline() {
            self.exhaust(family);
            return None;
        }
        let result = run();
        if self.past_deadline() {
            self.exhaust(family);
            return None;
        }
        result
    }

    fn past_deadline(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn exhaust(&mut self, family: &'static str) {
        if !self.exhausted {
            warn!(
                target: "scan::parse",
                pattern = family,
                "filename parse budget exhausted; remaining patterns skipped"
            );
        }
        self.exhausted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_never_matches() {
        let pattern = compile(r"\d+");
        let mut budget = MatchBudget::new(Duration::ZERO);
        assert!(budget.captures("digits", &pattern, "abc 123").is_none());
        assert_eq!(budget.strip("digits", &pattern, "a1"), "a1");
        assert!(budget.is_exhausted());
    }

    #[test]
    fn generous_budget_matches() {
        let pattern = compile(r"(?P<n>\d+)");
        let mut budget = MatchBudget::new(Duration::from_secs(5));
        let caps = budget.captures("digits", &pattern, "abc 123").unwrap();
        assert_eq!(&caps["n"], "123");
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn bounds_input_on_char_boundary() {
        let long = "é".repeat(MAX_INPUT_CHARS + 10);
        assert_eq!(bounded_input(&long).chars().count(), MAX_INPUT_CHARS);
        assert_eq!(bounded_input("short"), "short");
    }
}
