//! Scoring engine
//!
//! Pure functions deciding correctness, XP rewards, aggregate scores and
//! levels. Nothing here touches storage; the session ledger calls into this
//! module and persists the results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// XP needed to advance one level
pub const XP_PER_LEVEL: i32 = 1000;

/// One of the four labelled options of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    pub const ALL: [AnswerOption; 4] = [AnswerOption::A, AnswerOption::B, AnswerOption::C, AnswerOption::D];

    /// Parses a submitted option
    ///
    /// Surrounding whitespace is ignored and the letter is matched
    /// case-insensitively. Anything other than a single letter A-D yields
    /// `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "A" | "a" => Some(AnswerOption::A),
            "B" | "b" => Some(AnswerOption::B),
            "C" | "c" => Some(AnswerOption::C),
            "D" | "d" => Some(AnswerOption::D),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerOption::A => "A",
            AnswerOption::B => "B",
            AnswerOption::C => "C",
            AnswerOption::D => "D",
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of grading one answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    pub is_correct: bool,
    /// XP granted; the question's reward when correct, else zero
    pub xp: i32,
}

/// Grades a submitted option against the correct one
///
/// A malformed submission is simply not correct. Negative rewards are
/// treated as zero so XP can never go down.
pub fn grade_answer(correct: &str, selected: &str, xp_reward: i32) -> Grade {
    let is_correct = match (AnswerOption::parse(correct), AnswerOption::parse(selected)) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    };
    Grade {
        is_correct,
        xp: if is_correct { xp_reward.max(0) } else { 0 },
    }
}

/// `correct / total * 100`, or 0 when nothing was answered
pub fn score_percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}

/// `floor(xp / 1000) + 1`
pub fn level_for_xp(xp: i32) -> i32 {
    xp.max(0) / XP_PER_LEVEL + 1
}

/// Adds earned XP to a running total, returning the new total and level
///
/// Saturates instead of overflowing and ignores negative deltas, so the
/// result is never below `current`.
pub fn award_xp(current: i32, earned: i32) -> (i32, i32) {
    let xp = current.saturating_add(earned.max(0));
    (xp, level_for_xp(xp))
}

/// Running aggregate for a batch of submitted answers
///
/// Every submitted answer counts in the denominator, including ones that
/// were rejected before grading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    submitted: usize,
    correct: usize,
    xp: i32,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a graded answer
    pub fn record(&mut self, grade: Grade) {
        self.submitted += 1;
        if grade.is_correct {
            self.correct += 1;
            self.xp = self.xp.saturating_add(grade.xp);
        }
    }

    /// Counts an answer that was rejected and earns nothing
    pub fn record_rejected(&mut self) {
        self.submitted += 1;
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn xp(&self) -> i32 {
        self.xp
    }

    pub fn score(&self) -> f64 {
        score_percentage(self.correct, self.submitted)
    }
}

impl FromIterator<Grade> for Tally {
    fn from_iter<I: IntoIterator<Item = Grade>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for grade in iter {
            tally.record(grade);
        }
        tally
    }
}
