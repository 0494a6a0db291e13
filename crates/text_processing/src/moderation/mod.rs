//! Transcript moderation
//!
//! Runs before analysis. Profanity and moderate threats become flags, personal
//! data is masked, and severe threats abort the session.

mod filter;
mod rules;

pub use filter::{ModerationFilter, ModerationOutcome, ThreatLevel};
pub use rules::{default_rules, ModerationRules, PiiRule};
