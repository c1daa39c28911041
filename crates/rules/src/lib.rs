//! Heuristic tables for paper anonymization.
//!
//! Section landmarks, institution vocabularies, e-mail and author-list
//! patterns are embedded from `data/heuristics.json` and compiled once.

mod heuristics;

pub use heuristics::{
    author_list_patterns, detect_language, email_patterns, is_denylisted_org, is_stopword,
    profile, profiles, profiles_for, Language, LanguageProfile,
};
