//! Deterministic capitalization-based recognizer.
//!
//! PERSON: runs of 2-4 capitalized words on one line that contain no
//! excluded word, acronym or institution keyword.
//! ORG: runs of capitalized words (joined by connectors such as "of") that
//! contain an institution keyword, e.g. "University of Example".

use blindfold_core::{EntityLabel, EntityRecognizer, EntitySpan, RecognizerError};
use blindfold_rules::{is_stopword, profiles, LanguageProfile};
use once_cell::sync::Lazy;
use regex::Regex;

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{L}[\p{L}\p{M}'’\-]*\.?").expect("word pattern"));

const MIN_NAME_WORDS: usize = 2;
const MAX_NAME_WORDS: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Token<'t> {
    text: &'t str,
    start: usize,
    end: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PatternRecognizer;

impl PatternRecognizer {
    pub fn new() -> Self {
        Self
    }
}

impl EntityRecognizer for PatternRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, RecognizerError> {
        let profiles: Vec<&LanguageProfile> = profiles().iter().collect();
        let mut spans = Vec::new();

        for run in token_runs(text) {
            let mut i = 0;
            while i < run.len() {
                if !is_capitalized(run[i].text) {
                    i += 1;
                    continue;
                }

                // Extend across capitalized words and inner connectors.
                let mut last = i;
                let mut j = i + 1;
                while j < run.len() {
                    if is_capitalized(run[j].text) {
                        last = j;
                        j += 1;
                    } else if is_connector(&profiles, run[j].text)
                        && run.get(j + 1).is_some_and(|t| is_capitalized(t.text))
                    {
                        j += 1;
                    } else {
                        break;
                    }
                }

                let group = &run[i..=last];
                if group.iter().any(|t| is_institution(&profiles, t.text)) {
                    spans.push(span(text, EntityLabel::Organization, group));
                } else {
                    for names in group.split(|t| !is_capitalized(t.text)) {
                        if is_person(&profiles, names) {
                            spans.push(span(text, EntityLabel::Person, names));
                        }
                    }
                }
                i = last + 1;
            }
        }

        log::debug!("[Patterns] {} spans", spans.len());
        Ok(spans)
    }
}

/// Groups words separated only by spaces or tabs; any other character
/// (newline, comma, period) ends a run.
fn token_runs(text: &str) -> Vec<Vec<Token<'_>>> {
    let mut runs: Vec<Vec<Token>> = Vec::new();
    let mut current: Vec<Token> = Vec::new();

    for m in WORD.find_iter(text) {
        let token = Token {
            text: m.as_str(),
            start: m.start(),
            end: m.end(),
        };
        if let Some(prev) = current.last() {
            let gap = &text[prev.end..token.start];
            let joined = !prev.text.ends_with('.') || is_initial(prev.text);
            if !(joined && !gap.is_empty() && gap.chars().all(|c| c == ' ' || c == '\t')) {
                runs.push(std::mem::take(&mut current));
            }
        }
        current.push(token);
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn span(text: &str, label: EntityLabel, tokens: &[Token]) -> EntitySpan {
    let start = tokens[0].start;
    let mut end = tokens[tokens.len() - 1].end;
    // A sentence period after the last word is not part of the entity.
    let last = tokens[tokens.len() - 1].text;
    if last.ends_with('.') && !is_initial(last) {
        end -= 1;
    }
    EntitySpan {
        label,
        text: text[start..end].to_string(),
        start,
        end,
    }
}

fn is_initial(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(c), Some('.'), None) if c.is_uppercase()
    )
}

fn is_capitalized(word: &str) -> bool {
    if is_initial(word) {
        return true;
    }
    let word = word.trim_end_matches('.');
    word.split('-').all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) if first.is_uppercase() => {
                let rest: Vec<char> = chars.collect();
                !rest.is_empty() && rest.iter().all(|c| !c.is_uppercase())
            }
            _ => false,
        }
    })
}

fn is_connector(profiles: &[&LanguageProfile], word: &str) -> bool {
    profiles.iter().any(|p| p.is_connector(word))
}

fn is_institution(profiles: &[&LanguageProfile], word: &str) -> bool {
    let word = word.trim_end_matches('.');
    profiles.iter().any(|p| p.is_institution_word(word))
}

fn is_person(profiles: &[&LanguageProfile], tokens: &[Token]) -> bool {
    if tokens.len() < MIN_NAME_WORDS || tokens.len() > MAX_NAME_WORDS {
        return false;
    }
    // A name needs at least one full word besides initials.
    if tokens.iter().all(|t| is_initial(t.text)) {
        return false;
    }
    tokens.iter().all(|t| {
        let word = t.text.trim_end_matches('.');
        !is_stopword(word)
            && !profiles.iter().any(|p| p.name_excluded_words.contains(word))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(text: &str, label: EntityLabel) -> Vec<String> {
        PatternRecognizer
            .recognize(text)
            .unwrap()
            .into_iter()
            .filter(|s| s.label == label)
            .map(|s| s.text)
            .collect()
    }

    #[test]
    fn test_person_and_org() {
        let text = "John Smith\njohn@example.com\nABSTRACT\nThis work at Example University...";
        assert_eq!(labeled(text, EntityLabel::Person), vec!["John Smith"]);
        assert_eq!(labeled(text, EntityLabel::Organization), vec!["Example University"]);
    }

    #[test]
    fn test_offsets_match_text() {
        let text = "by Ada Lovelace, University of London.";
        for s in PatternRecognizer.recognize(text).unwrap() {
            assert_eq!(&text[s.start..s.end], s.text);
        }
        assert_eq!(labeled(text, EntityLabel::Organization), vec!["University of London"]);
        assert_eq!(labeled(text, EntityLabel::Person), vec!["Ada Lovelace"]);
    }

    #[test]
    fn test_initials_and_author_lists() {
        let text = "J. R. Tolkien, Mary Shelley and Ayşe Yılmaz";
        assert_eq!(
            labeled(text, EntityLabel::Person),
            vec!["J. R. Tolkien", "Mary Shelley", "Ayşe Yılmaz"]
        );
    }

    #[test]
    fn test_turkish_institution() {
        let text = "Bilgisayar Mühendisliği Bölümü, Kocaeli Üniversitesi";
        assert_eq!(
            labeled(text, EntityLabel::Organization),
            vec!["Bilgisayar Mühendisliği Bölümü", "Kocaeli Üniversitesi"]
        );
    }

    #[test]
    fn test_excluded_and_acronyms() {
        let text = "Figure Three shows BERT Results. The Model works.";
        assert!(labeled(text, EntityLabel::Person).is_empty());
    }
}
