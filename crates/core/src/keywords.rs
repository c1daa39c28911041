//! Keyword extraction for editor-side topic matching.

use crate::text::PageText;
use blindfold_rules::{is_stopword, profiles};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static ABSTRACT_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)(?:abstract|özet)(.*?)(?:introduction|giriş)").unwrap());

/// Roman or arabic section number that ends a keyword list, e.g. ` I.` or ` 1.`.
static SECTION_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+[A-Z0-9]+\s*\.").unwrap());

static LIST_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;,]").unwrap());

/// Author keywords of the paper, or the `top_n` most frequent content
/// phrases when the paper declares none.
pub fn extract_keywords(pages: &[PageText], top_n: usize) -> Vec<String> {
    let joined = pages
        .iter()
        .map(|p| p.text())
        .collect::<Vec<_>>()
        .join("\n");
    let text = WHITESPACE.replace_all(&joined, " ").into_owned();

    let section = ABSTRACT_SECTION
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text.as_str());

    if let Some(list) = declared_keywords(section) {
        log::info!("[Keywords] {} declared keywords", list.len());
        return list;
    }

    let top = frequent_phrases(&text, top_n);
    log::info!("[Keywords] {} frequent phrases", top.len());
    top
}

fn declared_keywords(section: &str) -> Option<Vec<String>> {
    for header in profiles().iter().flat_map(|p| p.keyword_headers.iter()) {
        let pattern = format!(r"(?i){}[\s:\-–—]+(.+)", regex::escape(header));
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        let Some(rest) = re.captures(section).and_then(|c| c.get(1)) else {
            continue;
        };

        let rest = rest.as_str();
        let list = match SECTION_MARKER.find(rest) {
            Some(m) => &rest[..m.start()],
            None => rest,
        };

        let keywords: Vec<String> = LIST_SPLIT
            .split(list)
            .map(|k| k.trim().trim_end_matches('.').trim().to_string())
            .filter(|k| !k.is_empty() && k.to_lowercase() != "component")
            .collect();
        if !keywords.is_empty() {
            return Some(keywords);
        }
    }
    None
}

/// Counts 1-3 word runs of non-stopwords; ties keep first appearance.
fn frequent_phrases(text: &str, top_n: usize) -> Vec<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|w| w.trim_matches('-').to_lowercase())
        .collect();

    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;

    for start in 0..words.len() {
        for len in 1..=3 {
            let Some(run) = words.get(start..start + len) else {
                break;
            };
            if run.iter().any(|w| !is_content_word(w)) {
                break;
            }
            let phrase = run.join(" ");
            let entry = counts.entry(phrase).or_insert_with(|| {
                order += 1;
                (0, order)
            });
            entry.0 += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(phrase, (count, first))| (phrase, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(top_n).map(|(p, _, _)| p).collect()
}

fn is_content_word(word: &str) -> bool {
    word.chars().count() > 2 && !is_stopword(word) && !word.chars().all(|c| c.is_numeric())
}
