//! Candidate entity detection.

use crate::model::{Bands, Category, Options, StructuralMarks};
use crate::text::{PageText, TextLine};
use blindfold_rules::{author_list_patterns, email_patterns, is_denylisted_org, profiles_for};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

// ============================================================================
// Recognizer seam
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityLabel {
    Person,
    Organization,
    Other,
}

/// A labeled span of the text passed to [`EntityRecognizer::recognize`].
/// `start..end` are byte offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpan {
    pub label: EntityLabel,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("recognizer unavailable: {0}")]
    Unavailable(String),
    #[error("recognition failed: {0}")]
    Failed(String),
}

/// Named-entity recognizer injected into the detector.
pub trait EntityRecognizer: Send + Sync {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, RecognizerError>;
}

// ============================================================================
// Detection
// ============================================================================

/// A span of page text that should be redacted wherever it is eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub category: Category,
    pub text: String,
}

pub struct EntityDetector<'a> {
    recognizer: &'a dyn EntityRecognizer,
    bands: Bands,
}

impl<'a> EntityDetector<'a> {
    pub fn new(recognizer: &'a dyn EntityRecognizer, bands: Bands) -> Self {
        Self { recognizer, bands }
    }

    /// Candidates for one page, in category order name, contact, institution.
    ///
    /// The line fallbacks only consider front-matter lines according to
    /// `marks`. A recognizer failure aborts the run; no partial result is
    /// returned.
    pub fn detect(
        &self,
        page: &PageText,
        options: &Options,
        marks: &StructuralMarks,
    ) -> Result<Vec<Candidate>, RecognizerError> {
        let text = page.text();
        let wants_entities =
            options.enabled(Category::Name) || options.enabled(Category::Institution);
        let spans = if wants_entities && !text.trim().is_empty() {
            self.recognizer.recognize(&text)?
        } else {
            Vec::new()
        };

        let mut raw: Vec<Candidate> = Vec::new();

        if options.enabled(Category::Name) {
            let names: Vec<Candidate> = spans
                .iter()
                .filter(|s| s.label == EntityLabel::Person)
                .map(|s| candidate(Category::Name, &s.text))
                .collect();
            if names.is_empty() {
                if let Some(fallback) = self.author_list_fallback(page, marks) {
                    log::debug!("[Detect] page {} author-list fallback", page.index);
                    raw.push(fallback);
                }
            }
            raw.extend(names);
        }

        if options.enabled(Category::Contact) {
            for re in email_patterns() {
                raw.extend(re.find_iter(&text).map(|m| candidate(Category::Contact, m.as_str())));
            }
        }

        if options.enabled(Category::Institution) {
            let orgs: Vec<Candidate> = spans
                .iter()
                .filter(|s| s.label == EntityLabel::Organization)
                .filter(|s| !is_denylisted_org(&s.text))
                .map(|s| candidate(Category::Institution, &s.text))
                .collect();
            if orgs.is_empty() {
                if let Some(fallback) = self.institution_fallback(page, &text, marks) {
                    log::debug!("[Detect] page {} institution fallback", page.index);
                    raw.push(fallback);
                }
            }
            raw.extend(orgs);
        }

        let candidates = dedup_and_split(raw);
        log::info!(
            "[Detect] page {}: {} candidates",
            page.index,
            candidates.len()
        );
        Ok(candidates)
    }

    fn fallback_line_count(&self, page: &PageText) -> usize {
        let n = (page.lines.len() as f32 * self.bands.fallback).ceil() as usize;
        n.max(1).min(page.lines.len())
    }

    /// Top lines of `page` that are still front matter.
    fn fallback_lines<'p>(
        &self,
        page: &'p PageText,
        marks: &'p StructuralMarks,
    ) -> impl Iterator<Item = &'p TextLine> + 'p {
        let limit = self.fallback_line_count(page);
        page.lines[..limit]
            .iter()
            .filter(move |line| marks.is_front_matter(page.index, line.rect.y0))
    }

    /// First comma-joined capitalized author line among the top lines.
    fn author_list_fallback(&self, page: &PageText, marks: &StructuralMarks) -> Option<Candidate> {
        self.fallback_lines(page, marks)
            .find(|line| author_list_patterns().iter().any(|re| re.is_match(&line.text)))
            .map(|line| candidate(Category::Name, &line.text))
    }

    /// First top line containing an institution keyword of the page language.
    fn institution_fallback(
        &self,
        page: &PageText,
        text: &str,
        marks: &StructuralMarks,
    ) -> Option<Candidate> {
        let profiles = profiles_for(text);
        self.fallback_lines(page, marks)
            .find(|line| profiles.iter().any(|p| p.line_has_institution(&line.text)))
            .map(|line| candidate(Category::Institution, &line.text))
    }
}

fn candidate(category: Category, text: &str) -> Candidate {
    Candidate {
        category,
        text: text.trim().to_string(),
    }
}

/// Splits multi-line spans into per-line pieces and keeps the first category
/// seen for each distinct text.
fn dedup_and_split(raw: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for c in raw {
        for piece in c.text.split('\n').map(str::trim).filter(|p| !p.is_empty()) {
            if seen.insert(piece.to_string()) {
                out.push(Candidate {
                    category: c.category,
                    text: piece.to_string(),
                });
            }
        }
    }

    out
}
