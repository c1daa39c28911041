//! Language-aware heuristic data.
//!
//! - Language dependent: section keywords, name exclusions, institution vocabulary
//! - Common: e-mail and author-list patterns, organization denylist, stopwords
//!
//! All tables come from the embedded configuration; language is detected with
//! `whatlang` and falls back to a character check for Turkish.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use whatlang::{detect, Lang};

// ============================================================================
// Configuration schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct HeuristicsConfig {
    #[allow(dead_code)]
    version: String,
    supported_languages: Vec<String>,
    default_language: String,
    languages: HashMap<String, LanguageConfig>,
    common: CommonConfig,
    #[allow(dead_code)]
    separators: String,
}

#[derive(Debug, Deserialize)]
struct LanguageConfig {
    name: String,
    sections: SectionConfig,
    person_name: Option<PersonNameConfig>,
    institution: Option<InstitutionConfig>,
}

#[derive(Debug, Deserialize)]
struct SectionConfig {
    #[serde(rename = "abstract")]
    abstract_keywords: Vec<String>,
    references: Vec<String>,
    skip: Vec<String>,
    keyword_headers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PersonNameConfig {
    excluded_words: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct InstitutionConfig {
    keywords: Vec<String>,
    connectors: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CommonConfig {
    email: PatternConfig,
    author_list: PatternConfig,
    org_denylist: Vec<String>,
    stopwords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PatternConfig {
    patterns: Vec<String>,
}

// ============================================================================
// Static loading
// ============================================================================

static CONFIG: Lazy<HeuristicsConfig> = Lazy::new(|| {
    let json_str = include_str!("../data/heuristics.json");
    serde_json::from_str(json_str).expect("Failed to parse heuristics.json")
});

static PROFILES: Lazy<Vec<LanguageProfile>> = Lazy::new(|| {
    CONFIG
        .supported_languages
        .iter()
        .filter_map(|code| {
            let language = Language::from_code(code)?;
            let config = CONFIG.languages.get(code)?;
            Some(load_profile(language, config))
        })
        .collect()
});

static EMAIL_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| compile_patterns(&CONFIG.common.email.patterns));

static AUTHOR_LIST_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| compile_patterns(&CONFIG.common.author_list.patterns));

static ORG_DENYLIST: Lazy<HashSet<String>> = Lazy::new(|| {
    CONFIG
        .common
        .org_denylist
        .iter()
        .map(|s| s.to_lowercase())
        .collect()
});

static STOPWORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    CONFIG
        .common
        .stopwords
        .iter()
        .map(|s| s.to_lowercase())
        .collect()
});

fn load_profile(language: Language, config: &LanguageConfig) -> LanguageProfile {
    let lower = |items: &[String]| -> Vec<String> {
        items.iter().map(|s| s.to_lowercase()).collect()
    };

    let (institution_keywords, institution_connectors) = match &config.institution {
        Some(inst) => (
            inst.keywords.clone(),
            inst.connectors.clone().unwrap_or_default(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    LanguageProfile {
        language,
        name: config.name.clone(),
        abstract_keywords: lower(&config.sections.abstract_keywords),
        // References headings are matched case-sensitively.
        references_keywords: config.sections.references.clone(),
        skip_keywords: lower(&config.sections.skip),
        keyword_headers: lower(&config.sections.keyword_headers),
        name_excluded_words: config
            .person_name
            .as_ref()
            .map(|p| p.excluded_words.iter().cloned().collect())
            .unwrap_or_default(),
        institution_keywords,
        institution_connectors,
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

// ============================================================================
// Language detection
// ============================================================================

/// Supported document languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Turkish,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Turkish => "tr",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Language::English),
            "tr" => Some(Language::Turkish),
            _ => None,
        }
    }
}

/// Detects the language of `text`, or `None` when it is neither supported language.
pub fn detect_language(text: &str) -> Option<Language> {
    if let Some(info) = detect(text) {
        match info.lang() {
            Lang::Eng => return Some(Language::English),
            Lang::Tur => return Some(Language::Turkish),
            _ => {}
        }
    }
    detect_by_chars(text)
}

/// Character-based fallback: Turkish-only letters are a strong signal.
fn detect_by_chars(text: &str) -> Option<Language> {
    let mut turkish = 0usize;
    let mut latin = 0usize;

    for c in text.chars() {
        match c {
            'ğ' | 'Ğ' | 'ı' | 'İ' | 'ş' | 'Ş' => {
                turkish += 1;
                latin += 1;
            }
            c if c.is_ascii_alphabetic() => latin += 1,
            _ => {}
        }
    }

    if latin == 0 {
        return None;
    }
    if turkish > 0 {
        return Some(Language::Turkish);
    }
    None
}

// ============================================================================
// Profiles
// ============================================================================

/// Per-language vocabulary used by the locator and detector.
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    pub language: Language,
    pub name: String,
    /// Lowercase abstract headings.
    pub abstract_keywords: Vec<String>,
    /// Case-sensitive references headings.
    pub references_keywords: Vec<String>,
    /// Lowercase headings of sections that are never scanned.
    pub skip_keywords: Vec<String>,
    /// Lowercase headers that introduce a keyword list.
    pub keyword_headers: Vec<String>,
    pub name_excluded_words: HashSet<String>,
    pub institution_keywords: Vec<String>,
    pub institution_connectors: Vec<String>,
}

impl LanguageProfile {
    /// True when `word` (any case) is an institution keyword of this language.
    pub fn is_institution_word(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.institution_keywords
            .iter()
            .any(|k| k.to_lowercase() == word)
    }

    pub fn is_connector(&self, word: &str) -> bool {
        self.institution_connectors.iter().any(|c| c == word)
    }

    /// True when any whole word of `line` is an institution keyword.
    pub fn line_has_institution(&self, line: &str) -> bool {
        line.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .any(|w| self.is_institution_word(w))
    }
}

/// All supported profiles, in configuration order.
pub fn profiles() -> &'static [LanguageProfile] {
    &PROFILES
}

pub fn profile(language: Language) -> Option<&'static LanguageProfile> {
    PROFILES.iter().find(|p| p.language == language)
}

/// Profiles to apply to `text`: the detected language only, or every profile
/// when detection is inconclusive.
pub fn profiles_for(text: &str) -> Vec<&'static LanguageProfile> {
    match detect_language(text).and_then(profile) {
        Some(p) => vec![p],
        None => {
            let default = Language::from_code(&CONFIG.default_language);
            let mut all: Vec<&LanguageProfile> = PROFILES.iter().collect();
            // Default language first so its fallbacks win ties.
            all.sort_by_key(|p| Some(p.language) != default);
            all
        }
    }
}

// ============================================================================
// Common tables
// ============================================================================

pub fn email_patterns() -> &'static [Regex] {
    &EMAIL_PATTERNS
}

pub fn author_list_patterns() -> &'static [Regex] {
    &AUTHOR_LIST_PATTERNS
}

/// Dataset and method acronyms that recognizers commonly tag as organizations.
pub fn is_denylisted_org(text: &str) -> bool {
    ORG_DENYLIST.contains(&text.trim().to_lowercase())
}

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word.to_lowercase())
}
