//! Prompt analysis for the retrieval pipeline.
//!
//! [`QueryAnalysis::analyze`] is pure: no I/O, no mutation, reproducible
//! for the same input, and cheap enough to run on every prompt. The
//! pipeline threads the analysis through planners and scorers instead of
//! sharing it through process state.

use regex::Regex;
use std::sync::OnceLock;

/// Interaction mode inferred from the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Open-ended information seeking.
    Exploring,
    /// Focused follow-up on a known topic.
    Deepening,
    /// Imperative work request.
    Executing,
    /// Retrospective evaluation.
    Reflecting,
    /// Greetings and chit-chat; bypasses retrieval.
    Socializing,
}

/// Everything the pipeline needs to know about a prompt.
#[derive(Debug, Clone)]
pub struct QueryAnalysis {
    /// True when the prompt is pure chit-chat and retrieval is skipped.
    pub is_conversational: bool,
    /// True when the prompt asks about recent activity; routes to the
    /// recency planner.
    pub has_recency_intent: bool,
    /// Inferred interaction mode.
    pub mode: PromptMode,
    /// High-precision terms: quoted phrases, acronyms, hyphenated terms.
    pub specific_terms: Vec<String>,
    /// Lower-precision content words (length >= 5, non-stopword).
    pub broad_terms: Vec<String>,
    /// Terms used for title/path overlap scoring.
    pub title_terms: Vec<String>,
    /// Up to five terms echoed back to the user.
    pub display_terms: Vec<String>,
}

impl QueryAnalysis {
    /// Analyzes a prompt. Pure and reproducible.
    #[must_use]
    pub fn analyze(prompt: &str) -> Self {
        let is_conversational = is_conversational(prompt);
        let (specific_terms, broad_terms) = extract_key_terms(prompt);
        let mode = if is_conversational {
            PromptMode::Socializing
        } else {
            classify_mode(prompt)
        };
        Self {
            is_conversational,
            has_recency_intent: has_recency_intent(prompt),
            mode,
            title_terms: query_words_for_title_match(prompt),
            display_terms: extract_display_terms(prompt),
            specific_terms,
            broad_terms,
        }
    }

    /// True when the prompt carries too little signal to search on:
    /// no specific terms and at most one broad term.
    #[must_use]
    pub fn has_low_signal(&self) -> bool {
        self.specific_terms.is_empty() && self.broad_terms.len() <= 1
    }

    /// Current topic terms for the topic gate: specific then broad,
    /// lowercased, deduped, insertion-ordered.
    #[must_use]
    pub fn topic_terms(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for term in self.specific_terms.iter().chain(self.broad_terms.iter()) {
            let lower = term.to_lowercase();
            if !seen.contains(&lower) {
                seen.push(lower);
            }
        }
        seen
    }
}

/// Exact phrases that are conversational regardless of length.
const CONVERSATIONAL_PHRASES: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "yo",
    "thanks",
    "thank you",
    "thanks a lot",
    "ok",
    "okay",
    "cool",
    "nice",
    "great",
    "good",
    "perfect",
    "awesome",
    "yes",
    "no",
    "yep",
    "nope",
    "sure",
    "sounds good",
    "lgtm",
    "good morning",
    "good afternoon",
    "good evening",
    "good night",
    "how are you",
    "whats up",
    "what's up",
    "bye",
    "goodbye",
    "see you",
];

/// Words that keep a short prompt conversational.
const CONVERSATIONAL_WORDS: &[&str] = &[
    "hi", "hello", "hey", "yo", "thanks", "thank", "you", "ok", "okay", "cool", "nice", "great",
    "good", "perfect", "awesome", "yes", "no", "yep", "nope", "sure", "sounds", "lgtm", "morning",
    "afternoon", "evening", "night", "bye", "goodbye", "see", "please", "haha", "lol",
];

fn normalize_conversational(prompt: &str) -> String {
    prompt
        .trim()
        .to_lowercase()
        .trim_end_matches(['.', '!', '?', ','])
        .to_string()
}

/// True when the entire prompt is chit-chat.
#[must_use]
pub fn is_conversational(prompt: &str) -> bool {
    let normalized = normalize_conversational(prompt);
    if normalized.is_empty() {
        return true;
    }
    if CONVERSATIONAL_PHRASES.contains(&normalized.as_str()) {
        return true;
    }
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    tokens.len() <= 5
        && tokens.iter().all(|t| {
            CONVERSATIONAL_WORDS.contains(&t.trim_matches(|c: char| !c.is_alphanumeric()))
        })
}

#[allow(clippy::unwrap_used)]
fn recency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(recent(ly)?|lately|yesterday|today|last (week|time|session|night)|this (week|morning)|latest|what (did|have) (we|i)|where (did|were) we|catch me up|pick up where)\b",
        )
        .unwrap()
    })
}

/// True when the prompt asks about recent activity.
#[must_use]
pub fn has_recency_intent(prompt: &str) -> bool {
    recency_re().is_match(prompt)
}

#[allow(clippy::unwrap_used)]
fn executing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(fix|add|implement|create|write|build|run|deploy|update|refactor|remove|delete|rename|migrate|install|configure|merge|release|ship|debug|revert)\b",
        )
        .unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn reflecting_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(should (we|i) have|was it|went wrong|in hindsight|retrospective|lessons?|worth it|better|worse|trade-?offs?|pros and cons|evaluate|regret|mistake)\b",
        )
        .unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn reflecting_question_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(should|was|were|did|would|do you think|is it worth)\b").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn exploring_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(what|how|where|when|who|which|why|tell me|explain|describe|show me|any idea|is there)\b",
        )
        .unwrap()
    })
}

/// Scores the prompt against the three feature sets and applies the
/// decision rules in order: executing, reflecting, exploring, deepening.
#[must_use]
pub fn classify_mode(prompt: &str) -> PromptMode {
    let trimmed = prompt.trim();
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();

    let mut exec_score = 0usize;
    for (i, m) in executing_re().find_iter(trimmed).enumerate() {
        // An executing verb that opens the prompt is a much stronger
        // signal than one buried in a clause.
        if i == 0 && m.start() == 0 {
            exec_score += 2;
        } else {
            exec_score += 1;
        }
    }

    let refl_score = reflecting_re().find_iter(trimmed).count().min(3);
    let refl_question = reflecting_question_re().is_match(trimmed) && trimmed.contains('?');

    let mut explore_score = 0usize;
    if exploring_re().is_match(trimmed) {
        explore_score += 1;
    }
    if trimmed.contains('?') {
        explore_score += 1;
    }

    let others = refl_score + explore_score;
    if exec_score >= 2 || (exec_score >= 1 && others == 0) {
        return PromptMode::Executing;
    }
    if refl_score >= 2 || (refl_score >= 1 && refl_question) {
        return PromptMode::Reflecting;
    }
    if explore_score >= 1 {
        return PromptMode::Exploring;
    }
    if tokens.len() <= 15 {
        return PromptMode::Deepening;
    }
    PromptMode::Exploring
}

/// Acronyms too common to count as specific signal.
const COMMON_ACRONYMS: &[&str] = &[
    "API", "CLI", "URL", "URI", "HTTP", "HTTPS", "JSON", "XML", "HTML", "CSS", "SQL", "REST",
    "CRUD", "TODO", "README", "OK", "ID", "UI", "UX", "DB", "AI", "ML", "CPU", "GPU", "RAM",
    "IDE", "SDK", "YAML", "TOML", "CSV", "PDF", "PR", "CI", "CD",
];

/// Uppercase function words that look like acronyms in shouty prompts.
const UPPER_FUNCTION_WORDS: &[&str] = &[
    "A", "I", "THE", "AND", "OR", "NOT", "IF", "IT", "IS", "TO", "OF", "IN", "ON", "DO", "BE",
];

/// Hyphenated terms too common to count as specific signal.
const COMMON_HYPHENATED: &[&str] = &[
    "e-mail",
    "to-do",
    "co-op",
    "re-run",
    "built-in",
    "command-line",
    "real-time",
    "open-source",
    "long-term",
    "short-term",
    "high-level",
    "low-level",
    "so-called",
    "end-to-end",
    "well-known",
    "follow-up",
];

/// Stopwords for broad-term extraction (only length >= 5 matters here).
const BROAD_STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "before", "being", "below", "between", "could", "doing",
    "during", "every", "having", "might", "other", "ought", "shall", "should", "since",
    "something", "their", "there", "these", "thing", "things", "those", "through", "under",
    "until", "where", "which", "while", "would", "really", "please", "going", "want", "wants",
    "needs", "still", "actually", "maybe", "anything", "everything", "handle", "handles",
    "using", "makes", "making", "works", "gives", "takes",
];

#[allow(clippy::unwrap_used)]
fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""([^"]{2,})"|'([^']{2,})'"#).unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn acronym_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Z][A-Z0-9]{1,}\b").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn hyphenated_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[a-zA-Z][a-zA-Z0-9]*(?:-[a-zA-Z0-9]+)+\b").unwrap()
    })
}

fn push_unique(list: &mut Vec<String>, seen: &mut Vec<String>, term: &str) {
    let key = term.to_lowercase();
    if !seen.contains(&key) {
        seen.push(key);
        list.push(term.to_string());
    }
}

/// Extracts (specific, broad) term sets from the prompt.
///
/// Specific: quoted phrases, uppercase acronyms (minus the common list),
/// hyphenated terms (minus the common list). Broad: alphabetic words of
/// length >= 5 that are neither stopwords nor already specific.
/// Deduplication is case-insensitive; insertion order is preserved.
#[must_use]
pub fn extract_key_terms(prompt: &str) -> (Vec<String>, Vec<String>) {
    let mut specific = Vec::new();
    let mut seen = Vec::new();

    for cap in quoted_re().captures_iter(prompt) {
        if let Some(m) = cap.get(1).or_else(|| cap.get(2)) {
            let phrase = m.as_str().trim();
            if phrase.len() >= 2 {
                push_unique(&mut specific, &mut seen, phrase);
            }
        }
    }

    for m in acronym_re().find_iter(prompt) {
        let word = m.as_str();
        if word.len() >= 2
            && !COMMON_ACRONYMS.contains(&word)
            && !UPPER_FUNCTION_WORDS.contains(&word)
        {
            push_unique(&mut specific, &mut seen, word);
        }
    }

    for m in hyphenated_re().find_iter(prompt) {
        let term = m.as_str();
        if !COMMON_HYPHENATED.contains(&term.to_lowercase().as_str()) {
            push_unique(&mut specific, &mut seen, term);
        }
    }

    let mut broad = Vec::new();
    for raw in prompt.split_whitespace() {
        let word: String = raw
            .chars()
            .filter(|c| c.is_alphabetic())
            .collect::<String>();
        if word.len() < 5 {
            continue;
        }
        let lower = word.to_lowercase();
        if BROAD_STOPWORDS.contains(&lower.as_str()) || seen.contains(&lower) {
            continue;
        }
        seen.push(lower);
        broad.push(word.to_lowercase());
    }

    (specific, broad)
}

/// Two-character words that still carry meaning in titles.
const SHORT_MEANINGFUL: &[&str] = &["ai", "ml", "pm", "ui", "ux", "db", "os", "go", "ci"];

/// Stopwords for title matching; includes short function words that the
/// length filter alone would admit.
const TITLE_STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "what", "how", "why", "who", "are",
    "was", "were", "has", "have", "had", "can", "will", "its", "it's", "our", "your", "their",
    "does", "did", "not", "but", "all", "any", "out", "into", "about", "over", "than", "then",
    "when", "where", "which", "them", "they", "been", "being", "also", "just", "like", "some",
    "more", "most", "such", "very", "too", "you", "get", "got", "use", "used", "using", "does",
    "please", "tell", "show", "need", "want", "make", "let", "lets", "help",
];

/// Extracts the word tokens used for title/path overlap scoring.
#[must_use]
pub fn query_words_for_title_match(prompt: &str) -> Vec<String> {
    let mut out = Vec::new();
    for raw in prompt.split(|c: char| !c.is_alphanumeric() && c != '-') {
        let word = raw.trim_matches('-').to_lowercase();
        if word.is_empty() {
            continue;
        }
        let keep = word.len() >= 3 || SHORT_MEANINGFUL.contains(&word.as_str());
        if !keep || TITLE_STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        if !out.contains(&word) {
            out.push(word);
        }
    }
    out
}

/// Extracts up to five terms for the UI echo: quoted phrases first, then
/// non-stopword tokens of length >= 4.
#[must_use]
pub fn extract_display_terms(prompt: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen = Vec::new();

    for cap in quoted_re().captures_iter(prompt) {
        if out.len() >= 5 {
            break;
        }
        if let Some(m) = cap.get(1).or_else(|| cap.get(2)) {
            push_unique(&mut out, &mut seen, m.as_str().trim());
        }
    }

    for raw in prompt.split_whitespace() {
        if out.len() >= 5 {
            break;
        }
        let word: String = raw.chars().filter(|c| c.is_alphanumeric()).collect();
        if word.len() >= 4 && !TITLE_STOPWORDS.contains(&word.to_lowercase().as_str()) {
            push_unique(&mut out, &mut seen, &word);
        }
    }

    out
}
