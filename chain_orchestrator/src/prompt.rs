//! Prompt clarity scoring, refinement and keyword extraction.
//!
//! The evaluator is a small set of heuristics that decides whether a request
//! is actionable as written. Scoring starts at a base confidence and applies:
//!
//! - penalties for very short prompts, single-word prompts and vague wording
//!   ("fix it", "the thing"), the vagueness penalty at most once;
//! - bonuses for a file or path reference, a function reference and a
//!   recognised action verb.
//!
//! Prompts below the clarity threshold get a suffix appended that asks for
//! the missing specificity. [`extract_keywords`] maps the prompt onto the
//! capability keywords used for ranking.

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const ISSUE_EMPTY: &str = "Prompt is empty";
const ISSUE_TOO_SHORT: &str = "Prompt is too short and lacks context";
const ISSUE_FEW_WORDS: &str = "Prompt lacks sufficient detail";
const ISSUE_VAGUE: &str = "Prompt uses vague terms (e.g. 'it', 'this', 'thing')";

const VAGUE_SUFFIX: &str = " for correctness and best practices";
const SHORT_SUFFIX: &str = " including error handling and edge cases";

const PENALTY: f64 = 0.2;
const BONUS: f64 = 0.1;

static VAGUENESS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(thing|stuff|something)\b",
        r"\b(check|look|review|fix)\s+(it|this|that)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("vagueness pattern is valid"))
    .collect()
});

// A token carrying a path separator, or ending in a short file extension.
// The token may sit in quotes, backticks or parentheses, or end a sentence.
// Single-letter stems are excluded so "e.g." and "i.e." are not paths.
static PATH_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:^|[\s`'"(])(?:\S*/\S*|[\w\-.]*\w\w\.[A-Za-z][A-Za-z0-9]{0,5})(?:[\s,;:!?)`'"]|\.(?:\s|$)|$)"#,
    )
    .expect("path pattern is valid")
});

static FUNCTION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\)|\b[A-Za-z_][A-Za-z0-9_:]*\(|\b(?:func|function|fn)\b")
        .expect("function pattern is valid")
});

const ACTION_VERBS: [&str; 17] = [
    "review", "analyze", "check", "test", "generate", "design", "create", "refactor", "improve",
    "optimize", "fix", "debug", "explain", "implement", "architect", "validate", "verify",
];

/// Declaration-ordered domain rules: a term alternation and the keywords it
/// contributes. Order here is the order keywords come out of
/// [`extract_keywords`].
const DOMAIN_RULES: [(&str, [&str; 2]); 4] = [
    (
        "code|review|quality|bug|issue|fix|check|error|performance|refactor|correct",
        ["code-review", "quality"],
    ),
    (
        "test|coverage|unit-test|mock|integration-test|edge-case",
        ["test-generator", "testing"],
    ),
    (
        "architecture|design|pattern|structure|organize|scale|module|boundary",
        ["architecture-advisor", "design"],
    ),
    (
        "doc|readme|guide|comment|explain|write|api|tutorial",
        ["documentation-writer", "docs"],
    ),
];

static DOMAIN_PATTERNS: Lazy<Vec<(Regex, [&'static str; 2])>> = Lazy::new(|| {
    DOMAIN_RULES
        .iter()
        .map(|(terms, keywords)| (Regex::new(terms).expect("domain pattern is valid"), *keywords))
        .collect()
});

/// Outcome of [`PromptEvaluator::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub is_clear: bool,
    pub confidence: f64,
    pub feedback: String,
    pub detected_issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_refinement: Option<String>,
    pub refined_prompt: String,
    pub suggested_keywords: Vec<String>,
}

/// Heuristic prompt clarity evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptEvaluator {
    pub base_confidence: f64,
    pub clarity_threshold: f64,
    pub minimum_length: usize,
    pub minimum_words: usize,
}

impl Default for PromptEvaluator {
    fn default() -> Self {
        Self {
            base_confidence: 0.7,
            clarity_threshold: 0.7,
            minimum_length: 10,
            minimum_words: 2,
        }
    }
}

impl PromptEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score `prompt` and, when it falls below the threshold, refine it.
    pub fn evaluate(&self, prompt: &str) -> EvaluationResult {
        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            return EvaluationResult {
                is_clear: false,
                confidence: 0.0,
                feedback: "Prompt is empty. Please provide a task description.".to_string(),
                detected_issues: vec![ISSUE_EMPTY.to_string()],
                suggested_refinement: None,
                refined_prompt: prompt.to_string(),
                suggested_keywords: Vec::new(),
            };
        }

        let lower = trimmed.to_lowercase();
        let mut confidence = self.base_confidence;
        let mut issues: Vec<String> = Vec::new();

        if trimmed.chars().count() < self.minimum_length {
            issues.push(ISSUE_TOO_SHORT.to_string());
            confidence -= PENALTY;
        }
        if trimmed.split_whitespace().count() < self.minimum_words {
            issues.push(ISSUE_FEW_WORDS.to_string());
            confidence -= PENALTY;
        }
        let vague = VAGUENESS_PATTERNS.iter().any(|re| re.is_match(&lower));
        if vague {
            issues.push(ISSUE_VAGUE.to_string());
            confidence -= PENALTY;
        }

        if has_path_reference(trimmed) {
            confidence += BONUS;
        }
        if has_function_reference(trimmed) {
            confidence += BONUS;
        }
        // A verb aimed at a vague object ("fix the thing") is not actionable.
        if !vague && contains_action_verb(&lower) {
            confidence += BONUS;
        }

        let confidence = clamp_confidence(confidence);
        let is_clear = confidence >= self.clarity_threshold;

        let (feedback, suggested_refinement, refined_prompt) = if is_clear {
            (
                "Prompt is clear and actionable.".to_string(),
                None,
                trimmed.to_string(),
            )
        } else {
            let refinement = suggest_refinement(trimmed, &issues);
            (
                "Prompt could be improved for clarity and specificity.".to_string(),
                Some(refinement.clone()),
                refinement,
            )
        };

        EvaluationResult {
            is_clear,
            confidence,
            feedback,
            detected_issues: issues,
            suggested_refinement,
            refined_prompt,
            suggested_keywords: extract_keywords(trimmed),
        }
    }
}

// Rounds away accumulated float error (0.7 - 0.2 + 0.1) before clamping.
fn clamp_confidence(raw: f64) -> f64 {
    let rounded = (raw * 100.0).round() / 100.0;
    rounded.clamp(0.0, 1.0)
}

fn suggest_refinement(prompt: &str, issues: &[String]) -> String {
    let mut refined = prompt.to_string();
    match issues.first().map(String::as_str) {
        Some(ISSUE_VAGUE) => {
            if !refined.contains(" for ") && !refined.contains(" including ") {
                refined.push_str(VAGUE_SUFFIX);
            }
        }
        Some(ISSUE_TOO_SHORT) => {
            if !refined.contains(" including ") {
                refined.push_str(SHORT_SUFFIX);
            }
        }
        _ => {}
    }
    refined
}

fn has_path_reference(prompt: &str) -> bool {
    PATH_TOKEN.is_match(prompt)
}

fn has_function_reference(prompt: &str) -> bool {
    FUNCTION_TOKEN.is_match(prompt)
}

fn contains_action_verb(lower: &str) -> bool {
    ACTION_VERBS.iter().any(|verb| lower.contains(verb))
}

/// Map a prompt onto capability keywords.
///
/// Rules are tested in declaration order and every matching rule contributes
/// its two keywords; duplicates are dropped keeping first-seen order.
pub fn extract_keywords(prompt: &str) -> Vec<String> {
    let lower = prompt.to_lowercase();
    let mut keywords: IndexSet<&'static str> = IndexSet::new();
    for (pattern, tags) in DOMAIN_PATTERNS.iter() {
        if pattern.is_match(&lower) {
            keywords.extend(tags.iter().copied());
        }
    }
    keywords.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(prompt: &str) -> EvaluationResult {
        PromptEvaluator::new().evaluate(prompt)
    }

    #[test]
    fn empty_prompt_terminates_early() {
        for input in ["", "   \n\t "] {
            let result = eval(input);
            assert!(!result.is_clear);
            assert_eq!(result.confidence, 0.0);
            assert_eq!(result.detected_issues, [ISSUE_EMPTY]);
            assert!(result.suggested_keywords.is_empty());
            assert_eq!(result.refined_prompt, input);
        }
    }

    #[test]
    fn specific_prompt_is_clear() {
        let result = eval("Review auth.go for security vulnerabilities");
        assert!(result.is_clear);
        assert_eq!(result.confidence, 0.9);
        assert!(result.detected_issues.is_empty());
        assert_eq!(result.refined_prompt, "Review auth.go for security vulnerabilities");
        assert!(result.suggested_refinement.is_none());
    }

    #[test]
    fn clear_prompt_is_trimmed() {
        let result = eval("  Refactor the payment module to reduce duplication  ");
        assert!(result.is_clear);
        assert_eq!(result.refined_prompt, "Refactor the payment module to reduce duplication");
    }

    #[test]
    fn vague_prompt_is_refined() {
        let result = eval("Fix the thing");
        assert!(!result.is_clear);
        assert!(result.confidence <= 0.5);
        assert_eq!(result.detected_issues, [ISSUE_VAGUE]);
        assert_eq!(result.refined_prompt, "Fix the thing for correctness and best practices");
        assert_eq!(result.suggested_refinement.as_deref(), Some(result.refined_prompt.as_str()));
    }

    #[test]
    fn short_vague_prompt_scores_low() {
        let result = eval("check it");
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.detected_issues, [ISSUE_TOO_SHORT, ISSUE_VAGUE]);
        assert_eq!(result.refined_prompt, "check it including error handling and edge cases");
    }

    #[test]
    fn vagueness_penalised_once() {
        let result = eval("please fix it and look at that stuff over there");
        let vague = result.detected_issues.iter().filter(|i| *i == ISSUE_VAGUE).count();
        assert_eq!(vague, 1);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn existing_qualifier_suppresses_suffix() {
        let result = eval("review this for me");
        assert!(!result.is_clear);
        assert_eq!(result.refined_prompt, "review this for me");
    }

    #[test]
    fn single_word_prompt_keeps_text() {
        let result = eval("Authentication");
        assert_eq!(result.detected_issues, [ISSUE_FEW_WORDS]);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.refined_prompt, "Authentication");
    }

    #[test]
    fn specificity_bonuses_are_independent() {
        assert_eq!(eval("Review src/handlers.rs carefully").confidence, 0.9);
        assert_eq!(eval("the parser in lib/parse seems slow").confidence, 0.8);
        assert_eq!(eval("the fn parse_header has odd behaviour").confidence, 0.8);
        assert_eq!(eval("Nothing specific about this request").confidence, 0.7);
        assert_eq!(eval("Refactor parser.rs.").confidence, 0.9);
        assert_eq!(eval("Refactor `parser.rs` carefully").confidence, 0.9);
        assert_eq!(eval("Refactor 'parser.rs' carefully").confidence, 0.9);
        assert_eq!(eval("Refactor (parser.rs) carefully").confidence, 0.9);
    }

    #[test]
    fn sentence_punctuation_is_not_a_path() {
        assert!(!has_path_reference("It works. Mostly."));
        assert!(has_path_reference("see config.toml, then rerun"));
        assert!(has_path_reference("open /etc/hosts"));
        assert!(!has_path_reference("Prefer short names, e.g. one word"));
        assert!(has_path_reference("Refactor parser.rs."));
        assert!(has_path_reference("Refactor `parser.rs` carefully"));
        assert!(has_path_reference("Refactor 'parser.rs' carefully"));
        assert!(has_path_reference("Refactor \"parser.rs\" carefully"));
        assert!(has_path_reference("Refactor (parser.rs) carefully"));
    }

    #[test]
    fn confidence_is_clamped_high() {
        let result = eval("Review and test src/main.rs plus handler() in api/server.go");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn keywords_follow_rule_order() {
        let keywords = extract_keywords("Write docs and tests for the code architecture");
        assert_eq!(
            keywords,
            [
                "code-review",
                "quality",
                "test-generator",
                "testing",
                "architecture-advisor",
                "design",
                "documentation-writer",
                "docs",
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive_and_deduplicated() {
        let keywords = extract_keywords("REVIEW the CODE and fix the BUG");
        assert_eq!(keywords, ["code-review", "quality"]);
    }

    #[test]
    fn unrelated_prompt_yields_no_keywords() {
        assert!(extract_keywords("hello there friend").is_empty());
    }

    #[test]
    fn evaluation_carries_keywords() {
        let result = eval("Generate unit tests with mocks");
        assert_eq!(result.suggested_keywords, ["test-generator", "testing"]);
    }
}
