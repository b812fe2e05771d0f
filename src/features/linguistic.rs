use crate::findings::{Finding, FindingKind};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

// Multi-word entries only match if a tokenizer emits them as one token.
pub const URGENCY_KEYWORDS: [&str; 6] = [
    "urgent",
    "immediately",
    "now",
    "action required",
    "final notice",
    "limited time",
];
pub const FINANCIAL_KEYWORDS: [&str; 8] = [
    "invoice", "payment", "bank", "account", "transfer", "wire", "card", "billing",
];
pub const AUTHORITY_KEYWORDS: [&str; 6] = [
    "ceo",
    "manager",
    "boss",
    "admin",
    "it department",
    "support",
];

const CATEGORIES: [(&[&str], FindingKind); 3] = [
    (&URGENCY_KEYWORDS, FindingKind::HighUrgencyDetected),
    (&FINANCIAL_KEYWORDS, FindingKind::FinancialTopicDetected),
    (&AUTHORITY_KEYWORDS, FindingKind::AuthorityImpersonationAttempt),
];

/// Splits text into the set of distinct tokens it contains.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> HashSet<String>;
}

pub const DEFAULT_TOKEN_PATTERN: &str = r"\w+|[^\w\s]";

lazy_static! {
    static ref DEFAULT_TOKEN_REGEX: Regex = Regex::new(DEFAULT_TOKEN_PATTERN).unwrap();
}

/// Regex tokenizer: runs of word characters, and each punctuation mark on
/// its own.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    pattern: Regex,
}

impl WordTokenizer {
    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_TOKEN_REGEX.clone(),
        }
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> HashSet<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

pub struct LinguisticAnalyzer {
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl LinguisticAnalyzer {
    /// Without a tokenizer the analyzer runs degraded and only reports
    /// `NLP_MODEL_NOT_FOUND`.
    pub fn new(tokenizer: Option<Arc<dyn Tokenizer>>) -> Self {
        if tokenizer.is_none() {
            log::warn!("No tokenizer available, linguistic analysis is disabled");
        }
        Self { tokenizer }
    }

    pub fn is_degraded(&self) -> bool {
        self.tokenizer.is_none()
    }

    pub fn analyze_linguistics(&self, body: &str) -> Vec<Finding> {
        let Some(tokenizer) = &self.tokenizer else {
            return vec![Finding::new(FindingKind::NlpModelNotFound)];
        };

        let tokens = tokenizer.tokenize(&body.to_lowercase());

        CATEGORIES
            .iter()
            .filter(|(keywords, _)| keywords.iter().any(|k| tokens.contains(*k)))
            .map(|(_, kind)| Finding::new(kind.clone()))
            .collect()
    }
}

impl Default for LinguisticAnalyzer {
    fn default() -> Self {
        Self::new(Some(Arc::new(WordTokenizer::default())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(analyzer: &LinguisticAnalyzer, body: &str) -> Vec<FindingKind> {
        analyzer
            .analyze_linguistics(body)
            .into_iter()
            .map(|f| f.kind)
            .collect()
    }

    /// Treats every line as a single token.
    struct LineTokenizer;

    impl Tokenizer for LineTokenizer {
        fn tokenize(&self, text: &str) -> HashSet<String> {
            text.lines().map(|l| l.trim().to_string()).collect()
        }
    }

    #[test]
    fn test_word_tokenizer() {
        let tokens = WordTokenizer::default().tokenize("urgent: pay now!");
        let expected: HashSet<String> = ["urgent", ":", "pay", "now", "!"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_categories() {
        let analyzer = LinguisticAnalyzer::default();
        assert_eq!(
            kinds(&analyzer, "URGENT: verify your account now"),
            vec![
                FindingKind::HighUrgencyDetected,
                FindingKind::FinancialTopicDetected
            ]
        );
        assert_eq!(
            kinds(&analyzer, "Message from the CEO"),
            vec![FindingKind::AuthorityImpersonationAttempt]
        );
        assert!(kinds(&analyzer, "See you at lunch tomorrow").is_empty());
        assert!(kinds(&analyzer, "").is_empty());
    }

    #[test]
    fn test_one_finding_per_category() {
        let analyzer = LinguisticAnalyzer::default();
        let findings = analyzer.analyze_linguistics("invoice payment bank wire transfer billing");
        assert_eq!(findings, vec![Finding::new(FindingKind::FinancialTopicDetected)]);
    }

    #[test]
    fn test_membership_not_substring() {
        let analyzer = LinguisticAnalyzer::default();
        // "nowhere" and "accountant" contain keywords but are not keywords
        assert!(kinds(&analyzer, "nowhere near the accountant").is_empty());
    }

    #[test]
    fn test_multi_word_keywords_need_single_token() {
        let analyzer = LinguisticAnalyzer::default();
        assert!(kinds(&analyzer, "Action required by the IT department").is_empty());

        let analyzer = LinguisticAnalyzer::new(Some(Arc::new(LineTokenizer)));
        assert_eq!(
            kinds(&analyzer, "Action Required\nIT Department"),
            vec![
                FindingKind::HighUrgencyDetected,
                FindingKind::AuthorityImpersonationAttempt
            ]
        );
    }

    #[test]
    fn test_degraded_mode() {
        let analyzer = LinguisticAnalyzer::new(None);
        assert!(analyzer.is_degraded());
        assert_eq!(
            analyzer.analyze_linguistics("urgent payment to the CEO"),
            vec![Finding::new(FindingKind::NlpModelNotFound)]
        );
        assert_eq!(
            analyzer.analyze_linguistics(""),
            vec![Finding::new(FindingKind::NlpModelNotFound)]
        );
    }

    #[test]
    fn test_custom_pattern() {
        assert!(WordTokenizer::with_pattern("[unclosed").is_err());
        let tokenizer = WordTokenizer::with_pattern(r"[a-z]+").unwrap();
        assert!(tokenizer.tokenize("wire-transfer").contains("wire"));
    }
}
