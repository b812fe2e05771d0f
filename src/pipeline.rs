use crate::config::Config;
use crate::domain_age::{DomainAgeLookup, DomainAgeSource};
use crate::features::{analyze_structure, LinguisticAnalyzer, LinkAnalyzer, Tokenizer};
use crate::findings::Finding;
use crate::scoring::{calculate_score, RiskLevel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of one analysis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub score: u32,
    /// Structural, then link, then linguistic findings.
    pub findings: Vec<Finding>,
}

impl Analysis {
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.score)
    }
}

/// Runs a message body through every extractor and scores the result.
pub struct ThreatAnalyzer<L> {
    links: LinkAnalyzer<L>,
    linguistics: LinguisticAnalyzer,
}

impl ThreatAnalyzer<DomainAgeSource> {
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            DomainAgeSource::from_config(&config.domain_age),
            config.domain_age.lookup_budget(),
            config.load_tokenizer(),
        )
    }
}

impl<L: DomainAgeLookup> ThreatAnalyzer<L> {
    pub fn new(
        lookup: L,
        lookup_timeout: Duration,
        tokenizer: Option<Arc<dyn Tokenizer>>,
    ) -> Self {
        Self {
            links: LinkAnalyzer::new(lookup, lookup_timeout),
            linguistics: LinguisticAnalyzer::new(tokenizer),
        }
    }

    /// Never fails: every extractor degrades internally.
    pub async fn run_full_analysis(&self, message_body: &str) -> Analysis {
        let started = Instant::now();

        let (structural, links, linguistic) = tokio::join!(
            async { analyze_structure(message_body) },
            self.links.analyze_links(message_body),
            async { self.linguistics.analyze_linguistics(message_body) },
        );

        let mut findings = structural;
        findings.extend(links);
        findings.extend(linguistic);

        let score = calculate_score(&findings);
        log::info!(
            "Analyzed {} chars: score {score}, {} findings in {}ms",
            message_body.len(),
            findings.len(),
            started.elapsed().as_millis()
        );

        Analysis { score, findings }
    }
}
