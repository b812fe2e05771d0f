use crate::findings::{Finding, FindingKind};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

lazy_static! {
    /// Points per base kind. Unknown base kinds score zero.
    static ref WEIGHT_TABLE: HashMap<&'static str, u32> = HashMap::from([
        // Structural
        ("EXCESSIVE_CAPITALIZATION", 5),
        ("CONTAINS_NON_ASCII_CHARS", 10),
        ("EXTREMELY_SHORT_BODY", 5),
        // Links
        ("CONTAINS_URLS", 2), // per URL
        ("LINK_IS_IP_ADDRESS", 40),
        ("NEW_DOMAIN_DETECTED", 25),
        // Linguistic
        ("HIGH_URGENCY_DETECTED", 15),
        ("FINANCIAL_TOPIC_DETECTED", 20),
        ("AUTHORITY_IMPERSONATION_ATTEMPT", 20),
        ("NLP_MODEL_NOT_FOUND", 0),
    ]);
}

pub fn weight(kind: &FindingKind) -> u32 {
    WEIGHT_TABLE.get(kind.base_name()).copied().unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreContribution {
    pub kind: FindingKind,
    pub points: u32,
}

/// Points a single distinct finding is worth.
///
/// A count-bearing URL finding is worth `weight * N`; its literal identifier
/// never matches the flat table entry. A malformed count is worth nothing.
fn finding_points(finding: &Finding) -> u32 {
    let base = weight(&finding.kind);
    if !finding.has_embedded_count() {
        return base;
    }
    match finding.embedded_count() {
        Some(count) => base.saturating_mul(count),
        None => {
            log::debug!("Ignoring unparseable URL count in {finding}");
            0
        }
    }
}

/// Per-base-kind contributions, ordered by kind.
///
/// Findings are deduplicated first, then each base kind contributes once.
/// Several `NEW_DOMAIN_DETECTED:*` findings therefore score a single 25.
pub fn score_breakdown(findings: &[Finding]) -> Vec<ScoreContribution> {
    let distinct: HashSet<&Finding> = findings.iter().collect();

    let mut by_kind: BTreeMap<&FindingKind, u32> = BTreeMap::new();
    for finding in distinct {
        let points = finding_points(finding);
        let entry = by_kind.entry(&finding.kind).or_insert(0);
        *entry = (*entry).max(points);
    }

    by_kind
        .into_iter()
        .map(|(kind, points)| ScoreContribution {
            kind: kind.clone(),
            points,
        })
        .collect()
}

pub fn calculate_score(findings: &[Finding]) -> u32 {
    score_breakdown(findings)
        .iter()
        .fold(0u32, |total, c| total.saturating_add(c.points))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            score if score >= 100 => RiskLevel::Critical,
            score if score >= 50 => RiskLevel::High,
            score if score >= 20 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}
