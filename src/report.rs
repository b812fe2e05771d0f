use crate::store::StoredAnalysis;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

/// Aggregate numbers over a set of stored analyses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_messages: usize,
    pub average_score: f64,
    pub high_risk_threshold: u32,
    /// Share of messages scoring above the threshold, in percent.
    pub high_risk_percentage: f64,
    /// Most frequent finding base kinds, payloads stripped.
    pub top_findings: Vec<(String, usize)>,
    pub messages_per_day: BTreeMap<NaiveDate, usize>,
}

impl DashboardSummary {
    pub fn from_records(
        records: &[StoredAnalysis],
        high_risk_threshold: u32,
        top_n: usize,
    ) -> Self {
        let total_messages = records.len();

        let (average_score, high_risk_percentage) = if records.is_empty() {
            (0.0, 0.0)
        } else {
            let total: u64 = records.iter().map(|r| u64::from(r.threat_score)).sum();
            let high = records
                .iter()
                .filter(|r| r.threat_score > high_risk_threshold)
                .count();
            (
                total as f64 / total_messages as f64,
                high as f64 * 100.0 / total_messages as f64,
            )
        };

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for finding in records.iter().flat_map(|r| r.findings.iter()) {
            *counts.entry(finding.kind.base_name()).or_insert(0) += 1;
        }
        let mut top_findings: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(kind, count)| (kind.to_string(), count))
            .collect();
        top_findings.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_findings.truncate(top_n);

        let mut messages_per_day = BTreeMap::new();
        for record in records {
            *messages_per_day
                .entry(record.timestamp.date_naive())
                .or_insert(0) += 1;
        }

        Self {
            total_messages,
            average_score,
            high_risk_threshold,
            high_risk_percentage,
            top_findings,
            messages_per_day,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "📊 Threat Intelligence Summary");
        let _ = writeln!(out, "═══════════════════════════════════════");
        if self.total_messages == 0 {
            let _ = writeln!(out, "No stored analyses match the current filters.");
            return out;
        }

        let _ = writeln!(out, "  Total messages:        {}", self.total_messages);
        let _ = writeln!(out, "  Average threat score:  {:.2}", self.average_score);
        let _ = writeln!(
            out,
            "  High-risk (> {}):      {:.2}%",
            self.high_risk_threshold, self.high_risk_percentage
        );

        let _ = writeln!(out);
        let _ = writeln!(out, "🎯 Top detected threat types:");
        for (kind, count) in &self.top_findings {
            let _ = writeln!(out, "  {kind:<36} {count:>6}");
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "📈 Messages per day:");
        for (day, count) in &self.messages_per_day {
            let _ = writeln!(out, "  {day}  {count:>6}");
        }
        out
    }
}
