pub mod config;
pub mod domain_age;
pub mod features;
pub mod findings;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod store;

pub use config::Config;
pub use domain_age::{DomainAge, DomainAgeLookup, LookupError, StaticDomainAges, WhoisClient};
pub use features::{analyze_structure, LinguisticAnalyzer, LinkAnalyzer, Tokenizer};
pub use findings::{Finding, FindingKind};
pub use pipeline::{Analysis, ThreatAnalyzer};
pub use scoring::{calculate_score, RiskLevel};
