#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;
use std::time::Duration;
use threat_analyzer::domain_age::root_domain;
use threat_analyzer::features::WordTokenizer;
use threat_analyzer::{DomainAge, DomainAgeLookup, ThreatAnalyzer, WhoisClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Testing REAL WHOIS lookups (not mock data)...");

    let client = WhoisClient::new(10);

    let test_hosts = vec!["google.com", "mail.example.com", "github.com", "www.bbc.co.uk"];

    for host in test_hosts {
        println!("\n=== {} (root: {}) ===", host, root_domain(host));

        match client.creation_date(host).await {
            Ok(DomainAge::Created(created)) => {
                println!("✅ Created: {}", created);
            }
            Ok(DomainAge::Unknown) => {
                println!("❔ Registry answered, creation date unknown");
            }
            Err(e) => {
                println!("❌ Lookup failed: {}", e);
                println!("  This could be due to:");
                println!("    - WHOIS rate limits");
                println!("    - Network connectivity issues");
                println!("    - Domain doesn't exist");
            }
        }
    }

    println!("\n=== Full analysis with live lookups ===");
    let analyzer = ThreatAnalyzer::new(
        client,
        Duration::from_secs(15),
        Some(Arc::new(WordTokenizer::default())),
    );
    let analysis = analyzer
        .run_full_analysis("Your invoice is attached, pay now at https://github.com/billing")
        .await;
    println!("Score: {} ({})", analysis.score, analysis.risk_level());
    for finding in &analysis.findings {
        println!("  {}", finding);
    }

    Ok(())
}
