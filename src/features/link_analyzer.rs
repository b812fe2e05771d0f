use crate::domain_age::{DomainAge, DomainAgeLookup};
use crate::findings::{Finding, FindingKind};
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;
use tokio::time::timeout;

/// Domains registered less than this many days ago are flagged.
pub const NEW_DOMAIN_MAX_AGE_DAYS: i64 = 30;

lazy_static! {
    // Scheme optional; bare hosts like "paypal-secure.info/login" count too
    static ref URL_REGEX: Regex =
        Regex::new(r"(?:(?:https?|ftp)://)?[\w/\-?=%.]+\.[\w/\-?=%.]+").unwrap();
    static ref DOTTED_QUAD: Regex = Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostParseError {
    #[error("no host in {0:?}")]
    Empty(String),
    #[error("invalid host {host:?} in {url:?}")]
    InvalidHost { url: String, host: String },
}

/// All URL-like substrings, in order of appearance. Repeats are kept.
pub fn find_urls(body: &str) -> Vec<&str> {
    URL_REGEX.find_iter(body).map(|m| m.as_str()).collect()
}

/// Host part of a URL: scheme, path/query and port stripped.
pub fn extract_host(url: &str) -> Result<&str, HostParseError> {
    let rest = match url.find("//") {
        Some(pos) => &url[pos + 2..],
        None => url,
    };
    let authority = rest.split('/').next().unwrap_or(rest);
    let host = match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    };

    if host.is_empty() {
        return Err(HostParseError::Empty(url.to_string()));
    }
    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(HostParseError::InvalidHost {
            url: url.to_string(),
            host: host.to_string(),
        });
    }
    Ok(host)
}

/// Four dot-separated numeric groups. Syntactic only: `999.1.1.1` matches.
pub fn is_dotted_quad(host: &str) -> bool {
    DOTTED_QUAD.is_match(host)
}

pub struct LinkAnalyzer<L> {
    lookup: L,
    lookup_timeout: Duration,
    max_age: chrono::Duration,
}

impl<L: DomainAgeLookup> LinkAnalyzer<L> {
    pub fn new(lookup: L, lookup_timeout: Duration) -> Self {
        Self {
            lookup,
            lookup_timeout,
            max_age: chrono::Duration::days(NEW_DOMAIN_MAX_AGE_DAYS),
        }
    }

    pub async fn analyze_links(&self, body: &str) -> Vec<Finding> {
        let urls = find_urls(body);
        if urls.is_empty() {
            return Vec::new();
        }

        let mut findings = vec![Finding::url_count(urls.len())];

        for url in urls {
            let host = match extract_host(url) {
                Ok(host) => host,
                Err(e) => {
                    log::debug!("Skipping host checks: {e}");
                    continue;
                }
            };

            if is_dotted_quad(host) {
                findings.push(Finding::new(FindingKind::LinkIsIpAddress));
                continue;
            }

            if self.is_new_domain(host).await {
                findings.push(Finding::new_domain(host));
            }
        }

        findings
    }

    /// Any lookup failure or timeout counts as "not new".
    async fn is_new_domain(&self, host: &str) -> bool {
        match timeout(self.lookup_timeout, self.lookup.creation_date(host)).await {
            Ok(Ok(age @ DomainAge::Created(created))) => {
                let young = age.is_newer_than(self.max_age, Utc::now());
                if young {
                    log::info!("New domain detected: {host} (created {created})");
                }
                young
            }
            Ok(Ok(DomainAge::Unknown)) => {
                log::debug!("Creation date unknown for {host}");
                false
            }
            Ok(Err(e)) => {
                log::warn!("Could not check domain age for {host}: {e}");
                false
            }
            Err(_) => {
                log::warn!(
                    "Domain age lookup for {host} timed out after {:?}",
                    self.lookup_timeout
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_age::{LookupError, StaticDomainAges};

    fn analyzer(lookup: StaticDomainAges) -> LinkAnalyzer<StaticDomainAges> {
        LinkAnalyzer::new(lookup, Duration::from_secs(5))
    }

    fn strings(findings: &[Finding]) -> Vec<String> {
        findings.iter().map(|f| f.to_string()).collect()
    }

    struct SlowLookup;

    impl DomainAgeLookup for SlowLookup {
        async fn creation_date(&self, _host: &str) -> Result<DomainAge, LookupError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(DomainAge::Created(Utc::now()))
        }
    }

    #[test]
    fn test_find_urls() {
        let body = "Go to http://192.168.1.1/login or paypal-verify.info and https://a.b.example/x?y=1";
        assert_eq!(
            find_urls(body),
            vec![
                "http://192.168.1.1/login",
                "paypal-verify.info",
                "https://a.b.example/x?y=1"
            ]
        );
        assert!(find_urls("no links in here at all").is_empty());
    }

    #[test]
    fn test_find_urls_keeps_repeats() {
        assert_eq!(find_urls("evil.com then evil.com again").len(), 2);
    }

    #[test]
    fn test_extract_host() {
        assert_eq!(extract_host("http://192.168.1.1/login"), Ok("192.168.1.1"));
        assert_eq!(extract_host("example.com:8080/path"), Ok("example.com"));
        assert_eq!(extract_host("ftp://files.example.org"), Ok("files.example.org"));
        assert_eq!(extract_host("sub.example.co.uk/a/b.html"), Ok("sub.example.co.uk"));
    }

    #[test]
    fn test_extract_host_failures() {
        assert!(matches!(
            extract_host("/only/a.path"),
            Err(HostParseError::Empty(_))
        ));
        assert!(matches!(
            extract_host("?q=search.term"),
            Err(HostParseError::InvalidHost { .. })
        ));
    }

    #[test]
    fn test_dotted_quad_is_syntactic() {
        assert!(is_dotted_quad("192.168.1.1"));
        assert!(is_dotted_quad("999.999.999.999"));
        assert!(!is_dotted_quad("192.168.1"));
        assert!(!is_dotted_quad("1.2.3.4.example.com"));
    }

    #[tokio::test]
    async fn test_no_urls_no_findings() {
        let findings = analyzer(StaticDomainAges::new())
            .analyze_links("Hi team, lunch is at noon")
            .await;
        assert!(findings.is_empty());

        let findings = analyzer(StaticDomainAges::new()).analyze_links("").await;
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn test_ip_address_link() {
        // Even a "new" entry for the IP must not produce a new-domain finding
        let lookup = StaticDomainAges::new().with_age("192.168.1.1", 1);
        let findings = analyzer(lookup)
            .analyze_links("Log in at http://192.168.1.1/login")
            .await;
        assert_eq!(strings(&findings), vec!["CONTAINS_1_URLS", "LINK_IS_IP_ADDRESS"]);
    }

    #[tokio::test]
    async fn test_new_domains_are_reported_per_host() {
        let lookup = StaticDomainAges::new()
            .with_age("fresh-login.info", 3)
            .with_age("also-new.net", 10)
            .with_age("google.com", 9000);
        let findings = analyzer(lookup)
            .analyze_links("see fresh-login.info/verify, google.com and https://also-new.net")
            .await;
        assert_eq!(
            strings(&findings),
            vec![
                "CONTAINS_3_URLS",
                "NEW_DOMAIN_DETECTED:fresh-login.info",
                "NEW_DOMAIN_DETECTED:also-new.net",
            ]
        );
    }

    #[tokio::test]
    async fn test_domain_at_window_edge_is_not_new() {
        let lookup = StaticDomainAges::new().with_age("monthold.com", 31);
        let findings = analyzer(lookup).analyze_links("visit monthold.com").await;
        assert_eq!(strings(&findings), vec!["CONTAINS_1_URLS"]);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_new() {
        let lookup = StaticDomainAges::new()
            .with_age("fresh-login.info", 3)
            .with_failure("fresh-login.info");
        let findings = analyzer(lookup)
            .analyze_links("urgent: fresh-login.info/reset")
            .await;
        assert_eq!(strings(&findings), vec!["CONTAINS_1_URLS"]);
    }

    #[tokio::test]
    async fn test_lookup_timeout_is_not_new() {
        let analyzer = LinkAnalyzer::new(SlowLookup, Duration::from_millis(50));
        let findings = analyzer.analyze_links("brand-new.example/login").await;
        assert_eq!(strings(&findings), vec!["CONTAINS_1_URLS"]);
    }

    #[tokio::test]
    async fn test_malformed_url_is_skipped() {
        let lookup = StaticDomainAges::new().with_age("fresh.info", 2);
        let findings = analyzer(lookup)
            .analyze_links("search ?q=weird.term then fresh.info")
            .await;
        assert_eq!(
            strings(&findings),
            vec!["CONTAINS_2_URLS", "NEW_DOMAIN_DETECTED:fresh.info"]
        );
    }
}
