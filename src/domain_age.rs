use crate::config::DomainAgeConfig;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Outcome of a successful registration lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainAge {
    Created(DateTime<Utc>),
    /// The registry answered but no creation date is known.
    Unknown,
}

impl DomainAge {
    /// True when the creation date falls within `window` before `now`.
    pub fn is_newer_than(&self, window: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self {
            DomainAge::Created(created) => now.signed_duration_since(*created) < window,
            DomainAge::Unknown => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),
    #[error("could not parse WHOIS response: {0}")]
    Parse(String),
    #[error("no registration record for {0}")]
    NoRecord(String),
}

/// Maps a host name to its registration date.
pub trait DomainAgeLookup: Send + Sync {
    fn creation_date(
        &self,
        host: &str,
    ) -> impl Future<Output = Result<DomainAge, LookupError>> + Send;
}

/// Registrable root of a host for WHOIS queries.
/// e.g. "email.nationalgeographic.com" -> "nationalgeographic.com"
pub fn root_domain(host: &str) -> String {
    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() < 2 {
        return host.to_string();
    }

    let suffix = format!("{}.{}", parts[parts.len() - 2], parts[parts.len() - 1]);
    if parts.len() >= 3 {
        let two_part_tlds = [
            "co.uk", "com.au", "co.jp", "co.kr", "com.br", "co.za", "com.mx", "co.in", "com.sg",
            "co.nz", "com.ar", "co.il", "org.uk", "net.au", "gov.uk", "ac.uk", "edu.au",
        ];
        if two_part_tlds.contains(&suffix.as_str()) {
            return format!("{}.{}", parts[parts.len() - 3], suffix);
        }
    }
    suffix
}

fn whois_server(domain: &str) -> &'static str {
    let tld = domain.rsplit('.').next().unwrap_or(domain);
    match tld {
        "com" | "net" => "whois.verisign-grs.com",
        "org" => "whois.pir.org",
        "info" => "whois.afilias.net",
        "biz" => "whois.neulevel.biz",
        "us" => "whois.nic.us",
        "uk" => "whois.nic.uk",
        "de" => "whois.denic.de",
        "fr" => "whois.afnic.fr",
        "it" => "whois.nic.it",
        "nl" => "whois.domain-registry.nl",
        "au" => "whois.auda.org.au",
        "ca" => "whois.cira.ca",
        "jp" => "whois.jprs.jp",
        "cn" => "whois.cnnic.cn",
        "ru" => "whois.tcinet.ru",
        "br" => "whois.registro.br",
        "mx" => "whois.mx",
        "tk" => "whois.dot.tk",
        "ml" => "whois.dot.ml",
        "ga" => "whois.dot.ga",
        "cf" => "whois.dot.cf",
        _ => "whois.iana.org",
    }
}

const FALLBACK_SERVERS: [&str; 2] = ["whois.iana.org", "whois.internic.net"];

lazy_static! {
    // Most specific first; the first line with a parseable date wins
    static ref CREATION_PATTERNS: Vec<Regex> = [
        r"(?i)creation\s*date[:\s]+([^\r\n]+)",
        r"(?i)domain\s*created[:\s]+([^\r\n]+)",
        r"(?i)created\s*on[:\s]+([^\r\n]+)",
        r"(?i)created[:\s]+([^\r\n]+)",
        r"(?i)registration\s*date[:\s]+([^\r\n]+)",
        r"(?i)registration_time[:\s]+([^\r\n]+)",
        r"(?i)registered\s*on[:\s]+([^\r\n]+)",
        r"(?i)registered[:\s]+([^\r\n]+)",
        r"(?i)domain_date_created[:\s]+([^\r\n]+)",
        r"(?i)created?_date[:\s]+([^\r\n]+)",
        r"(?i)fecha\s*de\s*creaci[oó]n[:\s]+([^\r\n]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();
    static ref REFER_LINE: Regex = Regex::new(r"(?im)^\s*refer:\s*(\S+)").unwrap();
    static ref DOMAIN_LINE: Regex = Regex::new(r"(?im)^\s*domain:\s*(\S+)").unwrap();
}

const NOT_FOUND_MARKERS: [&str; 4] = [
    "no match for",
    "not found",
    "no entries found",
    "no data found",
];

/// Parse a date as it appears in WHOIS replies.
pub fn parse_whois_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    let token = raw.split_whitespace().next()?;
    for format in ["%Y-%m-%d", "%d-%b-%Y", "%d.%m.%Y", "%Y.%m.%d", "%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(token, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Registry server named by a `refer:` line, as in IANA replies.
pub fn referral_server(text: &str) -> Option<&str> {
    REFER_LINE
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|server| server.as_str().trim_end_matches('.'))
        .filter(|server| !server.is_empty())
}

/// Extract the creation date from a plain-text WHOIS reply.
///
/// A reply describing the TLD itself (IANA's answer for unlisted TLDs) is
/// rejected, since its creation date is the registry's.
pub fn parse_whois_response(text: &str, domain: &str) -> Result<DomainAge, LookupError> {
    let tld = domain.rsplit('.').next().unwrap_or(domain);
    if let Some(record) = DOMAIN_LINE.captures(text).and_then(|c| c.get(1)) {
        let record = record.as_str().trim_end_matches('.');
        if record.eq_ignore_ascii_case(tld) && !tld.eq_ignore_ascii_case(domain) {
            return Err(LookupError::Parse(format!(
                "reply for {domain} describes the .{tld} registry"
            )));
        }
    }

    for regex in CREATION_PATTERNS.iter() {
        for captures in regex.captures_iter(text) {
            let Some(value) = captures.get(1) else {
                continue;
            };
            if let Some(created) = parse_whois_date(value.as_str()) {
                log::debug!("Creation date for {domain}: {created}");
                return Ok(DomainAge::Created(created));
            }
            log::debug!("Unrecognised date format: '{}'", value.as_str().trim());
        }
    }

    let lowered = text.to_lowercase();
    if NOT_FOUND_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return Err(LookupError::NoRecord(domain.to_string()));
    }

    Err(LookupError::Parse(format!(
        "no creation date in {} byte reply for {domain}",
        text.len()
    )))
}

/// Live WHOIS client speaking the port 43 text protocol.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    timeout: Duration,
}

impl WhoisClient {
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    async fn query_server(&self, server: &str, domain: &str) -> Result<String, LookupError> {
        log::debug!("Connecting to WHOIS server: {server}:43");

        let mut stream = timeout(self.timeout, TcpStream::connect(format!("{server}:43")))
            .await
            .map_err(|_| LookupError::Timeout(self.timeout))??;

        stream.write_all(format!("{domain}\r\n").as_bytes()).await?;

        // Some registries answer in Latin-1
        let mut response = Vec::new();
        timeout(self.timeout, stream.read_to_end(&mut response))
            .await
            .map_err(|_| LookupError::Timeout(self.timeout))??;

        if response.is_empty() {
            return Err(LookupError::Parse("empty WHOIS response".to_string()));
        }
        Ok(String::from_utf8_lossy(&response).into_owned())
    }

    /// Query `server`, following one `refer:` hop to the registry.
    async fn query_with_referral(
        &self,
        server: &str,
        domain: &str,
    ) -> Result<String, LookupError> {
        let text = self.query_server(server, domain).await?;
        match referral_server(&text) {
            Some(referral) if !referral.eq_ignore_ascii_case(server) => {
                log::debug!("{server} refers {domain} to {referral}");
                self.query_server(referral, domain).await
            }
            _ => Ok(text),
        }
    }

    async fn lookup(&self, domain: &str) -> Result<DomainAge, LookupError> {
        let primary = whois_server(domain);
        match self.query_with_referral(primary, domain).await {
            Ok(text) => return parse_whois_response(&text, domain),
            Err(e) => log::debug!("WHOIS query to {primary} failed: {e}"),
        }

        for server in FALLBACK_SERVERS {
            match self.query_with_referral(server, domain).await {
                Ok(text) => {
                    if let Ok(age) = parse_whois_response(&text, domain) {
                        return Ok(age);
                    }
                }
                Err(e) => log::debug!("Fallback server {server} failed: {e}"),
            }
        }

        self.dns_fallback(domain).await
    }

    /// A domain that resolves exists, but its age stays unknown.
    async fn dns_fallback(&self, domain: &str) -> Result<DomainAge, LookupError> {
        use hickory_resolver::TokioAsyncResolver;

        log::debug!("All WHOIS servers failed, using DNS fallback for {domain}");
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| LookupError::Network(std::io::Error::other(e.to_string())))?;

        match resolver.lookup_ip(domain).await {
            Ok(_) => Ok(DomainAge::Unknown),
            Err(e) => {
                log::debug!("DNS lookup for {domain} failed: {e}");
                Err(LookupError::NoRecord(domain.to_string()))
            }
        }
    }
}

impl DomainAgeLookup for WhoisClient {
    async fn creation_date(&self, host: &str) -> Result<DomainAge, LookupError> {
        let root = root_domain(&host.to_lowercase());
        log::debug!("Checking domain age for {host} (root: {root})");

        if root.is_empty()
            || !root.contains('.')
            || !root
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
        {
            return Err(LookupError::InvalidDomain(host.to_string()));
        }

        self.lookup(&root).await
    }
}

/// Fixed table of domain ages, used for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDomainAges {
    ages_days: HashMap<String, i64>,
    failing: HashSet<String>,
}

impl StaticDomainAges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_days(ages_days: HashMap<String, i64>) -> Self {
        Self {
            ages_days,
            failing: HashSet::new(),
        }
    }

    pub fn with_age(mut self, domain: &str, days: i64) -> Self {
        self.ages_days.insert(domain.to_lowercase(), days);
        self
    }

    /// Make lookups for `domain` fail as if the network were down.
    pub fn with_failure(mut self, domain: &str) -> Self {
        self.failing.insert(domain.to_lowercase());
        self
    }
}

impl DomainAgeLookup for StaticDomainAges {
    async fn creation_date(&self, host: &str) -> Result<DomainAge, LookupError> {
        let host = host.to_lowercase();
        let root = root_domain(&host);

        if self.failing.contains(&host) || self.failing.contains(&root) {
            return Err(LookupError::Network(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("simulated failure for {host}"),
            )));
        }

        let days = self
            .ages_days
            .get(&host)
            .or_else(|| self.ages_days.get(&root));
        Ok(match days {
            Some(days) => DomainAge::Created(Utc::now() - chrono::Duration::days(*days)),
            None => DomainAge::Unknown,
        })
    }
}

/// Lookup backend chosen by configuration.
#[derive(Debug, Clone)]
pub enum DomainAgeSource {
    Whois(WhoisClient),
    Static(StaticDomainAges),
}

impl DomainAgeSource {
    pub fn from_config(config: &DomainAgeConfig) -> Self {
        if config.use_mock_data {
            log::info!(
                "Using mock domain ages for {} domains",
                config.mock_domains.len()
            );
            let ages = config
                .mock_domains
                .iter()
                .map(|(domain, days)| (domain.to_lowercase(), *days))
                .collect();
            DomainAgeSource::Static(StaticDomainAges::from_days(ages))
        } else {
            DomainAgeSource::Whois(WhoisClient::new(config.timeout_seconds))
        }
    }
}

impl DomainAgeLookup for DomainAgeSource {
    async fn creation_date(&self, host: &str) -> Result<DomainAge, LookupError> {
        match self {
            DomainAgeSource::Whois(client) => client.creation_date(host).await,
            DomainAgeSource::Static(table) => table.creation_date(host).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_domain() {
        assert_eq!(root_domain("example.com"), "example.com");
        assert_eq!(
            root_domain("email.nationalgeographic.com"),
            "nationalgeographic.com"
        );
        assert_eq!(root_domain("sub.domain.example.org"), "example.org");
        assert_eq!(root_domain("mail.example.co.uk"), "example.co.uk");
        assert_eq!(root_domain("test.company.com.au"), "company.com.au");
        assert_eq!(root_domain("single"), "single");
    }

    #[test]
    fn test_parse_whois_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 10, 10, 0, 0, 0).unwrap();
        assert_eq!(parse_whois_date("2024-10-10"), Some(expected));
        assert_eq!(parse_whois_date("2024-10-10T00:00:00Z"), Some(expected));
        assert_eq!(parse_whois_date("2024-10-10 00:00:00"), Some(expected));
        assert_eq!(parse_whois_date("10.10.2024"), Some(expected));
        assert_eq!(parse_whois_date("10-Oct-2024"), Some(expected));
        assert_eq!(parse_whois_date("sometime last year"), None);
    }

    #[test]
    fn test_parse_whois_response() {
        let reply = "Domain Name: EXAMPLE.COM\r\n\
                     Registry Domain ID: 2336799_DOMAIN_COM-VRSN\r\n\
                     Creation Date: 1995-08-14T04:00:00Z\r\n";
        let age = parse_whois_response(reply, "example.com").unwrap();
        assert_eq!(
            age,
            DomainAge::Created(Utc.with_ymd_and_hms(1995, 8, 14, 4, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_whois_response_errors() {
        assert!(matches!(
            parse_whois_response("No match for \"NOPE.COM\".", "nope.com"),
            Err(LookupError::NoRecord(_))
        ));
        assert!(matches!(
            parse_whois_response("Registrar: Someone\n", "example.com"),
            Err(LookupError::Parse(_))
        ));
    }

    #[test]
    fn test_tld_record_is_not_a_creation_date() {
        let reply = "% IANA WHOIS server\n\
                     refer:        whois.nic.xyz\n\
                     \n\
                     domain:       XYZ\n\
                     organisation: XYZ.COM LLC\n\
                     created:      2014-02-06\n";
        assert_eq!(referral_server(reply), Some("whois.nic.xyz"));
        assert!(matches!(
            parse_whois_response(reply, "fresh-scam.xyz"),
            Err(LookupError::Parse(_))
        ));
    }

    #[test]
    fn test_registry_reply_is_parsed() {
        let reply = "Domain Name: FRESH-SCAM.XYZ\n\
                     Registry WHOIS Server: whois.nic.xyz\n\
                     Creation Date: 2026-10-01T08:12:00.0Z\n";
        assert_eq!(referral_server(reply), None);
        assert_eq!(
            parse_whois_response(reply, "fresh-scam.xyz").unwrap(),
            DomainAge::Created(Utc.with_ymd_and_hms(2026, 10, 1, 8, 12, 0).unwrap())
        );
    }

    #[test]
    fn test_throwaway_tlds_have_registry_servers() {
        assert_eq!(whois_server("free-prize.ml"), "whois.dot.ml");
        assert_eq!(whois_server("free-prize.ga"), "whois.dot.ga");
        assert_eq!(whois_server("free-prize.cf"), "whois.dot.cf");
        assert_eq!(whois_server("free-prize.xyz"), "whois.iana.org");
    }

    #[test]
    fn test_is_newer_than() {
        let now = Utc::now();
        let window = chrono::Duration::days(30);
        assert!(DomainAge::Created(now - chrono::Duration::days(3)).is_newer_than(window, now));
        assert!(!DomainAge::Created(now - chrono::Duration::days(31)).is_newer_than(window, now));
        assert!(!DomainAge::Unknown.is_newer_than(window, now));
    }

    #[tokio::test]
    async fn test_static_domain_ages() {
        let lookup = StaticDomainAges::new()
            .with_age("psybook.info", 5)
            .with_failure("down.example");

        assert!(matches!(
            lookup.creation_date("www.psybook.info").await,
            Ok(DomainAge::Created(_))
        ));
        assert!(matches!(
            lookup.creation_date("google.com").await,
            Ok(DomainAge::Unknown)
        ));
        assert!(matches!(
            lookup.creation_date("down.example").await,
            Err(LookupError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_whois_rejects_invalid_domain() {
        let client = WhoisClient::new(1);
        assert!(matches!(
            client.creation_date("localhost").await,
            Err(LookupError::InvalidDomain(_))
        ));
    }
}
