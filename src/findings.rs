use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between a finding's base kind and its payload in the wire form.
pub const PAYLOAD_SEPARATOR: char = ':';

const URL_COUNT_PREFIX: &str = "CONTAINS_";
const URL_COUNT_SUFFIX: &str = "_URLS";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FindingKind {
    // Structural
    ExcessiveCapitalization,
    ContainsNonAsciiChars,
    ExtremelyShortBody,

    // Links
    ContainsUrls,
    LinkIsIpAddress,
    NewDomainDetected,

    // Linguistic
    HighUrgencyDetected,
    FinancialTopicDetected,
    AuthorityImpersonationAttempt,
    NlpModelNotFound,

    /// A base kind this build does not know. Scored as zero.
    Other(String),
}

impl FindingKind {
    pub const KNOWN: [FindingKind; 10] = [
        FindingKind::ExcessiveCapitalization,
        FindingKind::ContainsNonAsciiChars,
        FindingKind::ExtremelyShortBody,
        FindingKind::ContainsUrls,
        FindingKind::LinkIsIpAddress,
        FindingKind::NewDomainDetected,
        FindingKind::HighUrgencyDetected,
        FindingKind::FinancialTopicDetected,
        FindingKind::AuthorityImpersonationAttempt,
        FindingKind::NlpModelNotFound,
    ];

    /// Name used as the weight table key.
    pub fn base_name(&self) -> &str {
        match self {
            FindingKind::ExcessiveCapitalization => "EXCESSIVE_CAPITALIZATION",
            FindingKind::ContainsNonAsciiChars => "CONTAINS_NON_ASCII_CHARS",
            FindingKind::ExtremelyShortBody => "EXTREMELY_SHORT_BODY",
            FindingKind::ContainsUrls => "CONTAINS_URLS",
            FindingKind::LinkIsIpAddress => "LINK_IS_IP_ADDRESS",
            FindingKind::NewDomainDetected => "NEW_DOMAIN_DETECTED",
            FindingKind::HighUrgencyDetected => "HIGH_URGENCY_DETECTED",
            FindingKind::FinancialTopicDetected => "FINANCIAL_TOPIC_DETECTED",
            FindingKind::AuthorityImpersonationAttempt => "AUTHORITY_IMPERSONATION_ATTEMPT",
            FindingKind::NlpModelNotFound => "NLP_MODEL_NOT_FOUND",
            FindingKind::Other(name) => name.as_str(),
        }
    }

    pub fn from_base_name(name: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|kind| kind.base_name() == name)
            .cloned()
            .unwrap_or_else(|| FindingKind::Other(name.to_string()))
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.base_name())
    }
}

impl Serialize for FindingKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single signal emitted by an extractor.
///
/// The wire form is `BASE_KIND` or `BASE_KIND:payload`, except for the URL
/// count which is embedded in the identifier itself (`CONTAINS_3_URLS`).
/// `Display` and `FromStr` round-trip that form exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Finding {
    pub kind: FindingKind,
    /// Text after the `:` separator.
    pub payload: Option<String>,
    /// Raw `<N>` of a `CONTAINS_<N>_URLS` identifier. Never set together
    /// with `payload`.
    count: Option<String>,
}

impl Finding {
    pub fn new(kind: FindingKind) -> Self {
        Self {
            kind,
            payload: None,
            count: None,
        }
    }

    pub fn with_payload(kind: FindingKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: Some(payload.into()),
            count: None,
        }
    }

    pub fn url_count(count: usize) -> Self {
        Self::with_embedded_count(count.to_string())
    }

    fn with_embedded_count(count: impl Into<String>) -> Self {
        Self {
            kind: FindingKind::ContainsUrls,
            payload: None,
            count: Some(count.into()),
        }
    }

    pub fn new_domain(host: impl Into<String>) -> Self {
        Self::with_payload(FindingKind::NewDomainDetected, host)
    }

    /// Count embedded in a `CONTAINS_<N>_URLS` finding, if it parses.
    pub fn embedded_count(&self) -> Option<u32> {
        match (&self.kind, &self.count) {
            (FindingKind::ContainsUrls, Some(count)) => count.parse().ok(),
            _ => None,
        }
    }

    pub fn has_embedded_count(&self) -> bool {
        self.count.is_some()
    }

    /// Title-cased label for display, e.g. `Link Is Ip Address`.
    pub fn label(&self) -> String {
        let raw = self.to_string().replace('_', " ");
        let mut label = String::with_capacity(raw.len());
        let mut prev_alpha = false;
        for c in raw.chars() {
            if c.is_alphabetic() {
                if prev_alpha {
                    label.extend(c.to_lowercase());
                } else {
                    label.extend(c.to_uppercase());
                }
                prev_alpha = true;
            } else {
                label.push(c);
                prev_alpha = false;
            }
        }
        label
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.count, &self.payload) {
            (Some(count), _) => write!(f, "{URL_COUNT_PREFIX}{count}{URL_COUNT_SUFFIX}"),
            (None, Some(payload)) => write!(f, "{}{PAYLOAD_SEPARATOR}{payload}", self.kind),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FindingParseError {
    #[error("empty finding identifier")]
    Empty,
}

impl FromStr for Finding {
    type Err = FindingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(FindingParseError::Empty);
        }

        if let Some((base, payload)) = s.split_once(PAYLOAD_SEPARATOR) {
            return Ok(Finding::with_payload(
                FindingKind::from_base_name(base),
                payload,
            ));
        }

        // The count form only exists without a payload separator
        if s.len() > URL_COUNT_PREFIX.len() + URL_COUNT_SUFFIX.len()
            && s.starts_with(URL_COUNT_PREFIX)
            && s.ends_with(URL_COUNT_SUFFIX)
        {
            let count = &s[URL_COUNT_PREFIX.len()..s.len() - URL_COUNT_SUFFIX.len()];
            return Ok(Finding::with_embedded_count(count));
        }

        Ok(Finding::new(FindingKind::from_base_name(s)))
    }
}

impl Serialize for Finding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Finding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
