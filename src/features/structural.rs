use crate::findings::{Finding, FindingKind};

/// Capitalisation is only judged above this many alphabetic characters.
pub const MIN_ALPHA_FOR_CAPS_CHECK: usize = 20;
pub const MAX_UPPERCASE_RATIO: f64 = 0.30;
pub const MIN_WORD_COUNT: usize = 5;

/// Shape checks over the raw body. Findings always come out in the order
/// capitalisation, non-ASCII, short body.
pub fn analyze_structure(body: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    let (alpha, upper) = body
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(alpha, upper), c| {
            (alpha + 1, upper + usize::from(c.is_uppercase()))
        });
    if alpha > MIN_ALPHA_FOR_CAPS_CHECK {
        let ratio = upper as f64 / alpha as f64;
        if ratio > MAX_UPPERCASE_RATIO {
            log::debug!("Uppercase ratio {ratio:.2} over {alpha} letters");
            findings.push(Finding::new(FindingKind::ExcessiveCapitalization));
        }
    }

    if !body.is_ascii() {
        findings.push(Finding::new(FindingKind::ContainsNonAsciiChars));
    }

    if body.split_whitespace().count() < MIN_WORD_COUNT {
        findings.push(Finding::new(FindingKind::ExtremelyShortBody));
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(body: &str) -> Vec<FindingKind> {
        analyze_structure(body).into_iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_empty_body_is_short() {
        assert_eq!(kinds(""), vec![FindingKind::ExtremelyShortBody]);
    }

    #[test]
    fn test_short_body() {
        assert!(kinds("click this link now").contains(&FindingKind::ExtremelyShortBody));
        assert!(!kinds("please click this link now").contains(&FindingKind::ExtremelyShortBody));
    }

    #[test]
    fn test_excessive_capitalization() {
        let shouting = "YOUR ACCOUNT HAS BEEN SUSPENDED pending review";
        assert!(kinds(shouting).contains(&FindingKind::ExcessiveCapitalization));

        let calm = "Your account has been reviewed and everything looks fine";
        assert!(!kinds(calm).contains(&FindingKind::ExcessiveCapitalization));
    }

    #[test]
    fn test_caps_needs_enough_letters() {
        // 20 letters, all uppercase: not enough text to judge
        let body = "ABCDE FGHIJ KLMNO PQRST";
        assert!(!kinds(body).contains(&FindingKind::ExcessiveCapitalization));

        let body = "ABCDE FGHIJ KLMNO PQRST U";
        assert!(kinds(body).contains(&FindingKind::ExcessiveCapitalization));
    }

    #[test]
    fn test_caps_ratio_boundary() {
        // 3 upper out of 10 letters is exactly 0.30, not over it
        let body = "ABCdefghij ABCdefghij ABCdefghij";
        assert!(!kinds(body).contains(&FindingKind::ExcessiveCapitalization));
    }

    #[test]
    fn test_non_ascii() {
        assert!(kinds("Pay your invoice at pаypal.com today please")
            .contains(&FindingKind::ContainsNonAsciiChars));
        assert!(!kinds("Pay your invoice at paypal.com today please")
            .contains(&FindingKind::ContainsNonAsciiChars));
    }

    #[test]
    fn test_finding_order_is_fixed() {
        assert_eq!(
            kinds("ÜBERWEISUNG JETZT SOFORT AUSFÜHREN"),
            vec![
                FindingKind::ExcessiveCapitalization,
                FindingKind::ContainsNonAsciiChars,
                FindingKind::ExtremelyShortBody,
            ]
        );
    }
}
