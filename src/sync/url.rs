//! Remote-store URL layouts

use urlencoding::encode;

/// Left in a value when the host failed to inline real data (content preview)
///
/// Split so the host's inliner never sees the whole token in this source.
pub const PLACEHOLDER_MARKER: &str = concat!("e://", "Field/");

/// Embedded values that make up a page-level URL, in wire order
pub const PAGE_FIELDS: [&str; 5] = ["variable", "value", "user", "program", "activity_ordinal"];

pub fn is_placeholder(value: &str) -> bool {
    value.contains(PLACEHOLDER_MARKER)
}

/// Per-key URL:
/// `{domain}/api/participants/{participant}/data/cross_site.gif?survey_id={survey}&{key}={value}`
pub fn participant_data_url(
    domain: &str,
    participant_id: &str,
    survey_id: &str,
    key: &str,
    value: &str,
) -> String {
    format!(
        "{}/api/participants/{}/data/cross_site.gif?survey_id={}&{}={}",
        domain,
        encode(participant_id),
        encode(survey_id),
        encode(key),
        encode(value)
    )
}

/// Page-level URL built from `(field, value)` pairs
pub fn page_data_url(domain: &str, pairs: &[(&str, String)]) -> String {
    let query = pairs
        .iter()
        .map(|(field, value)| format!("{}={}", field, encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}/api/put/pd/cross_site.gif?{}", domain, query)
}

/// Platform page a finished participant is sent to
pub fn done_url(domain: &str, program: &str, user: &str, activity_ordinal: &str) -> String {
    format!(
        "{}/done?program={}&user={}&activity_ordinal={}",
        domain,
        encode(program),
        encode(user),
        encode(activity_ordinal)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_data_url() {
        let url = participant_data_url(
            "https://platform.example.org",
            "Participant_abc",
            "Survey_123",
            "blocked_nav_count",
            "3",
        );
        assert_eq!(
            url,
            concat!(
                "https://platform.example.org/api/participants/Participant_abc",
                "/data/cross_site.gif?survey_id=Survey_123&blocked_nav_count=3"
            )
        );
    }

    #[test]
    fn test_values_are_url_encoded() {
        let url = participant_data_url("https://p.org", "p1", "s1", "comment", "a&b c/d");
        assert!(url.ends_with("comment=a%26b%20c%2Fd"));
    }

    #[test]
    fn test_page_data_url() {
        let pairs = vec![
            ("variable", "progress".to_string()),
            ("value", "50".to_string()),
            ("user", "User_1".to_string()),
        ];
        assert_eq!(
            page_data_url("https://p.org", &pairs),
            "https://p.org/api/put/pd/cross_site.gif?variable=progress&value=50&user=User_1"
        );
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder("${e://Field/participant_id}"));
        assert!(!is_placeholder("Participant_abc"));
        assert!(!is_placeholder(""));
    }

    #[test]
    fn test_done_url() {
        assert_eq!(
            done_url("https://p.org", "NP16S", "User_1", "2"),
            "https://p.org/done?program=NP16S&user=User_1&activity_ordinal=2"
        );
    }
}
