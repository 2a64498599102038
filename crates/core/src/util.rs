use std::sync::OnceLock;

use regex::Regex;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub fn extract_github_url(url: &str) -> Option<(&str, &str)> {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    let caps = REGEX
        .get_or_init(|| {
            Regex::new(r"^https?://github\.com/(?P<owner>[^/]+)/(?P<repo>[^/]+?)(?:\.git)?(?:/|$)")
                .unwrap()
        })
        .captures(url)?;
    let owner = caps.name("owner").map(|m| m.as_str()).unwrap_or_default();
    let repo = caps.name("repo").map(|m| m.as_str()).unwrap_or_default();
    Some((owner, repo))
}

/// Parse an RFC 3339 timestamp as returned by the GitHub API.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).ok()
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.unix_timestamp().to_string())
}

/// Format a size in bytes to a human-readable string.
/// Uses SI (kilo = 1000) units, formatted to two decimal places.
pub fn size(value: u64) -> String {
    let units = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
    let mut value = value as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < units.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.2} {}", value, units[unit])
}
