use url::Url;

/// Hosts that are always accepted, checked before the block-list.
pub const ALLOWED_HOSTS: [&str; 4] = ["localhost", "127.0.0.1", "example.com", "api.example.com"];

/// Loopback, link-local and private IPv4 prefixes.
pub const BLOCKED_HOST_PREFIXES: [&str; 20] = [
    "169.254.", "127.", "10.", "172.16.", "172.17.", "172.18.", "172.19.", "172.20.", "172.21.",
    "172.22.", "172.23.", "172.24.", "172.25.", "172.26.", "172.27.", "172.28.", "172.29.",
    "172.30.", "172.31.", "192.168.",
];

/// Which rule decided a target URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRule {
    Allowlisted,
    Blocked(&'static str),
    /// On neither list. Accepted.
    DefaultAllowed,
    Unparseable,
    MissingHost,
}

impl TargetRule {
    pub fn allows(self) -> bool {
        matches!(self, TargetRule::Allowlisted | TargetRule::DefaultAllowed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetRule::Allowlisted => "allowlisted",
            TargetRule::Blocked(_) => "blocked",
            TargetRule::DefaultAllowed => "default-allowed",
            TargetRule::Unparseable => "unparseable",
            TargetRule::MissingHost => "missing-host",
        }
    }
}

impl std::fmt::Display for TargetRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetRule::Blocked(prefix) => write!(f, "blocked ({prefix}*)"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Classify `raw_url`: allow-list, then block-list prefixes, then allow.
pub fn target_rule(raw_url: &str) -> TargetRule {
    let parsed = match Url::parse(raw_url) {
        Ok(url) => url,
        Err(_) => return TargetRule::Unparseable,
    };
    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host,
        _ => return TargetRule::MissingHost,
    };

    if ALLOWED_HOSTS.contains(&host) {
        return TargetRule::Allowlisted;
    }
    if let Some(prefix) = BLOCKED_HOST_PREFIXES
        .iter()
        .copied()
        .find(|prefix| host.starts_with(prefix))
    {
        return TargetRule::Blocked(prefix);
    }
    TargetRule::DefaultAllowed
}

/// Fails closed on anything that does not parse to a URL with a host.
pub fn is_target_allowed(raw_url: &str) -> bool {
    target_rule(raw_url).allows()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ranges_are_denied() {
        assert!(!is_target_allowed("http://10.0.0.5"));
        assert!(!is_target_allowed("http://192.168.1.1/admin"));
        assert!(!is_target_allowed("http://172.16.0.1"));
        assert!(!is_target_allowed("http://172.31.255.255:8080/x"));
        assert!(!is_target_allowed("http://169.254.169.254/latest/meta-data"));
        assert!(!is_target_allowed("http://127.0.0.2"));
    }

    #[test]
    fn allow_list_wins_over_block_list() {
        assert!(is_target_allowed("http://127.0.0.1:3000/"));
        assert!(is_target_allowed("http://localhost"));
        assert!(is_target_allowed("http://example.com"));
        assert!(is_target_allowed("https://api.example.com/v1"));
        assert_eq!(target_rule("http://127.0.0.1"), TargetRule::Allowlisted);
    }

    #[test]
    fn unknown_hosts_default_to_allowed() {
        assert_eq!(
            target_rule("http://internal-api.corp"),
            TargetRule::DefaultAllowed
        );
        assert!(is_target_allowed("http://172.32.0.1"));
        assert!(is_target_allowed("http://11.0.0.1"));
    }

    #[test]
    fn unparseable_input_fails_closed() {
        assert!(!is_target_allowed("not a url"));
        assert!(!is_target_allowed(""));
        assert_eq!(target_rule("://nope"), TargetRule::Unparseable);
    }

    #[test]
    fn urls_without_host_fail_closed() {
        assert_eq!(target_rule("mailto:a@example.com"), TargetRule::MissingHost);
        assert!(!is_target_allowed("file:///etc/passwd"));
    }

    #[test]
    fn blocked_rule_reports_prefix() {
        assert_eq!(target_rule("http://10.1.2.3"), TargetRule::Blocked("10."));
        assert_eq!(
            target_rule("http://10.1.2.3").to_string(),
            "blocked (10.*)"
        );
    }
}
