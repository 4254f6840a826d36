use once_cell::sync::Lazy;
use regex::RegexSet;

/// Patterns that mark a payload as script-bearing.
static DANGEROUS_SCRIPT_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?is)<script\b.*?</script>",
        r"(?i)javascript:",
        r"(?i)onerror=",
        r"(?i)onload=",
        r"(?i)onclick=",
    ])
    .expect("valid script pattern set")
});

/// HTML-escape `&`, `<`, `>`, `"`, `'` and `/` in a single pass.
///
/// Each character is mapped on its own, so existing entities are escaped
/// again: `sanitize_markup(sanitize_markup(x)) != sanitize_markup(x)` whenever
/// `x` contains any of the six characters.
pub fn sanitize_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// Heuristic allow signal: `false` when the payload carries a script block,
/// a `javascript:` URL or an inline `onerror=`/`onload=`/`onclick=` handler.
pub fn looks_like_safe_script_payload(payload: &str) -> bool {
    !DANGEROUS_SCRIPT_PATTERNS.is_match(payload)
}

/// Names of the patterns that matched, for reporting.
pub(crate) fn matched_script_patterns(payload: &str) -> Vec<&'static str> {
    const NAMES: [&str; 5] = ["script-block", "javascript-scheme", "onerror", "onload", "onclick"];
    DANGEROUS_SCRIPT_PATTERNS
        .matches(payload)
        .into_iter()
        .map(|i| NAMES[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_escapes_script_tag() {
        assert_eq!(sanitize_markup("<script>"), "&lt;script&gt;");
    }

    #[test]
    fn sanitize_escapes_all_six_characters() {
        assert_eq!(
            sanitize_markup(r#"&<>"'/"#),
            "&amp;&lt;&gt;&quot;&#x27;&#x2F;"
        );
        assert_eq!(sanitize_markup("plain text"), "plain text");
    }

    #[test]
    fn sanitize_is_not_idempotent() {
        let once = sanitize_markup("<b>");
        let twice = sanitize_markup(&once);
        assert_eq!(once, "&lt;b&gt;");
        assert_eq!(twice, "&amp;lt;b&amp;gt;");
        assert_ne!(once, twice);
    }

    #[test]
    fn sanitize_keeps_multibyte_text() {
        assert_eq!(sanitize_markup("héllo/ü"), "héllo&#x2F;ü");
    }

    #[test]
    fn script_blocks_are_flagged() {
        assert!(!looks_like_safe_script_payload("<script>alert(1)</script>"));
        assert!(!looks_like_safe_script_payload(
            "<SCRIPT type=\"text/javascript\">x()</ScRiPt>"
        ));
        assert!(!looks_like_safe_script_payload(
            "<script>\n<b>nested</b>\n</script>"
        ));
    }

    #[test]
    fn unclosed_script_is_not_a_block() {
        assert!(looks_like_safe_script_payload("<script>alert(1)"));
        assert!(looks_like_safe_script_payload("<scripts></scripts>"));
    }

    #[test]
    fn schemes_and_handlers_are_flagged() {
        assert!(!looks_like_safe_script_payload("JavaScript:alert(1)"));
        assert!(!looks_like_safe_script_payload("<img src=x onerror=alert(1)>"));
        assert!(!looks_like_safe_script_payload("<svg ONLOAD=go()>"));
        assert!(!looks_like_safe_script_payload("<a onclick=steal()>x</a>"));
    }

    #[test]
    fn ordinary_text_is_safe() {
        assert!(looks_like_safe_script_payload("hello world"));
        assert!(looks_like_safe_script_payload("<b>bold</b>"));
        assert!(looks_like_safe_script_payload("onerror without equals"));
    }

    #[test]
    fn matched_patterns_are_named() {
        let hits = matched_script_patterns("<img onerror=x onload=y>");
        assert_eq!(hits, vec!["onerror", "onload"]);
        assert!(matched_script_patterns("fine").is_empty());
    }
}
