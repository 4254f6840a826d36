use serde_json::{json, Value};

use attack_lab::gate::{
    is_target_allowed, looks_like_safe_script_payload, safe_parse, sanitize_markup, target_rule,
    validate_structured_size, TargetRule,
};

fn nest(levels: usize) -> Value {
    (0..levels).fold(json!("leaf"), |inner, i| {
        if i % 2 == 0 {
            json!([inner])
        } else {
            json!({ "k": inner })
        }
    })
}

#[test]
fn test_sanitize_script_tag() {
    assert_eq!(sanitize_markup("<script>"), "&lt;script&gt;");
}

#[test]
fn test_sanitize_twice_escapes_again() {
    let input = r#"<a href="/x">'&'</a>"#;
    let once = sanitize_markup(input);
    let twice = sanitize_markup(&once);

    assert_eq!(
        once,
        "&lt;a href=&quot;&#x2F;x&quot;&gt;&#x27;&amp;&#x27;&lt;&#x2F;a&gt;"
    );
    assert_ne!(once, twice);
    assert!(twice.starts_with("&amp;lt;a"));
}

#[test]
fn test_sanitized_output_has_no_markup() {
    let once = sanitize_markup("<img src=x onerror=alert(1)>");
    assert!(!once.contains('<'));
    assert!(!once.contains('>'));
}

#[test]
fn test_target_examples() {
    assert!(!is_target_allowed("http://10.0.0.5"));
    assert!(is_target_allowed("http://example.com"));
    assert!(!is_target_allowed("not a url"));
    assert!(!is_target_allowed("http://192.168.1.1/admin"));
}

#[test]
fn test_target_rule_order() {
    assert_eq!(target_rule("http://localhost:8080"), TargetRule::Allowlisted);
    assert_eq!(target_rule("http://127.0.0.1"), TargetRule::Allowlisted);
    assert_eq!(target_rule("http://127.0.0.5"), TargetRule::Blocked("127."));
    assert_eq!(target_rule("http://172.20.1.1"), TargetRule::Blocked("172.20."));
    assert_eq!(target_rule("https://evil.test"), TargetRule::DefaultAllowed);
}

#[test]
fn test_target_with_credentials_uses_host() {
    assert!(!is_target_allowed("http://example.com@10.0.0.1/"));
    assert!(is_target_allowed("http://user:pw@example.com/"));
}

#[test]
fn test_script_heuristic() {
    assert!(!looks_like_safe_script_payload("<script>alert(1)</script>"));
    assert!(!looks_like_safe_script_payload("<a href=\"javascript:void(0)\">"));
    assert!(looks_like_safe_script_payload("just text"));
}

#[test]
fn test_depth_limit() {
    assert!(validate_structured_size(&nest(9)));
    assert!(!validate_structured_size(&nest(11)));
}

#[test]
fn test_size_limit() {
    let under = json!({ "blob": "x".repeat(1000) });
    assert!(validate_structured_size(&under));

    let over = json!({ "blob": "x".repeat(1024 * 1024) });
    assert!(!validate_structured_size(&over));
}

#[test]
fn test_safe_parse() {
    assert_eq!(safe_parse("[1, 2, 3]"), Some(json!([1, 2, 3])));
    assert_eq!(safe_parse(""), None);
    assert_eq!(safe_parse(&nest(11).to_string()), None);
    assert!(safe_parse(&nest(9).to_string()).is_some());
}
