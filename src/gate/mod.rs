//! Admission gate for untrusted submissions.
//!
//! Everything here is stateless and total: parse or policy failures come back
//! as `bool`/`Option`, never as a panic or `Err`.
//!
//! - [`markup`]: HTML escaping and the script-payload heuristic
//! - [`target`]: allow/block policy for target URLs
//! - [`structured`]: size and nesting limits for structured payloads

pub mod markup;
pub mod structured;
pub mod target;

pub use markup::{looks_like_safe_script_payload, sanitize_markup};
pub use structured::{safe_parse, validate_structured_size, MAX_DEPTH, MAX_SERIALIZED_BYTES};
pub use target::{is_target_allowed, target_rule, TargetRule};

/// Log target for gate decisions.
pub const SECURITY_LOG_TARGET: &str = "attack_lab::security";

/// Record a gate decision in the security log.
pub fn log_security_event(event_type: &str, submitter_id: &str, detail: &str) {
    tracing::warn!(
        target: SECURITY_LOG_TARGET,
        event_type,
        submitter_id,
        detail,
        "Security event"
    );
}
