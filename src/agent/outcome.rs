//! Agent results and their normalization.
//!
//! The agent reports its result in several shapes depending on how the run
//! ended. [`AgentOutcome`] captures those shapes and [`normalize`] maps them
//! onto a single `{success, text}` pair.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Token the agent puts in front of its final answer.
pub const COMPLETION_MARKER: &str = "TASK_COMPLETE";

/// Text returned by the agent library when its manager produced unusable
/// output.
pub const INVALID_RESPONSE_MARKER: &str = "Manager response invalid";

static RATE_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)429|rate[ _-]?limit").expect("valid rate limit regex"));

/// Result reported by the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    /// A result object exposing some of the known fields.
    Record(ResultRecord),
    /// Anything else, kept as its textual form.
    Opaque(String),
}

/// Known fields of a result object. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRecord {
    pub success: Option<bool>,
    pub structured_output: Option<Value>,
    pub output: Option<Value>,
    pub result: Option<Value>,
    pub reason: Option<Value>,
    /// Textual form of the whole object.
    pub raw: String,
}

impl AgentOutcome {
    /// Classify a JSON value reported by the agent.
    ///
    /// Objects become records; `null` fields count as absent. Other values
    /// are kept opaque.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Record(ResultRecord::from_map(map)),
            other => Self::Opaque(render(&other)),
        }
    }
}

impl ResultRecord {
    fn from_map(mut map: Map<String, Value>) -> Self {
        let raw = Value::Object(map.clone()).to_string();
        let mut take = |key: &str| map.remove(key).filter(|v| !v.is_null());

        let success = take("success").and_then(|v| v.as_bool());
        Self {
            success,
            structured_output: take("structured_output"),
            output: take("output"),
            result: take("result"),
            reason: take("reason"),
            raw,
        }
    }
}

/// Canonical view of an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub success: bool,
    pub text: String,
}

/// Pick the result text and success flag.
///
/// Text priority: `structured_output` (only when structured output was
/// requested), `output`, `result`, `reason`, then the raw form. Success
/// defaults to `true` when the field is absent.
pub fn normalize(outcome: &AgentOutcome, structured_requested: bool) -> Normalized {
    match outcome {
        AgentOutcome::Opaque(text) => Normalized {
            success: true,
            text: text.clone(),
        },
        AgentOutcome::Record(record) => {
            let structured = record
                .structured_output
                .as_ref()
                .filter(|_| structured_requested);
            let text = structured
                .or(record.output.as_ref())
                .or(record.result.as_ref())
                .or(record.reason.as_ref())
                .map(render)
                .unwrap_or_else(|| record.raw.clone());

            Normalized {
                success: record.success.unwrap_or(true),
                text,
            }
        }
    }
}

/// Strings render bare, everything else as compact JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Final answer for a successful run: the text after the completion marker
/// when present, otherwise the whole text.
pub fn final_answer(text: &str) -> String {
    if !text.contains(COMPLETION_MARKER) {
        return text.to_string();
    }
    text.replace(&format!("{}:", COMPLETION_MARKER), "")
        .replace(COMPLETION_MARKER, "")
        .trim()
        .to_string()
}

/// Advice for a failed or crashed run, if the text matches a known pattern.
pub fn hint_for(text: &str) -> Option<&'static str> {
    if text.contains(INVALID_RESPONSE_MARKER) {
        Some("💡 Hint: The AI response format was unexpected. Try rephrasing your command.")
    } else if text.to_lowercase().contains("timeout") {
        Some("💡 Hint: Task took too long. Try breaking it into smaller steps.")
    } else if RATE_LIMIT.is_match(text) {
        Some("💡 Hint: Hit API rate limit. Wait a moment and try again.")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(value: Value) -> AgentOutcome {
        AgentOutcome::from_value(value)
    }

    #[test]
    fn test_reason_only() {
        let n = normalize(&outcome(json!({"reason": "Opened the settings app"})), false);
        assert_eq!(n.text, "Opened the settings app");
        assert!(n.success);
    }

    #[test]
    fn test_structured_output_wins_when_requested() {
        let value = json!({
            "structured_output": {"price": 899},
            "output": "out",
            "result": "res",
            "reason": "why",
        });
        let n = normalize(&outcome(value.clone()), true);
        assert_eq!(n.text, r#"{"price":899}"#);

        let n = normalize(&outcome(value), false);
        assert_eq!(n.text, "out");
    }

    #[test]
    fn test_priority_falls_through() {
        let n = normalize(&outcome(json!({"result": "res", "reason": "why"})), true);
        assert_eq!(n.text, "res");

        let n = normalize(&outcome(json!({"output": null, "reason": "why"})), false);
        assert_eq!(n.text, "why");
    }

    #[test]
    fn test_success_flag() {
        let n = normalize(&outcome(json!({"success": false, "reason": "stuck"})), false);
        assert!(!n.success);
        assert_eq!(n.text, "stuck");
    }

    #[test]
    fn test_unknown_shapes_fall_back_to_raw() {
        let n = normalize(&outcome(json!({"steps": 3})), false);
        assert_eq!(n.text, r#"{"steps":3}"#);
        assert!(n.success);

        let n = normalize(&outcome(json!("plain text")), false);
        assert_eq!(n.text, "plain text");

        let n = normalize(&outcome(json!(42)), false);
        assert_eq!(n.text, "42");
    }

    #[test]
    fn test_final_answer() {
        assert_eq!(final_answer("TASK_COMPLETE:  Found it for ₹899  "), "Found it for ₹899");
        assert_eq!(final_answer("TASK_COMPLETE: X"), "X");
        assert_eq!(final_answer("TASK_COMPLETE done"), "done");
        assert_eq!(final_answer("  plain answer "), "  plain answer ");
    }

    #[test]
    fn test_hints() {
        assert!(hint_for("Manager response invalid: missing plan")
            .unwrap()
            .contains("format"));
        assert!(hint_for("Request Timeout").unwrap().contains("too long"));
        assert!(hint_for("HTTP 429 Too Many Requests").unwrap().contains("rate limit"));
        assert!(hint_for("rate_limit_exceeded").unwrap().contains("rate limit"));
        assert_eq!(hint_for("could not find the button"), None);
    }
}
