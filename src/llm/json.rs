//! Lenient JSON recovery from chatty model output.

use serde_json::Value;

/// Parse the whole reply as JSON; failing that, the span from the first `[`
/// to the last `]`. Returns `None` when neither parses.
pub fn parse_json_list_maybe(reply: &str) -> Option<Value> {
    let reply = reply.trim();
    if let Ok(value) = serde_json::from_str(reply) {
        return Some(value);
    }
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}
