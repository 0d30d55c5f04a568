//! Agent hook envelope.
//!
//! Some destinations accept events on a generic agent hook instead of a raw
//! webhook passthrough. For those routes the inbound body is wrapped into the
//! JSON record the hook expects.

use bytes::Bytes;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentHookEnvelope<'a> {
    name: &'a str,
    message: &'a str,
    deliver: bool,
    wake_mode: &'static str,
}

/// Wraps `body` under the event name `name`.
///
/// Invalid UTF-8 is replaced rather than rejected, so this never fails.
pub fn wrap(name: &str, body: &[u8]) -> Bytes {
    let message = String::from_utf8_lossy(body);
    let envelope = AgentHookEnvelope {
        name,
        message: &message,
        deliver: true,
        wake_mode: "now",
    };
    // Serializing plain strings and bools into a Vec cannot fail.
    Bytes::from(serde_json::to_vec(&envelope).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &Bytes) -> serde_json::Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn wraps_text_payload() {
        let out = parse(&wrap("notetaker:krisp", br#"{"meeting":"standup"}"#));
        assert_eq!(
            out,
            serde_json::json!({
                "name": "notetaker:krisp",
                "message": "{\"meeting\":\"standup\"}",
                "deliver": true,
                "wakeMode": "now",
            })
        );
    }

    #[test]
    fn event_name_distinguishes_integrations() {
        let a = parse(&wrap("notetaker:krisp", b"x"));
        let b = parse(&wrap("complaint-form", b"x"));
        assert_eq!(a["name"], "notetaker:krisp");
        assert_eq!(b["name"], "complaint-form");
        assert_eq!(a["message"], b["message"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let out = parse(&wrap("hook", &[b'o', b'k', 0xff, 0xfe]));
        assert_eq!(out["message"], "ok\u{fffd}\u{fffd}");
    }

    #[test]
    fn empty_body() {
        let out = parse(&wrap("hook", b""));
        assert_eq!(out["message"], "");
        assert_eq!(out["deliver"], true);
    }
}
