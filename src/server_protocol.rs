use serde_json::{Map, Value};

use crate::types::Direction;

/// A client frame after validation. Anything that does not decode cleanly is
/// dropped by the caller with an error reply, never partially applied.
#[derive(Debug)]
pub enum ClientMessage {
    Hello {
        name: String,
        reconnect_token: Option<String>,
        spectator: bool,
    },
    Start {
        level: Option<i64>,
    },
    Input {
        dir: Option<Direction>,
    },
    Ping {
        t: f64,
    },
}

pub fn decode_client_message(raw: &str) -> Option<ClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let fields = value.as_object()?;
    match fields.get("type")?.as_str()? {
        "hello" => decode_hello(fields),
        "start" => decode_start(fields),
        "input" => decode_input(fields),
        "ping" => decode_ping(fields),
        _ => None,
    }
}

fn decode_hello(fields: &Map<String, Value>) -> Option<ClientMessage> {
    let name = fields.get("name")?.as_str()?.to_string();
    let reconnect_token = match fields.get("reconnectToken") {
        Some(token) => Some(token.as_str()?.to_string()),
        None => None,
    };
    let spectator = match fields.get("spectator") {
        Some(flag) => flag.as_bool()?,
        None => false,
    };
    Some(ClientMessage::Hello {
        name,
        reconnect_token,
        spectator,
    })
}

fn decode_start(fields: &Map<String, Value>) -> Option<ClientMessage> {
    let level = match fields.get("level") {
        Some(raw) => Some(whole_number(raw)?),
        None => None,
    };
    Some(ClientMessage::Start { level })
}

fn decode_input(fields: &Map<String, Value>) -> Option<ClientMessage> {
    let dir = match fields.get("dir") {
        Some(raw) => Some(Direction::parse_move(raw.as_str()?)?),
        None => None,
    };
    Some(ClientMessage::Input { dir })
}

fn decode_ping(fields: &Map<String, Value>) -> Option<ClientMessage> {
    let t = fields.get("t")?.as_f64()?;
    if !t.is_finite() {
        return None;
    }
    Some(ClientMessage::Ping { t })
}

// Browser clients cannot faithfully send integers beyond Number.MAX_SAFE_INTEGER.
const JS_SAFE_INT: f64 = 9_007_199_254_740_991.0;

/// Accepts any JSON number; floats are floored, which is how the level picker
/// in the web client submits fractional slider positions.
fn whole_number(raw: &Value) -> Option<i64> {
    if let Some(number) = raw.as_i64() {
        return Some(number);
    }
    if let Some(number) = raw.as_u64() {
        return i64::try_from(number).ok();
    }
    let number = raw.as_f64()?;
    if !number.is_finite() {
        return None;
    }
    let floored = number.floor();
    if floored.abs() > JS_SAFE_INT {
        return None;
    }
    Some(floored as i64)
}
