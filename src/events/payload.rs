//! Typed payload values.
//!
//! MQTT payloads are text on the wire, but handlers produce numbers as often
//! as strings. [`Payload`] keeps the distinction until the publish happens.
//! [`BoolLike`] makes the three boolean spellings in use explicit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A value headed for an MQTT publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Payload {
    /// True for an empty text payload. Numbers are never empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Text(text) if text.is_empty())
    }

    /// Convert a JSON scalar. Objects and arrays are carried as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Payload::Text(if *b { "True" } else { "False" }.to_string())),
            Value::Number(n) => n
                .as_i64()
                .map(Payload::Integer)
                .or_else(|| n.as_f64().map(Payload::Float)),
            Value::String(s) => Some(Payload::Text(s.clone())),
            other => Some(Payload::Text(other.to_string())),
        }
    }

    /// Wire representation.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Integer(i) => write!(f, "{}", i),
            Payload::Float(v) => write!(f, "{}", v),
            Payload::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Integer(value)
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Float(value)
    }
}

/// Spelling of a boolean on one side of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolEncoding {
    /// `true` / `false` (local sensors).
    Word,
    /// `on` / `off` (local actuators).
    Switch,
    /// `1` / `0` (cloud feeds).
    Digit,
}

impl BoolEncoding {
    fn literals(&self) -> (&'static str, &'static str) {
        match self {
            BoolEncoding::Word => ("true", "false"),
            BoolEncoding::Switch => ("on", "off"),
            BoolEncoding::Digit => ("1", "0"),
        }
    }
}

/// A boolean parsed from one of the known spellings, keeping the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolLike {
    pub raw_text: String,
    pub canonical: bool,
}

impl BoolLike {
    /// Parse `raw` as `encoding`. Matching is exact; anything else is `None`.
    pub fn parse(raw: &str, encoding: BoolEncoding) -> Option<Self> {
        let (yes, no) = encoding.literals();
        let canonical = if raw == yes {
            true
        } else if raw == no {
            false
        } else {
            return None;
        };
        Some(Self {
            raw_text: raw.to_string(),
            canonical,
        })
    }

    /// Spell this value in `encoding`.
    pub fn encode(&self, encoding: BoolEncoding) -> &'static str {
        let (yes, no) = encoding.literals();
        if self.canonical {
            yes
        } else {
            no
        }
    }

    /// Numeric form, as published to cloud feeds.
    pub fn as_digit(&self) -> Payload {
        Payload::Integer(i64::from(self.canonical))
    }
}

/// Translate `raw` from one boolean spelling to a digit payload, passing
/// anything unrecognized through as text.
pub fn translate_to_digit(raw: &str, from: BoolEncoding) -> Payload {
    match BoolLike::parse(raw, from) {
        Some(value) => value.as_digit(),
        None => Payload::from(raw),
    }
}

/// Translate `raw` between two textual boolean spellings, passing anything
/// unrecognized through unchanged.
pub fn translate_text(raw: &str, from: BoolEncoding, to: BoolEncoding) -> String {
    match BoolLike::parse(raw, from) {
        Some(value) => value.encode(to).to_string(),
        None => raw.to_string(),
    }
}
