use std::{borrow::Cow, sync::OnceLock};

use regex::Regex;
use serde_json::{Map, Value};

use crate::{CheckResult, Evaluation, OutputMap};

/// Classification of a single stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolLine {
    Result(CheckResult),
    Output(OutputMap),
    Status(Evaluation),
    /// Anything that is not a well-formed protocol object.
    Log(String),
}

impl ProtocolLine {
    /// Classifies one line. Never fails: malformed protocol objects are log noise.
    pub fn parse(line: &str) -> ProtocolLine {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let cleaned = strip_ansi(line);
        let candidate = cleaned.trim();
        if !candidate.starts_with('{') {
            return ProtocolLine::Log(line.to_string());
        }

        let Ok(Value::Object(object)) = serde_json::from_str::<Value>(candidate) else {
            return ProtocolLine::Log(line.to_string());
        };

        classify_object(object).unwrap_or_else(|| ProtocolLine::Log(line.to_string()))
    }

    pub fn is_log(&self) -> bool {
        matches!(self, ProtocolLine::Log(_))
    }
}

fn classify_object(mut object: Map<String, Value>) -> Option<ProtocolLine> {
    if object.len() == 2 && object.contains_key("status") && object.contains_key("reason") {
        let status = object.remove("status")?;
        let reason = object.remove("reason")?;
        let status = status.as_str()?.parse().ok()?;
        let reason = reason.as_str()?.to_string();
        return Some(ProtocolLine::Status(Evaluation { status, reason }));
    }

    if object.len() != 1 {
        return None;
    }

    let (key, payload) = object.into_iter().next()?;
    match key.as_str() {
        "result" => serde_json::from_value::<CheckResult>(payload)
            .ok()
            .map(ProtocolLine::Result),
        "output" => {
            let Value::Object(entries) = payload else {
                return None;
            };
            let mut outputs = OutputMap::new();
            for (key, value) in entries {
                let Value::String(value) = value else {
                    return None;
                };
                outputs.insert(key, value);
            }
            Some(ProtocolLine::Output(outputs))
        }
        _ => None,
    }
}

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)")
            .unwrap_or_else(|err| panic!("invalid ANSI pattern: {err}"))
    })
}

/// Removes CSI/OSC terminal escape sequences (colours, hyperlinks).
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    if !text.contains('\x1b') {
        return Cow::Borrowed(text);
    }
    ansi_pattern().replace_all(text, "")
}
