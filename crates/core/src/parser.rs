//! Extracts a structured action from free-form model output.
//!
//! The model is prompted to answer with a JSON block such as
//! `{"text": "...", "motion": "nod", "emotion": "happy", "led": "rainbow"}`,
//! but it frequently wraps that block in prose or omits it entirely. The
//! parser never fails: anything it cannot use degrades to plain speech.

use crate::action::ActionCommand;
use crate::catalog::{Expression, LightEffectId, LightSetting, Motion};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Parses model output into an optional action and the text to speak.
pub struct ActionParser;

impl ActionParser {
    /// Returns the action found in `raw` (if any) and the display text.
    ///
    /// When no usable block is found the display text is `raw` unchanged.
    pub fn parse(raw: &str) -> (Option<ActionCommand>, String) {
        let Some(block) = find_block(raw) else {
            debug!("no action block in model output");
            return (None, raw.to_string());
        };

        let data = match serde_json::from_str::<Value>(block) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(block, "action block is not a JSON object");
                return (None, raw.to_string());
            }
            Err(e) => {
                warn!(error = %e, block, "failed to decode action block");
                return (None, raw.to_string());
            }
        };

        let Some(text) = data.get("text").and_then(Value::as_str) else {
            warn!(block, "action block has no text field");
            return (None, raw.to_string());
        };

        let command = ActionCommand {
            text: text.to_string(),
            motion: motion_field(&data),
            expression: expression_field(&data),
            light: light_field(&data),
        };
        info!(
            motion = %command.motion,
            expression = %command.expression,
            light = %command.light,
            "parsed action"
        );
        let text = command.text.clone();
        (Some(command), text)
    }

    /// Display text only, for callers that just need speech.
    pub fn extract_text_only(raw: &str) -> String {
        Self::parse(raw).1
    }
}

fn motion_field(data: &Map<String, Value>) -> Motion {
    match data.get("motion").and_then(Value::as_str) {
        None => Motion::Neutral,
        Some(name) => name.parse().unwrap_or_else(|_| {
            warn!(motion = name, "unknown motion, using neutral");
            Motion::Neutral
        }),
    }
}

fn expression_field(data: &Map<String, Value>) -> Expression {
    match data.get("emotion").and_then(Value::as_str) {
        None => Expression::Neutral,
        Some(name) => name.parse().unwrap_or_else(|_| {
            warn!(emotion = name, "unknown emotion, using neutral");
            Expression::Neutral
        }),
    }
}

fn light_field(data: &Map<String, Value>) -> LightSetting {
    match data.get("led").and_then(Value::as_str) {
        None => LightSetting::default(),
        Some(name) => LightSetting::Preset(LightEffectId::resolve(name)),
    }
}

/// Finds the first `{...}` block allowing one level of nested braces.
///
/// Each opening brace is tried in turn; a candidate is abandoned if it nests
/// deeper than one level or is never closed.
fn find_block(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    for (start, _) in bytes.iter().enumerate().filter(|(_, b)| **b == b'{') {
        if let Some(end) = match_from(bytes, start) {
            return Some(&text[start..=end]);
        }
    }
    None
}

fn match_from(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0u8;
    for (i, b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'{' if depth < 2 => depth += 1,
            b'{' => return None,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
