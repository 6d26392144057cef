//! Extract tool calls from raw model text.
//!
//! The model is asked to answer with a JSON array (or a single object) of
//! `{"tool": ..., "arguments": {...}}`, but replies often wrap it in prose or
//! code fences. The parser slices from the first opening bracket to the last
//! matching closing bracket and decodes that. Anything that does not decode
//! to well-formed tool calls is a plain answer, not an error.

use serde::Deserialize;

use crate::tools::ToolCallRequest;

/// What the model asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// Plain text; pass it through to the user.
    NoToolCalls,
    /// One or more calls, in order of appearance.
    ToolCalls(Vec<ToolCallRequest>),
}

impl ParsedResponse {
    pub fn is_tool_calls(&self) -> bool {
        matches!(self, Self::ToolCalls(_))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Wire {
    Many(Vec<ToolCallRequest>),
    One(ToolCallRequest),
}

/// Parse a model reply into tool calls.
pub fn parse(text: &str) -> ParsedResponse {
    let mut candidates = [slice(text, '[', ']'), slice(text, '{', '}')];
    candidates.sort_by_key(|c| c.map_or(usize::MAX, |(start, _)| start));

    candidates
        .into_iter()
        .flatten()
        .find_map(|(_, json)| decode(json))
        .map_or(ParsedResponse::NoToolCalls, ParsedResponse::ToolCalls)
}

/// From the first `open` to the last `close`, inclusive.
fn slice(text: &str, open: char, close: char) -> Option<(usize, &str)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| (start, &text[start..=end]))
}

fn decode(json: &str) -> Option<Vec<ToolCallRequest>> {
    let calls = match serde_json::from_str::<Wire>(json).ok()? {
        Wire::Many(calls) => calls,
        Wire::One(call) => vec![call],
    };
    (!calls.is_empty()).then_some(calls)
}
