//! Turns free-form model output into a `(plan, action)` pair.
//!
//! Parsing runs an ordered chain of [`ParseStrategy`] values; the first one that
//! recognizes the text wins. When none does, the action is the [`NO_ACTION`]
//! sentinel and the plan is the trimmed text.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::agent_engine::literal::parse_literal;
use crate::perception::types::Dimensions;

/// Action text meaning "nothing usable could be extracted".
pub const NO_ACTION: &str = "None";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutput {
    pub plan: String,
    pub action: String,
}

impl ParsedOutput {
    /// Empty or sentinel action: the model did not follow the response format.
    pub fn is_format_violation(&self) -> bool {
        self.action.is_empty() || self.action == NO_ACTION
    }
}

pub trait ParseStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` means "not mine, try the next strategy".
    fn parse(&self, text: &str, dims: Dimensions) -> Option<ParsedOutput>;
}

/// Literal mapping output, e.g. `{'action': 'CLICK', 'position': [0.49, 0.42]}`,
/// with positions normalized to [0,1].
pub struct DictLiteralStrategy;

impl ParseStrategy for DictLiteralStrategy {
    fn name(&self) -> &'static str {
        "dict_literal"
    }

    fn parse(&self, text: &str, dims: Dimensions) -> Option<ParsedOutput> {
        let text = text.trim();
        if !(text.starts_with('{') && text.ends_with('}')) {
            return None;
        }

        let data = match parse_literal(text) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                tracing::warn!(kind = %value_kind(&other), "dict-literal output is not a mapping");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dict-literal output failed to parse");
                return None;
            }
        };

        // An explicit `None` renders as the no-action sentinel, which the predictor retries.
        let action_type = data.get("action").map(literal_text).unwrap_or_else(|| "click".to_string());

        let position = data.get("position").and_then(Value::as_array);
        let action = match position {
            Some(pos) if pos.len() >= 2 => {
                let (Some(nx), Some(ny)) = (pos[0].as_f64(), pos[1].as_f64()) else {
                    tracing::warn!(position = ?pos, "dict-literal position is not numeric");
                    return None;
                };
                let (x, y) = dims.to_absolute(nx, ny);
                format!("{action_type} ({x}, {y})")
            }
            _ => {
                match data.get("value").filter(|v| is_truthy(v)) {
                    Some(value) => format!("{action_type} \"{}\"", literal_text(value)),
                    None => action_type,
                }
            }
        };

        Some(ParsedOutput {
            plan: format!("ShowUI Raw: {text}"),
            action,
        })
    }
}

/// `Thought: ... Action: ...` output. The last `Action:`/`Actions:` marker splits the text.
pub struct MarkerStrategy;

fn marker_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:Action|Actions)\s*:").expect("valid marker regex"))
}

fn plan_label_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:Plan|Thought|Thoughts|Your Plan/Thought process|thoughts?)\s*:")
            .expect("valid label regex")
    })
}

fn strip_braces(s: &str) -> &str {
    s.trim_matches(|c| c == '{' || c == '}').trim()
}

impl ParseStrategy for MarkerStrategy {
    fn name(&self) -> &'static str {
        "action_marker"
    }

    fn parse(&self, text: &str, _dims: Dimensions) -> Option<ParsedOutput> {
        let text = text.trim();
        let marker = marker_pattern().find_iter(text).last()?;

        let plan = strip_braces(text[..marker.start()].trim());
        let plan = plan_label_pattern().replace(plan, "").trim().to_string();
        let action = strip_braces(text[marker.end()..].trim()).to_string();

        Some(ParsedOutput { plan, action })
    }
}

pub struct ActionParser {
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl Default for ActionParser {
    fn default() -> Self {
        Self::new(vec![Box::new(DictLiteralStrategy), Box::new(MarkerStrategy)])
    }
}

impl ActionParser {
    pub fn new(strategies: Vec<Box<dyn ParseStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn parse(&self, text: &str, dims: Dimensions) -> ParsedOutput {
        for strategy in &self.strategies {
            if let Some(parsed) = strategy.parse(text, dims) {
                tracing::debug!(strategy = strategy.name(), action = %parsed.action, "model output parsed");
                return parsed;
            }
        }
        ParsedOutput {
            plan: text.trim().to_string(),
            action: NO_ACTION.to_string(),
        }
    }
}

/// Text of a literal value as the model wrote it: `None`, `True`, bare strings.
fn literal_text(v: &Value) -> String {
    match v {
        Value::Null => NO_ACTION.to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Literal truthiness: `None`, `False`, zero and empty containers count as absent.
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
