use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Canonical form of one atomic GUI operation, as written in the agent prompt.
///
/// Parsing never fails: text that is not in canonical syntax is kept verbatim as
/// [`Action::Other`], and the predictor's sentinel outputs become [`Action::Error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Click { x: i64, y: i64 },
    RightClick { x: i64, y: i64 },
    DoubleClick { x: i64, y: i64 },
    Drag { x1: i64, y1: i64, x2: i64, y2: i64 },
    Scroll { offset: i64 },
    PressKey { key: String },
    Hotkey { keys: Vec<String> },
    TypeText { content: String },
    Wait,
    Finish,
    Fail,
    Error { reason: String },
    Other { text: String },
}

/// Short label for an action, used in logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    RightClick,
    DoubleClick,
    Drag,
    Scroll,
    PressKey,
    Hotkey,
    TypeText,
    Wait,
    Finish,
    Fail,
    Error,
    Other,
}

impl Action {
    /// Classify arbitrary action text.
    pub fn classify(text: &str) -> Self {
        match text.parse() {
            Ok(action) => action,
            Err(never) => match never {},
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Click { .. } => ActionKind::Click,
            Action::RightClick { .. } => ActionKind::RightClick,
            Action::DoubleClick { .. } => ActionKind::DoubleClick,
            Action::Drag { .. } => ActionKind::Drag,
            Action::Scroll { .. } => ActionKind::Scroll,
            Action::PressKey { .. } => ActionKind::PressKey,
            Action::Hotkey { .. } => ActionKind::Hotkey,
            Action::TypeText { .. } => ActionKind::TypeText,
            Action::Wait => ActionKind::Wait,
            Action::Finish => ActionKind::Finish,
            Action::Fail => ActionKind::Fail,
            Action::Error { .. } => ActionKind::Error,
            Action::Other { .. } => ActionKind::Other,
        }
    }
}

fn point_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(click|right[ _]click|double[ _]click)\s*\(\s*(-?\d+)\s*,\s*(-?\d+)\s*\)$")
            .expect("valid point regex")
    })
}

fn drag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^drag(?:\s+from)?\s*\(\s*(-?\d+)\s*,\s*(-?\d+)\s*\)\s*(?:to\s*)?\(\s*(-?\d+)\s*,\s*(-?\d+)\s*\)$",
        )
        .expect("valid drag regex")
    })
}

fn scroll_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^scroll\s*\(\s*(-?\d+)\s*\)$").expect("valid scroll regex"))
}

fn hotkey_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^hotkey\s*\((.+)\)$").expect("valid hotkey regex"))
}

fn prefixed_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^(press[ _]key|type[ _]text)\s*:\s*(.*)$").expect("valid prefix regex")
    })
}

fn int(s: &str) -> i64 {
    s.parse().unwrap_or_default()
}

impl FromStr for Action {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let lower = text.to_lowercase();

        if let Some(reason) = text
            .strip_prefix("Error:")
            .or_else(|| text.strip_prefix("API Error:"))
        {
            return Ok(Action::Error {
                reason: reason.trim().to_string(),
            });
        }

        match lower.as_str() {
            "wait" => return Ok(Action::Wait),
            "finish" => return Ok(Action::Finish),
            "fail" => return Ok(Action::Fail),
            _ => {}
        }

        if let Some(c) = point_pattern().captures(text) {
            let (x, y) = (int(&c[2]), int(&c[3]));
            let verb = c[1].to_lowercase();
            return Ok(if verb.starts_with("right") {
                Action::RightClick { x, y }
            } else if verb.starts_with("double") {
                Action::DoubleClick { x, y }
            } else {
                Action::Click { x, y }
            });
        }

        if let Some(c) = drag_pattern().captures(text) {
            return Ok(Action::Drag {
                x1: int(&c[1]),
                y1: int(&c[2]),
                x2: int(&c[3]),
                y2: int(&c[4]),
            });
        }

        if let Some(c) = scroll_pattern().captures(text) {
            return Ok(Action::Scroll { offset: int(&c[1]) });
        }

        if let Some(c) = hotkey_pattern().captures(text) {
            let keys: Vec<String> = c[1]
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
            if (2..=3).contains(&keys.len()) {
                return Ok(Action::Hotkey { keys });
            }
        }

        if let Some(c) = prefixed_pattern().captures(text) {
            let arg = c[2].trim().to_string();
            return Ok(if c[1].to_lowercase().starts_with("press") {
                Action::PressKey { key: arg }
            } else {
                Action::TypeText { content: arg }
            });
        }

        Ok(Action::Other {
            text: text.to_string(),
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click { x, y } => write!(f, "click ({x}, {y})"),
            Action::RightClick { x, y } => write!(f, "right click ({x}, {y})"),
            Action::DoubleClick { x, y } => write!(f, "double click ({x}, {y})"),
            Action::Drag { x1, y1, x2, y2 } => write!(f, "drag from ({x1}, {y1}) to ({x2}, {y2})"),
            Action::Scroll { offset } => write!(f, "scroll ({offset})"),
            Action::PressKey { key } => write!(f, "press key: {key}"),
            Action::Hotkey { keys } => write!(f, "hotkey ({})", keys.join(", ")),
            Action::TypeText { content } => write!(f, "type text: {content}"),
            Action::Wait => f.write_str("wait"),
            Action::Finish => f.write_str("finish"),
            Action::Fail => f.write_str("fail"),
            Action::Error { reason } => write!(f, "Error: {reason}"),
            Action::Other { text } => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Action {
        s.parse().unwrap()
    }

    #[test]
    fn test_point_actions() {
        assert_eq!(parse("click (100, 200)"), Action::Click { x: 100, y: 200 });
        assert_eq!(parse("Right Click (5,6)"), Action::RightClick { x: 5, y: 6 });
        assert_eq!(parse("double_click(7, 8)"), Action::DoubleClick { x: 7, y: 8 });
    }

    #[test]
    fn test_drag_scroll_hotkey() {
        assert_eq!(
            parse("drag from (1, 2) to (3, 4)"),
            Action::Drag { x1: 1, y1: 2, x2: 3, y2: 4 }
        );
        assert_eq!(parse("scroll (-300)"), Action::Scroll { offset: -300 });
        assert_eq!(
            parse("hotkey (ctrl, shift, t)"),
            Action::Hotkey { keys: vec!["ctrl".into(), "shift".into(), "t".into()] }
        );
        assert_eq!(parse("hotkey (ctrl)").kind(), ActionKind::Other);
    }

    #[test]
    fn test_text_actions_keep_case() {
        assert_eq!(parse("type text: Hello World"), Action::TypeText { content: "Hello World".into() });
        assert_eq!(parse("press key: Enter"), Action::PressKey { key: "Enter".into() });
    }

    #[test]
    fn test_terminal_and_sentinels() {
        assert_eq!(parse("Finish"), Action::Finish);
        assert_eq!(parse("fail"), Action::Fail);
        assert_eq!(parse("wait"), Action::Wait);
        assert_eq!(
            parse("Error: Model failed to follow format after retries."),
            Action::Error { reason: "Model failed to follow format after retries.".into() }
        );
        assert_eq!(parse("API Error: timeout").kind(), ActionKind::Error);
        assert_eq!(parse("CLICK \"Settings\"").kind(), ActionKind::Other);
    }

    #[test]
    fn test_display_is_canonical() {
        for text in [
            "click (10, 20)",
            "right click (1, 2)",
            "drag from (1, 2) to (3, 4)",
            "scroll (120)",
            "hotkey (ctrl, c)",
            "type text: abc",
            "finish",
        ] {
            assert_eq!(parse(text).to_string(), text);
        }
    }
}
