use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub instruction: String,
    pub action: String,
}

/// Bounded, ordered record of past (instruction, action) pairs.
///
/// The predictor never keeps this itself; callers that want the model to see
/// earlier steps own a history and pass it to `predict_with_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionHistory {
    cutoff: usize,
    entries: VecDeque<HistoryEntry>,
}

impl ActionHistory {
    pub fn new(cutoff: usize) -> Self {
        Self {
            cutoff,
            entries: VecDeque::with_capacity(cutoff),
        }
    }

    /// Append a step, dropping the oldest entry once the cutoff is reached.
    pub fn push(&mut self, instruction: impl Into<String>, action: impl Into<String>) {
        if self.cutoff == 0 {
            return;
        }
        if self.entries.len() == self.cutoff {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            instruction: instruction.into(),
            action: action.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Prompt block listing previous actions, oldest first.
    pub fn render(&self) -> String {
        let mut out = String::from("Previous actions (oldest first):");
        for (i, entry) in self.iter().enumerate() {
            out.push_str(&format!("\n{}. {}", i + 1, entry.action));
        }
        out
    }
}

impl Default for ActionHistory {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_respects_cutoff() {
        let mut history = ActionHistory::new(2);
        history.push("a", "click (1, 1)");
        history.push("b", "click (2, 2)");
        history.push("c", "finish");
        let actions: Vec<&str> = history.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["click (2, 2)", "finish"]);
    }

    #[test]
    fn test_zero_cutoff_keeps_nothing() {
        let mut history = ActionHistory::new(0);
        history.push("a", "wait");
        assert!(history.is_empty());
    }

    #[test]
    fn test_render() {
        let mut history = ActionHistory::default();
        history.push("a", "click (1, 1)");
        history.push("b", "wait");
        assert_eq!(history.render(), "Previous actions (oldest first):\n1. click (1, 1)\n2. wait");
    }
}
