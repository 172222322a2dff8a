//! Fuzzy comparison of a predicted action against the recorded ground truth.
//!
//! Model output differs from the recorded trace in letter case, punctuation and a
//! few pixels of click position, so plain string equality undercounts. Three
//! checks run in order: terminal `finish`, coordinate distance for same-typed
//! actions, then alphanumeric-only equality.

use std::sync::OnceLock;

use regex::Regex;

/// Allowed Euclidean distance per coordinate pair.
pub const DEFAULT_POINT_THRESHOLD: f64 = 50.0;

fn number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number regex"))
}

fn non_alnum_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]").expect("valid cleanup regex"))
}

#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    point_threshold: f64,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            point_threshold: DEFAULT_POINT_THRESHOLD,
        }
    }
}

impl Matcher {
    pub fn new(point_threshold: f64) -> Self {
        Self { point_threshold }
    }

    pub fn is_match(&self, predicted: &str, ground_truth: &str) -> bool {
        if predicted.trim().is_empty() || ground_truth.trim().is_empty() {
            return false;
        }

        let pred = predicted.trim().to_lowercase();
        let gt = ground_truth.trim().to_lowercase();

        if gt.contains("finish") {
            return pred.contains("finish");
        }

        if self.coordinates_match(&pred, &gt) == Some(true) {
            return true;
        }

        let pattern = non_alnum_pattern();
        pattern.replace_all(&pred, "") == pattern.replace_all(&gt, "")
    }

    /// `None` when the coordinate check does not apply to this pair.
    fn coordinates_match(&self, pred: &str, gt: &str) -> Option<bool> {
        let pred_nums = numbers(pred)?;
        let gt_nums = numbers(gt)?;
        if pred_nums.is_empty() || pred_nums.len() != gt_nums.len() || pred_nums.len() % 2 != 0 {
            return None;
        }
        if pred.split_whitespace().next() != gt.split_whitespace().next() {
            return None;
        }

        let total: f64 = pred_nums
            .chunks_exact(2)
            .zip(gt_nums.chunks_exact(2))
            .map(|(p, g)| ((p[0] - g[0]).powi(2) + (p[1] - g[1]).powi(2)).sqrt())
            .sum();
        let pairs = (pred_nums.len() / 2) as f64;
        Some(total < self.point_threshold * pairs)
    }
}

/// All numeric tokens in order; `None` if any fails to convert.
fn numbers(s: &str) -> Option<Vec<f64>> {
    number_pattern()
        .find_iter(s)
        .map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

/// [`Matcher::is_match`] with the default threshold.
pub fn is_match(predicted: &str, ground_truth: &str) -> bool {
    Matcher::default().is_match(predicted, ground_truth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_click_matches() {
        assert!(is_match("click (100,100)", "click (120,110)"));
    }

    #[test]
    fn test_distant_click_does_not_match() {
        assert!(!is_match("click (100,100)", "click (400,400)"));
    }

    #[test]
    fn test_finish_ignores_everything_else() {
        assert!(is_match("Finish", "task finished, Finish"));
        assert!(is_match("finish (10, 10)", "FINISH"));
        assert!(!is_match("click (1, 1)", "finish"));
    }

    #[test]
    fn test_alphanumeric_fallback() {
        assert!(is_match("type text: Hello!", "type text: hello"));
        assert!(is_match("press key: Enter", "press key:enter"));
        assert!(!is_match("type text: hello", "type text: world"));
    }

    #[test]
    fn test_empty_inputs_never_match() {
        assert!(!is_match("", "click (1, 1)"));
        assert!(!is_match("click (1, 1)", "   "));
        assert!(!is_match("", ""));
    }

    #[test]
    fn test_action_type_must_agree() {
        assert!(!is_match("right click (100, 100)", "click (100, 100)"));
        assert!(!is_match("double click (100, 100)", "click (101, 100)"));
    }

    #[test]
    fn test_drag_threshold_scales_with_point_count() {
        // distances 40 and 40: total 80 < 100
        assert!(is_match("drag from (0, 0) to (100, 100)", "drag from (40, 0) to (100, 140)"));
        // distances 0 and 120: total 120 >= 100
        assert!(!is_match("drag from (0, 0) to (100, 100)", "drag from (0, 0) to (220, 100)"));
    }

    #[test]
    fn test_decimal_and_negative_tokens() {
        assert!(is_match("scroll (-300, 0)", "scroll (-310.5, 0)"));
    }

    #[test]
    fn test_odd_token_count_falls_back_to_text() {
        assert!(!is_match("scroll (-300)", "scroll (-310)"));
        assert!(is_match("scroll (-300)", "Scroll(-300)"));
    }

    #[test]
    fn test_mismatched_token_counts_fall_back_to_text() {
        assert!(!is_match("click (10, 10)", "click (10, 10, 3, 4)"));
    }

    #[test]
    fn test_custom_threshold() {
        let strict = Matcher::new(5.0);
        assert!(!strict.is_match("click (100,100)", "click (120,110)"));
        assert!(strict.is_match("click (100,100)", "click (102,103)"));
    }
}
