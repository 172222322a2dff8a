use serde::{Deserialize, Serialize};

/// Pixel size of a screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Assumed screen size before any screenshot has been decoded.
    pub const DEFAULT: Dimensions = Dimensions {
        width: 1280,
        height: 720,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Convert a normalized position in [0,1]×[0,1] into absolute pixel coordinates.
    pub fn to_absolute(&self, norm_x: f64, norm_y: f64) -> (i64, i64) {
        let x = (norm_x * self.width as f64).round() as i64;
        let y = (norm_y * self.height as f64).round() as i64;
        (x, y)
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_absolute_rounds() {
        let dims = Dimensions::DEFAULT;
        assert_eq!(dims.to_absolute(0.5, 0.5), (640, 360));
        // 0.4321 * 1280 = 553.088, 0.1234 * 720 = 88.848
        assert_eq!(dims.to_absolute(0.4321, 0.1234), (553, 89));
        assert_eq!(dims.to_absolute(1.0, 0.0), (1280, 0));
    }
}
