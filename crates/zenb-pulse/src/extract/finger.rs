//! Fingertip placement detection
//!
//! A fingertip pressed over a torch-lit lens turns the frame almost
//! uniformly red: red is bright and dominates green and blue. The detector
//! turns the ROI mean color into a presence confidence for
//! [`crate::PpgEngine::observe_presence`].

#[derive(Debug, Clone)]
pub struct FingerDetectorConfig {
    /// Red mean (0-255) needed for full brightness score
    pub min_red: f32,
    /// Red / max(green, blue) ratio needed for full dominance score
    pub min_red_ratio: f32,
    /// Confidence at or above which a finger counts as present
    pub presence_threshold: f32,
}

impl Default for FingerDetectorConfig {
    fn default() -> Self {
        Self {
            min_red: 90.0,
            min_red_ratio: 2.0,
            presence_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerStatus {
    pub confidence: f32,
    pub present: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FingerDetector {
    config: FingerDetectorConfig,
}

impl FingerDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FingerDetectorConfig) -> Self {
        Self { config }
    }

    /// Score an ROI mean color (0-255 per channel)
    pub fn detect(&self, rgb: [f32; 3]) -> FingerStatus {
        let [r, g, b] = rgb;
        if !(r.is_finite() && g.is_finite() && b.is_finite()) {
            return FingerStatus {
                confidence: 0.0,
                present: false,
            };
        }

        let brightness = (r / self.config.min_red.max(1.0)).clamp(0.0, 1.0);
        let ratio = r / g.max(b).max(1.0);
        let dominance = ((ratio - 1.0) / (self.config.min_red_ratio - 1.0).max(1e-3)).clamp(0.0, 1.0);

        let confidence = brightness * dominance;
        FingerStatus {
            confidence,
            present: confidence >= self.config.presence_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finger_over_torch() {
        let status = FingerDetector::new().detect([220.0, 40.0, 30.0]);
        assert!(status.present);
        assert!(status.confidence > 0.9);
    }

    #[test]
    fn test_open_scene() {
        // Grey-ish room
        let status = FingerDetector::new().detect([120.0, 115.0, 110.0]);
        assert!(!status.present);
        assert!(status.confidence < 0.1);
    }

    #[test]
    fn test_dark_frame() {
        // Red-tinted but too dark (torch off)
        let status = FingerDetector::new().detect([20.0, 2.0, 1.0]);
        assert!(!status.present);
    }

    #[test]
    fn test_non_finite() {
        let status = FingerDetector::new().detect([f32::NAN, 0.0, 0.0]);
        assert_eq!(status.confidence, 0.0);
    }
}
