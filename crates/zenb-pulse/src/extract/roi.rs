//! ROI color extraction
//!
//! Turns a raw RGB888 frame plus a caller-chosen rectangle into one
//! normalized channel sample per frame.

use crate::sample::{FrameObservation, Sample};

/// Rectangular region of interest in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Centred rectangle covering `fraction` of each frame dimension
    pub fn centered(frame_width: u32, frame_height: u32, fraction: f32) -> Self {
        let fraction = fraction.clamp(0.0, 1.0);
        let width = (frame_width as f32 * fraction) as u32;
        let height = (frame_height as f32 * fraction) as u32;
        Self {
            x: (frame_width - width) / 2,
            y: (frame_height - height) / 2,
            width,
            height,
        }
    }
}

/// Mean [R, G, B] (0-255) over the ROI of an RGB888 frame.
///
/// Pixels outside the frame are skipped. Returns `None` if no pixel of the
/// ROI lies inside the frame.
pub fn extract_roi_mean_rgb(frame: &[u8], width: u32, height: u32, roi: Roi) -> Option<[f32; 3]> {
    let x_end = roi.x.saturating_add(roi.width).min(width);
    let y_end = roi.y.saturating_add(roi.height).min(height);
    if roi.x >= x_end || roi.y >= y_end {
        return None;
    }

    let stride = width as usize * 3;
    let mut sum = [0u64; 3];
    let mut count = 0u64;

    for row in roi.y..y_end {
        let row_start = row as usize * stride;
        for col in roi.x..x_end {
            let idx = row_start + col as usize * 3;
            if idx + 2 >= frame.len() {
                break;
            }
            sum[0] += frame[idx] as u64;
            sum[1] += frame[idx + 1] as u64;
            sum[2] += frame[idx + 2] as u64;
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }
    let inv = 1.0 / count as f64;
    Some([
        (sum[0] as f64 * inv) as f32,
        (sum[1] as f64 * inv) as f32,
        (sum[2] as f64 * inv) as f32,
    ])
}

/// Color channel carrying the pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChannel {
    /// Fingertip over a torch-lit lens
    Red,
    /// Face video under ambient light
    Green,
    Blue,
}

impl ColorChannel {
    fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
        }
    }
}

/// Produces one `FrameObservation` per frame from a fixed channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorSampleExtractor {
    pub channel: ColorChannel,
}

impl ColorSampleExtractor {
    pub fn new(channel: ColorChannel) -> Self {
        Self { channel }
    }

    /// Observation from an already-averaged ROI color
    pub fn from_mean_rgb(&self, rgb: [f32; 3], timestamp_us: i64) -> FrameObservation {
        FrameObservation::Sample(Sample::from_byte(timestamp_us, rgb[self.channel.index()]))
    }

    /// Observation from a raw RGB888 frame; a dropout when the ROI is empty
    pub fn extract(
        &self,
        frame: &[u8],
        width: u32,
        height: u32,
        roi: Roi,
        timestamp_us: i64,
    ) -> FrameObservation {
        match extract_roi_mean_rgb(frame, width, height, roi) {
            Some(rgb) => self.from_mean_rgb(rgb, timestamp_us),
            None => FrameObservation::Dropout { timestamp_us },
        }
    }
}

impl Default for ColorSampleExtractor {
    fn default() -> Self {
        Self::new(ColorChannel::Red)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uniform_frame(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
        (0..w * h).flat_map(|_| rgb).collect()
    }

    #[test]
    fn test_extract_roi_mean_rgb() {
        let frame = uniform_frame(4, 4, [128, 64, 32]);
        let rgb = extract_roi_mean_rgb(&frame, 4, 4, Roi::new(0, 0, 2, 2)).unwrap();
        assert_relative_eq!(rgb[0], 128.0, epsilon = 0.01);
        assert_relative_eq!(rgb[1], 64.0, epsilon = 0.01);
        assert_relative_eq!(rgb[2], 32.0, epsilon = 0.01);
    }

    #[test]
    fn test_roi_clipped_to_frame() {
        // Left half red 200, right half red 100; ROI hangs off the right edge
        let mut frame = Vec::new();
        for _row in 0..2 {
            frame.extend_from_slice(&[200, 0, 0, 200, 0, 0, 100, 0, 0, 100, 0, 0]);
        }
        let rgb = extract_roi_mean_rgb(&frame, 4, 2, Roi::new(2, 0, 10, 10)).unwrap();
        assert_relative_eq!(rgb[0], 100.0, epsilon = 0.01);

        assert!(extract_roi_mean_rgb(&frame, 4, 2, Roi::new(5, 0, 2, 2)).is_none());
    }

    #[test]
    fn test_centered_roi() {
        let roi = Roi::centered(640, 480, 0.5);
        assert_eq!(roi, Roi::new(160, 120, 320, 240));
    }

    #[test]
    fn test_extractor_channel() {
        let frame = uniform_frame(8, 8, [255, 51, 0]);
        let green = ColorSampleExtractor::new(ColorChannel::Green);
        match green.extract(&frame, 8, 8, Roi::new(0, 0, 8, 8), 42) {
            FrameObservation::Sample(s) => {
                assert_eq!(s.timestamp_us, 42);
                assert_relative_eq!(s.value, 0.2, epsilon = 1e-5);
            }
            other => panic!("expected sample, got {:?}", other),
        }

        let red = ColorSampleExtractor::default();
        assert_eq!(
            red.extract(&frame, 8, 8, Roi::new(100, 100, 4, 4), 7),
            FrameObservation::Dropout { timestamp_us: 7 }
        );
    }
}
