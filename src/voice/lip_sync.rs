//! Amplitude-driven lip sync
//!
//! Maps the loudness of the audio currently playing to a single mouth
//! openness value. The renderer calls [`LipSync::update`] once per frame.

/// Default maximum mouth opening
pub const DEFAULT_MAX_OPEN: f32 = 10.0;

/// Converts an output sample window to mouth openness
#[derive(Debug, Clone, Copy)]
pub struct LipSync {
    max_open: f32,
}

impl Default for LipSync {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OPEN)
    }
}

impl LipSync {
    /// Create a driver with the given maximum opening
    #[must_use]
    pub fn new(max_open: f32) -> Self {
        Self {
            max_open: max_open.max(0.0),
        }
    }

    /// Mouth openness in `[0, max_open]` for a window of output samples
    #[must_use]
    pub fn update(&self, window: &[f32]) -> f32 {
        (average_volume(window) * self.max_open).clamp(0.0, self.max_open)
    }

    /// Configured maximum opening
    #[must_use]
    pub const fn max_open(&self) -> f32 {
        self.max_open
    }
}

/// Mean absolute amplitude
#[allow(clippy::cast_precision_loss)]
fn average_volume(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_closes_mouth() {
        let lip = LipSync::new(30.0);
        assert!(lip.update(&[0.0; 256]) < f32::EPSILON);
        assert!(lip.update(&[]) < f32::EPSILON);
    }

    #[test]
    fn test_openness_scales_with_volume() {
        let lip = LipSync::new(10.0);
        let quiet = lip.update(&[0.1, -0.1, 0.1, -0.1]);
        let loud = lip.update(&[0.5, -0.5, 0.5, -0.5]);

        assert!((quiet - 1.0).abs() < 1e-5);
        assert!((loud - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_openness_clamped() {
        let lip = LipSync::new(10.0);
        assert!((lip.update(&[4.0, -4.0]) - 10.0).abs() < f32::EPSILON);
    }
}
