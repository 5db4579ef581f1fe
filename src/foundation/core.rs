use crate::foundation::color::Color;
use crate::foundation::error::{CineError, CineResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// How the surface is cleared at the start of a frame.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    /// Leave the surface fully transparent.
    Transparent,
    /// Fill with a solid color.
    Color(Color),
}

impl Default for Background {
    fn default() -> Self {
        Self::Color(Color::BLACK)
    }
}

/// Frame-level configuration, immutable within a frame.
///
/// A host may swap the config between frames (resolution change, fps change);
/// the runtime resizes its surface accordingly.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Frames per second used for time/frame mapping.
    pub fps: f64,
    /// Project duration in seconds.
    pub duration: f64,
    /// Background applied before any script draws.
    pub background: Background,
}

impl RuntimeConfig {
    /// Build a validated config.
    pub fn new(width: u32, height: u32, fps: f64, duration: f64) -> CineResult<Self> {
        let cfg = Self {
            width,
            height,
            fps,
            duration,
            background: Background::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the config invariants the runtime relies on.
    pub fn validate(&self) -> CineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CineError::validation("config width/height must be > 0"));
        }
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(CineError::validation("config fps must be finite and > 0"));
        }
        if !(self.duration.is_finite() && self.duration >= 0.0) {
            return Err(CineError::validation(
                "config duration must be finite and >= 0",
            ));
        }
        Ok(())
    }

    /// Frame index containing media time `secs`.
    pub fn frame_at(&self, secs: f64) -> u64 {
        (secs * self.fps).floor().max(0.0) as u64
    }
}

/// Pointer state in surface coordinates, supplied by the driver each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointerState {
    /// X position in surface pixels.
    pub x: f64,
    /// Y position in surface pixels.
    pub y: f64,
    /// Whether the primary button is held.
    pub down: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_degenerate_values() {
        assert!(RuntimeConfig::new(0, 100, 30.0, 5.0).is_err());
        assert!(RuntimeConfig::new(100, 100, 0.0, 5.0).is_err());
        assert!(RuntimeConfig::new(100, 100, 30.0, -1.0).is_err());
        assert!(RuntimeConfig::new(100, 100, 30.0, 5.0).is_ok());
    }

    #[test]
    fn frame_at_floors() {
        let cfg = RuntimeConfig::new(100, 100, 30.0, 10.0).unwrap();
        assert_eq!(cfg.frame_at(0.0), 0);
        assert_eq!(cfg.frame_at(0.99 / 30.0), 0);
        assert_eq!(cfg.frame_at(1.0 / 30.0), 1);
        assert_eq!(cfg.frame_at(-0.5), 0);
    }
}
