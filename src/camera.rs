//! Persisted 2D camera.
//!
//! The frame context snapshots this state when it is built; transforms and
//! projections within a frame use the snapshot, while `follow` writes into
//! the persisted copy so the motion lands on the next frame.

use kurbo::Affine;

use crate::rand::Noise;

/// Camera position, zoom and roll. Persisted across frames.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CameraState {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
    pub rotation: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            rotation: 0.0,
        }
    }
}

impl CameraState {
    /// World-to-screen transform around the viewport center:
    /// translate(center) · scale(zoom) · rotate(rotation) · translate(-pos).
    pub fn to_affine(&self, center_x: f64, center_y: f64) -> Affine {
        Affine::translate((center_x, center_y))
            * Affine::scale(self.zoom)
            * Affine::rotate(self.rotation)
            * Affine::translate((-self.x, -self.y))
    }

    /// Exponentially ease the camera toward `(tx, ty)`.
    pub fn follow(&mut self, tx: f64, ty: f64, damping: f64) {
        self.x += (tx - self.x) * damping;
        self.y += (ty - self.y) * damping;
    }

    /// Screen point to world coordinates. Rotation is ignored, matching the
    /// projection scripts actually use for picking.
    pub fn screen_to_world(&self, sx: f64, sy: f64, center_x: f64, center_y: f64) -> (f64, f64) {
        (
            (sx - center_x) / self.zoom + self.x,
            (sy - center_y) / self.zoom + self.y,
        )
    }

    /// World point to screen coordinates. Inverse of [`Self::screen_to_world`].
    pub fn world_to_screen(&self, wx: f64, wy: f64, center_x: f64, center_y: f64) -> (f64, f64) {
        (
            (wx - self.x) * self.zoom + center_x,
            (wy - self.y) * self.zoom + center_y,
        )
    }
}

/// One-frame shake offset: two decorrelated noise samples along the time
/// axis, centered and scaled by `intensity`.
pub fn shake_offset(noise: &Noise, time: f64, intensity: f64) -> (f64, f64) {
    let sx = (noise.sample(time * 20.0, 0.0, 0.0) - 0.5) * intensity;
    let sy = (noise.sample(0.0, time * 20.0, 0.0) - 0.5) * intensity;
    (sx, sy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::Rand;

    #[test]
    fn default_is_identity_at_origin_center() {
        let cam = CameraState::default();
        let affine = cam.to_affine(0.0, 0.0);
        let p = affine * kurbo::Point::new(3.0, 4.0);
        assert!((p.x - 3.0).abs() < 1e-12);
        assert!((p.y - 4.0).abs() < 1e-12);
    }

    #[test]
    fn affine_matches_projection_without_rotation() {
        let cam = CameraState {
            x: 10.0,
            y: 20.0,
            zoom: 2.0,
            rotation: 0.0,
        };
        let affine = cam.to_affine(960.0, 540.0);
        let p = affine * kurbo::Point::new(15.0, 25.0);
        let (sx, sy) = cam.world_to_screen(15.0, 25.0, 960.0, 540.0);
        assert!((p.x - sx).abs() < 1e-9);
        assert!((p.y - sy).abs() < 1e-9);
    }

    #[test]
    fn projections_invert_each_other() {
        let cam = CameraState {
            x: -40.0,
            y: 8.0,
            zoom: 1.5,
            rotation: 0.3,
        };
        let (wx, wy) = cam.screen_to_world(100.0, 200.0, 960.0, 540.0);
        let (sx, sy) = cam.world_to_screen(wx, wy, 960.0, 540.0);
        assert!((sx - 100.0).abs() < 1e-9);
        assert!((sy - 200.0).abs() < 1e-9);
    }

    #[test]
    fn follow_converges() {
        let mut cam = CameraState::default();
        for _ in 0..200 {
            cam.follow(50.0, -30.0, 0.1);
        }
        assert!((cam.x - 50.0).abs() < 1e-3);
        assert!((cam.y + 30.0).abs() < 1e-3);
    }

    #[test]
    fn shake_scales_with_intensity() {
        let mut r = Rand::new(12345);
        let noise = Noise::new(&mut r);
        let (ax, ay) = shake_offset(&noise, 1.0, 1.0);
        let (bx, by) = shake_offset(&noise, 1.0, 10.0);
        assert!((bx - ax * 10.0).abs() < 1e-9);
        assert!((by - ay * 10.0).abs() < 1e-9);
    }
}
