//! Particles and screen-space post filters.
//!
//! Particles persist in [`crate::runtime::RuntimeState`] and are advanced and
//! drawn exactly once per frame, at the start of the scheduler pass and
//! before any script draws. The filters operate on the
//! flushed premultiplied pixel buffer; every random decision draws from the
//! frame's seeded PRNG so output stays reproducible.

use crate::{
    foundation::{color::Color, error::{CineError, CineResult}},
    rand::Rand,
    surface::{ShapeOptions, Surface},
};

/// Emitter flavor selecting spawn parameter ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticleKind {
    Spark,
    Fire,
    Snow,
    Bubbles,
}

/// One live particle.
#[derive(Clone, Copy, Debug)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub life: f64,
    pub max_life: f64,
    pub size: f64,
    pub color: Color,
}

/// Spawn `count` particles at `(x, y)`. Parameter ranges per kind match the
/// emitter presets scripts rely on; every draw comes from `rand` in a fixed
/// order so identical seeds spawn identical particles.
pub fn emit(
    particles: &mut Vec<Particle>,
    rand: &mut Rand,
    x: f64,
    y: f64,
    kind: ParticleKind,
    count: usize,
) {
    for _ in 0..count {
        let angle = rand.next() * std::f64::consts::TAU;
        let mut speed = rand.next() * 2.0;
        let mut life = 1.0;
        let mut size = 2.0 + rand.next() * 4.0;
        let mut color = Color::WHITE;

        match kind {
            ParticleKind::Spark => {}
            ParticleKind::Fire => {
                color = Color::rgb(255, (rand.next() * 100.0).floor() as u8, 0);
                speed = 1.0 + rand.next() * 3.0;
                life = 0.5 + rand.next() * 0.5;
                size = 5.0 + rand.next() * 10.0;
            }
            ParticleKind::Snow => {
                speed = 0.5 + rand.next();
                size = 2.0 + rand.next() * 3.0;
                life = 2.0 + rand.next() * 2.0;
            }
            ParticleKind::Bubbles => {
                color = Color::WHITE.with_alpha(0.4);
                speed = 0.2 + rand.next() * 0.5;
                size = 5.0 + rand.next() * 15.0;
                life = 2.0 + rand.next();
            }
        }

        particles.push(Particle {
            x,
            y,
            vx: angle.cos() * speed,
            vy: angle.sin() * speed,
            life,
            max_life: life,
            size,
            color,
        });
    }
}

/// Advance every particle one frame, draw it, and drop the dead ones.
pub fn step_and_draw(particles: &mut Vec<Particle>, delta_time: f64, surface: &mut Surface) {
    particles.retain_mut(|p| {
        p.life -= delta_time / p.max_life;
        p.x += p.vx;
        p.y += p.vy;
        surface.with_save(|s| {
            s.mul_alpha(p.life.max(0.0).min(1.0));
            s.circle(p.x, p.y, p.size, &ShapeOptions::filled(p.color));
        });
        p.life > 0.0
    });
}

// --- screen-space filters ---

/// Darken toward the edges. The gradient runs from half the short dimension
/// (fully transparent) out to the long dimension, reaching `color` at the
/// stop `1 - (1 - intensity) * 0.5`.
pub fn vignette(surface: &mut Surface, intensity: f64, color: Color) {
    let w = surface.width();
    let h = surface.height();
    let cx = f64::from(w) / 2.0;
    let cy = f64::from(h) / 2.0;
    let min_dim = f64::from(w.min(h));
    let max_dim = f64::from(w.max(h));
    let r0 = min_dim * 0.5;
    let stop = (1.0 - (1.0 - intensity) * 0.5).max(1e-6);
    let src = color.to_premul();

    let pixels = surface.pixels_mut();
    for y in 0..h {
        for x in 0..w {
            let dx = f64::from(x) + 0.5 - cx;
            let dy = f64::from(y) + 0.5 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            let t = ((d - r0) / (max_dim - r0)).clamp(0.0, 1.0);
            let f = (t / stop).min(1.0);
            if f <= 0.0 {
                continue;
            }
            let scaled = [
                (f64::from(src[0]) * f) as u8,
                (f64::from(src[1]) * f) as u8,
                (f64::from(src[2]) * f) as u8,
                (f64::from(src[3]) * f) as u8,
            ];
            let idx = ((y * w + x) * 4) as usize;
            over(&mut pixels[idx..idx + 4], scaled);
        }
    }
}

/// Additive glow: blur a copy of the frame, brighten it by
/// `1 + intensity * 0.2`, and add it back scaled by `min(intensity, 0.8)`.
pub fn bloom(surface: &mut Surface, intensity: f64, radius: u32) -> CineResult<()> {
    if intensity <= 0.0 {
        return Ok(());
    }
    let w = surface.width();
    let h = surface.height();
    let src = surface.pixels().to_vec();
    let sigma = (radius as f32 / 2.0).max(0.5);
    let blurred = blur_rgba8_premul(&src, w, h, radius, sigma)?;

    let brightness = 1.0 + intensity * 0.2;
    let amount = intensity.min(0.8);
    let pixels = surface.pixels_mut();
    for (dst, glow) in pixels.chunks_exact_mut(4).zip(blurred.chunks_exact(4)) {
        for c in 0..3 {
            let add = f64::from(glow[c]) * brightness * amount;
            dst[c] = (f64::from(dst[c]) + add).min(255.0) as u8;
        }
        let add_a = f64::from(glow[3]) * amount;
        dst[3] = (f64::from(dst[3]) + add_a).min(255.0) as u8;
    }
    Ok(())
}

/// Film grain: soft overlay blobs plus a fine 4px block layer, all driven by
/// the frame PRNG.
pub fn grain(surface: &mut Surface, rand: &mut Rand, intensity: f64) {
    if intensity <= 0.0 {
        return;
    }
    let amount = intensity * 0.1;
    let w = surface.width();
    let h = surface.height();

    // Large soft blobs.
    for _ in 0..20 {
        let x = (rand.next() * f64::from(w)) as i64;
        let y = (rand.next() * f64::from(h)) as i64;
        let bw = (rand.next() * 200.0 + 50.0) as i64;
        let bh = (rand.next() * 200.0 + 50.0) as i64;
        let white = rand.next() > 0.5;
        overlay_block(surface, x, y, bw, bh, white, amount);
    }

    // Fine grain blocks on a 16px lattice.
    let mut y = 0i64;
    while y < i64::from(h) {
        let mut x = 0i64;
        while x < i64::from(w) {
            if rand.next() < 0.2 {
                let white = rand.next() > 0.5;
                overlay_block(surface, x, y, 4, 4, white, amount * 0.5);
            }
            x += 16;
        }
        y += 16;
    }
}

/// Horizontal channel splitting: screen-blend two half-strength copies of the
/// frame shifted by `±intensity * 5` pixels.
pub fn chromatic(surface: &mut Surface, intensity: f64) {
    if intensity <= 0.0 {
        return;
    }
    let off = (intensity * 5.0).round() as i64;
    if off == 0 {
        return;
    }
    let w = surface.width() as i64;
    let h = surface.height() as i64;
    let src = surface.pixels().to_vec();
    let pixels = surface.pixels_mut();

    for &shift in &[-off, off] {
        for y in 0..h {
            for x in 0..w {
                let sx = x - shift;
                if sx < 0 || sx >= w {
                    continue;
                }
                let di = ((y * w + x) * 4) as usize;
                let si = ((y * w + sx) * 4) as usize;
                for c in 0..4 {
                    let d = u32::from(pixels[di + c]);
                    let s = u32::from(src[si + c]) / 2;
                    // Screen blend: d + s - d*s/255.
                    pixels[di + c] = (d + s - d * s / 255).min(255) as u8;
                }
            }
        }
    }
}

/// Scanlines: 2px dark rows every 6px, opacity `intensity * 0.3`.
pub fn crt(surface: &mut Surface, intensity: f64) {
    let w = surface.width();
    let h = surface.height();
    let src = Color::rgb(10, 10, 10)
        .with_alpha((intensity * 0.3).clamp(0.0, 1.0))
        .to_premul();
    let pixels = surface.pixels_mut();
    let mut row = 0u32;
    while row < h {
        for y in row..(row + 2).min(h) {
            for x in 0..w {
                let idx = ((y * w + x) * 4) as usize;
                over(&mut pixels[idx..idx + 4], src);
            }
        }
        row += 6;
    }
}

fn overlay_block(
    surface: &mut Surface,
    x: i64,
    y: i64,
    bw: i64,
    bh: i64,
    white: bool,
    amount: f64,
) {
    let w = surface.width() as i64;
    let h = surface.height() as i64;
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + bw).min(w);
    let y1 = (y + bh).min(h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }
    let blend = if white { 255.0 } else { 0.0 };
    let pixels = surface.pixels_mut();
    for yy in y0..y1 {
        for xx in x0..x1 {
            let idx = ((yy * w + xx) * 4) as usize;
            for c in 0..3 {
                let base = f64::from(pixels[idx + c]);
                let overlaid = if base < 128.0 {
                    2.0 * base * blend / 255.0
                } else {
                    255.0 - 2.0 * (255.0 - base) * (255.0 - blend) / 255.0
                };
                pixels[idx + c] = (base + (overlaid - base) * amount).clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn over(dst: &mut [u8], src: [u8; 4]) {
    let inv = 255 - u32::from(src[3]);
    for c in 0..4 {
        let d = u32::from(dst[c]);
        dst[c] = (u32::from(src[c]) + (d * inv + 127) / 255).min(255) as u8;
    }
}

/// Separable gaussian blur over premultiplied RGBA8, fixed-point Q16 weights.
pub fn blur_rgba8_premul(
    src: &[u8],
    width: u32,
    height: u32,
    radius: u32,
    sigma: f32,
) -> CineResult<Vec<u8>> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| CineError::validation("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(CineError::validation(
            "blur_rgba8_premul expects src matching width*height*4",
        ));
    }
    if radius == 0 {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = vec![0u8; expected_len];

    blur_pass(src, &mut tmp, width, height, &kernel, true);
    blur_pass(&tmp, &mut out, width, height, &kernel, false);
    Ok(out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> CineResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(CineError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let mut weights_f = Vec::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }

    let mut weights = Vec::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = (((wf / sum) * 65536.0).round() as i64).clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Push any rounding residue into the center tap so the kernel sums to one.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    Ok(weights)
}

fn blur_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32], horizontal: bool) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let d = ki as i32 - radius;
                let (sx, sy) = if horizontal {
                    ((x + d).clamp(0, w - 1), y)
                } else {
                    (x, (y + d).clamp(0, h - 1))
                };
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = ((acc[c] + (1 << 15)) >> 16).min(255) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Background;

    #[test]
    fn emit_is_deterministic_per_seed() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        let mut ra = Rand::new(42);
        let mut rb = Rand::new(42);
        emit(&mut a, &mut ra, 10.0, 20.0, ParticleKind::Fire, 5);
        emit(&mut b, &mut rb, 10.0, 20.0, ParticleKind::Fire, 5);
        assert_eq!(a.len(), 5);
        for (pa, pb) in a.iter().zip(&b) {
            assert_eq!(pa.vx, pb.vx);
            assert_eq!(pa.size, pb.size);
            assert_eq!(pa.color, pb.color);
        }
    }

    #[test]
    fn kinds_respect_parameter_ranges() {
        let mut rand = Rand::new(7);
        let mut particles = Vec::new();
        emit(&mut particles, &mut rand, 0.0, 0.0, ParticleKind::Snow, 50);
        for p in &particles {
            assert!(p.size >= 2.0 && p.size <= 5.0);
            assert!(p.life >= 2.0 && p.life <= 4.0);
            assert_eq!(p.color, Color::WHITE);
        }
    }

    #[test]
    fn dead_particles_are_removed() {
        let mut surface = Surface::new(32, 32).unwrap();
        surface.begin_frame(Background::Transparent);
        let mut particles = vec![Particle {
            x: 16.0,
            y: 16.0,
            vx: 0.0,
            vy: 0.0,
            life: 0.05,
            max_life: 1.0,
            size: 3.0,
            color: Color::WHITE,
        }];
        step_and_draw(&mut particles, 0.1, &mut surface);
        assert!(particles.is_empty());
    }

    #[test]
    fn blur_preserves_flat_regions() {
        let src = vec![100u8; 8 * 8 * 4];
        let out = blur_rgba8_premul(&src, 8, 8, 2, 1.0).unwrap();
        for &v in &out {
            assert!((i16::from(v) - 100).abs() <= 1);
        }
    }

    #[test]
    fn blur_rejects_bad_input() {
        assert!(blur_rgba8_premul(&[0u8; 10], 8, 8, 2, 1.0).is_err());
        assert!(blur_rgba8_premul(&[0u8; 8 * 8 * 4], 8, 8, 2, 0.0).is_err());
    }

    #[test]
    fn vignette_darkens_corners_not_center() {
        let mut s = Surface::new(64, 64).unwrap();
        s.begin_frame(Background::Color(Color::WHITE));
        vignette(&mut s, 1.0, Color::BLACK);
        let corner = s.get_pixel(0, 0);
        let center = s.get_pixel(32, 32);
        assert!(corner.r < center.r);
        assert_eq!(center, Color::WHITE);
    }

    #[test]
    fn crt_draws_dark_rows() {
        let mut s = Surface::new(16, 16).unwrap();
        s.begin_frame(Background::Color(Color::WHITE));
        crt(&mut s, 1.0);
        let on_line = s.get_pixel(8, 0);
        let off_line = s.get_pixel(8, 3);
        assert!(on_line.r < off_line.r);
        assert_eq!(off_line, Color::WHITE);
    }

    #[test]
    fn grain_is_reproducible() {
        let paint = |seed: u32| {
            let mut s = Surface::new(32, 32).unwrap();
            s.begin_frame(Background::Color(Color::rgb(120, 120, 120)));
            let mut rand = Rand::new(seed);
            grain(&mut s, &mut rand, 1.0);
            s.pixels().to_vec()
        };
        assert_eq!(paint(5), paint(5));
    }
}
