/// Straight (non-premultiplied) RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    /// Opaque color from RGB components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Color from RGBA components.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb` or `#rrggbb` hex notation.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        match hex.len() {
            3 => {
                let nib = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
                let (r, g, b) = (nib(0)?, nib(1)?, nib(2)?);
                Some(Self::rgb(r * 17, g * 17, b * 17))
            }
            6 => {
                let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
                Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?))
            }
            _ => None,
        }
    }

    /// Copy with a new alpha in `[0,1]`.
    pub fn with_alpha(self, alpha: f64) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }

    /// Component-wise linear interpolation, `t` clamped to `[0,1]`.
    pub fn lerp(a: Self, b: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |x: u8, y: u8| (f64::from(x) + (f64::from(y) - f64::from(x)) * t).round() as u8;
        Self {
            r: mix(a.r, b.r),
            g: mix(a.g, b.g),
            b: mix(a.b, b.b),
            a: mix(a.a, b.a),
        }
    }

    /// Convert to HSL, hue in degrees, saturation/lightness in `[0,100]`.
    pub fn to_hsl(self) -> (f64, f64, f64) {
        let r = f64::from(self.r) / 255.0;
        let g = f64::from(self.g) / 255.0;
        let b = f64::from(self.b) / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        if max == min {
            return (0.0, 0.0, l * 100.0);
        }
        let d = max - min;
        let s = if l > 0.5 {
            d / (2.0 - max - min)
        } else {
            d / (max + min)
        };
        let h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        (h * 60.0, s * 100.0, l * 100.0)
    }

    /// Build from HSL, hue in degrees, saturation/lightness in `[0,100]`.
    pub fn from_hsl(h: f64, s: f64, l: f64) -> Self {
        let h = h.rem_euclid(360.0) / 360.0;
        let s = (s / 100.0).clamp(0.0, 1.0);
        let l = (l / 100.0).clamp(0.0, 1.0);
        if s == 0.0 {
            let v = (l * 255.0).round() as u8;
            return Self::rgb(v, v, v);
        }
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        let chan = |mut t: f64| {
            t = t.rem_euclid(1.0);
            let v = if t < 1.0 / 6.0 {
                p + (q - p) * 6.0 * t
            } else if t < 0.5 {
                q
            } else if t < 2.0 / 3.0 {
                p + (q - p) * (2.0 / 3.0 - t) * 6.0
            } else {
                p
            };
            (v * 255.0).round() as u8
        };
        Self::rgb(chan(h + 1.0 / 3.0), chan(h), chan(h - 1.0 / 3.0))
    }

    /// Premultiplied RGBA8 bytes for compositing.
    pub fn to_premul(self) -> [u8; 4] {
        let premul = |c: u8| -> u8 {
            let c = u16::from(c);
            let a = u16::from(self.a);
            (((c * a) + 127) / 255) as u8
        };
        [premul(self.r), premul(self.g), premul(self.b), self.a]
    }
}

/// Named five-color palettes available to scripts.
const PALETTES: &[(&str, [Color; 5])] = &[
    (
        "cyberpunk",
        [
            Color::rgb(0xff, 0x00, 0xff),
            Color::rgb(0x00, 0xff, 0xff),
            Color::rgb(0xff, 0xff, 0x00),
            Color::rgb(0x00, 0xff, 0x00),
            Color::rgb(0xff, 0x00, 0x00),
        ],
    ),
    (
        "retro",
        [
            Color::rgb(0xf0, 0x62, 0x92),
            Color::rgb(0xba, 0x68, 0xc8),
            Color::rgb(0x95, 0x75, 0xcd),
            Color::rgb(0x79, 0x86, 0xcb),
            Color::rgb(0x64, 0xb5, 0xf6),
        ],
    ),
    (
        "vintage",
        [
            Color::rgb(0xd4, 0xa3, 0x73),
            Color::rgb(0xfa, 0xed, 0xcd),
            Color::rgb(0xfe, 0xfa, 0xe0),
            Color::rgb(0xe9, 0xed, 0xc9),
            Color::rgb(0xcc, 0xd5, 0xae),
        ],
    ),
    (
        "noir",
        [
            Color::rgb(0x00, 0x00, 0x00),
            Color::rgb(0x33, 0x33, 0x33),
            Color::rgb(0x66, 0x66, 0x66),
            Color::rgb(0x99, 0x99, 0x99),
            Color::rgb(0xff, 0xff, 0xff),
        ],
    ),
    (
        "vibrant",
        [
            Color::rgb(0xf4, 0x43, 0x36),
            Color::rgb(0xe9, 0x1e, 0x63),
            Color::rgb(0x9c, 0x27, 0xb0),
            Color::rgb(0x67, 0x3a, 0xb7),
            Color::rgb(0x3f, 0x51, 0xb5),
        ],
    ),
];

/// Look up a palette color; unknown names fall back to `vibrant`, and the
/// index wraps around the palette length.
pub fn palette(name: &str, index: usize) -> Color {
    let lower = name.to_ascii_lowercase();
    let colors = PALETTES
        .iter()
        .find(|(n, _)| *n == lower)
        .map(|(_, c)| c)
        .unwrap_or(&PALETTES[4].1);
    colors[index % colors.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parse_short_and_long() {
        assert_eq!(Color::from_hex("#fff"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("#ff0000"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::from_hex("ff0000"), None);
        assert_eq!(Color::from_hex("#zzzzzz"), None);
    }

    #[test]
    fn lerp_endpoints() {
        let a = Color::rgb(0, 0, 0);
        let b = Color::rgb(255, 100, 10);
        assert_eq!(Color::lerp(a, b, 0.0), a);
        assert_eq!(Color::lerp(a, b, 1.0), b);
        assert_eq!(Color::lerp(a, b, 0.5).r, 128);
    }

    #[test]
    fn hsl_roundtrip_primaries() {
        for c in [
            Color::rgb(255, 0, 0),
            Color::rgb(0, 255, 0),
            Color::rgb(0, 0, 255),
            Color::rgb(128, 128, 128),
        ] {
            let (h, s, l) = c.to_hsl();
            let back = Color::from_hsl(h, s, l);
            assert!((i16::from(back.r) - i16::from(c.r)).abs() <= 1);
            assert!((i16::from(back.g) - i16::from(c.g)).abs() <= 1);
            assert!((i16::from(back.b) - i16::from(c.b)).abs() <= 1);
        }
    }

    #[test]
    fn palette_wraps_and_falls_back() {
        assert_eq!(palette("noir", 0), Color::BLACK);
        assert_eq!(palette("noir", 5), Color::BLACK);
        assert_eq!(palette("does-not-exist", 0), palette("vibrant", 0));
    }

    #[test]
    fn premul_scales_by_alpha() {
        let c = Color::rgba(255, 128, 0, 128);
        let p = c.to_premul();
        assert_eq!(p, [128, 64, 0, 128]);
    }
}
