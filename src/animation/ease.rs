use std::f64::consts::PI;

/// Named easing curves, `t` in `[0,1]` mapped to a progress value.
///
/// `apply` evaluates the standard closed-form definition for each family and
/// does not clamp out-of-range inputs; callers clamp when they need to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Ease {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
    InQuart,
    OutQuart,
    InOutQuart,
    InQuint,
    OutQuint,
    InOutQuint,
    InSine,
    OutSine,
    InOutSine,
    InExpo,
    OutExpo,
    InOutExpo,
    InCirc,
    OutCirc,
    InOutCirc,
    InBack,
    OutBack,
    InOutBack,
    InElastic,
    OutElastic,
    InOutElastic,
    InBounce,
    OutBounce,
    InOutBounce,
}

const NAMES: &[(&str, Ease)] = &[
    ("linear", Ease::Linear),
    ("inQuad", Ease::InQuad),
    ("outQuad", Ease::OutQuad),
    ("inOutQuad", Ease::InOutQuad),
    ("inCubic", Ease::InCubic),
    ("outCubic", Ease::OutCubic),
    ("inOutCubic", Ease::InOutCubic),
    ("inQuart", Ease::InQuart),
    ("outQuart", Ease::OutQuart),
    ("inOutQuart", Ease::InOutQuart),
    ("inQuint", Ease::InQuint),
    ("outQuint", Ease::OutQuint),
    ("inOutQuint", Ease::InOutQuint),
    ("inSine", Ease::InSine),
    ("outSine", Ease::OutSine),
    ("inOutSine", Ease::InOutSine),
    ("inExpo", Ease::InExpo),
    ("outExpo", Ease::OutExpo),
    ("inOutExpo", Ease::InOutExpo),
    ("inCirc", Ease::InCirc),
    ("outCirc", Ease::OutCirc),
    ("inOutCirc", Ease::InOutCirc),
    ("inBack", Ease::InBack),
    ("outBack", Ease::OutBack),
    ("inOutBack", Ease::InOutBack),
    ("inElastic", Ease::InElastic),
    ("outElastic", Ease::OutElastic),
    ("inOutElastic", Ease::InOutElastic),
    ("inBounce", Ease::InBounce),
    ("outBounce", Ease::OutBounce),
    ("inOutBounce", Ease::InOutBounce),
];

impl Ease {
    /// All curves, in registration order.
    pub fn all() -> impl Iterator<Item = Ease> {
        NAMES.iter().map(|(_, e)| *e)
    }

    /// Look up a curve by its script-facing name (e.g. `"outCubic"`).
    pub fn by_name(name: &str) -> Option<Ease> {
        NAMES.iter().find(|(n, _)| *n == name).map(|(_, e)| *e)
    }

    /// The script-facing name of this curve.
    pub fn name(self) -> &'static str {
        NAMES
            .iter()
            .find(|(_, e)| *e == self)
            .map(|(n, _)| *n)
            .unwrap_or("linear")
    }

    /// Evaluate the curve at `t`.
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => t * (2.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => {
                let t = t - 1.0;
                t * t * t + 1.0
            }
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    (t - 1.0) * (2.0 * t - 2.0) * (2.0 * t - 2.0) + 1.0
                }
            }
            Self::InQuart => t * t * t * t,
            Self::OutQuart => {
                let t = t - 1.0;
                1.0 - t * t * t * t
            }
            Self::InOutQuart => {
                if t < 0.5 {
                    8.0 * t * t * t * t
                } else {
                    let t = t - 1.0;
                    1.0 - 8.0 * t * t * t * t
                }
            }
            Self::InQuint => t * t * t * t * t,
            Self::OutQuint => {
                let t = t - 1.0;
                1.0 + t * t * t * t * t
            }
            Self::InOutQuint => {
                if t < 0.5 {
                    16.0 * t * t * t * t * t
                } else {
                    let t = t - 1.0;
                    1.0 + 16.0 * t * t * t * t * t
                }
            }
            Self::InSine => 1.0 - (t * PI / 2.0).cos(),
            Self::OutSine => (t * PI / 2.0).sin(),
            Self::InOutSine => 0.5 * (1.0 - (PI * t).cos()),
            Self::InExpo => {
                if t == 0.0 {
                    0.0
                } else {
                    2f64.powf(10.0 * (t - 1.0))
                }
            }
            Self::OutExpo => {
                if t == 1.0 {
                    1.0
                } else {
                    1.0 - 2f64.powf(-10.0 * t)
                }
            }
            Self::InOutExpo => {
                if t == 0.0 || t == 1.0 {
                    return t;
                }
                let t2 = t * 2.0;
                if t2 < 1.0 {
                    0.5 * 2f64.powf(10.0 * (t2 - 1.0))
                } else {
                    0.5 * (2.0 - 2f64.powf(-10.0 * (t2 - 1.0)))
                }
            }
            Self::InCirc => 1.0 - (1.0 - t * t).sqrt(),
            Self::OutCirc => (1.0 - (t - 1.0) * (t - 1.0)).sqrt(),
            Self::InOutCirc => {
                let t2 = t * 2.0;
                if t2 < 1.0 {
                    -0.5 * ((1.0 - t2 * t2).sqrt() - 1.0)
                } else {
                    0.5 * ((1.0 - (t2 - 2.0) * t2).sqrt() + 1.0)
                }
            }
            Self::InBack => {
                let s = 1.70158;
                t * t * ((s + 1.0) * t - s)
            }
            Self::OutBack => {
                let s = 1.70158;
                let t = t - 1.0;
                t * t * ((s + 1.0) * t + s) + 1.0
            }
            Self::InOutBack => {
                let s = 1.70158 * 1.525;
                let mut t2 = t * 2.0;
                if t2 < 1.0 {
                    0.5 * (t2 * t2 * ((s + 1.0) * t2 - s))
                } else {
                    t2 -= 2.0;
                    0.5 * (t2 * t2 * ((s + 1.0) * t2 + s) + 2.0)
                }
            }
            Self::InElastic => {
                if t == 0.0 || t == 1.0 {
                    return t;
                }
                -(2f64.powf(10.0 * t - 10.0)) * (((t * 10.0 - 10.75) * (2.0 * PI)) / 3.0).sin()
            }
            Self::OutElastic => {
                if t == 0.0 || t == 1.0 {
                    return t;
                }
                2f64.powf(-10.0 * t) * (((t * 10.0 - 0.75) * (2.0 * PI)) / 3.0).sin() + 1.0
            }
            Self::InOutElastic => {
                if t == 0.0 || t == 1.0 {
                    return t;
                }
                let c5 = (2.0 * PI) / 4.5;
                if t < 0.5 {
                    -(2f64.powf(20.0 * t - 10.0) * ((20.0 * t - 11.125) * c5).sin()) / 2.0
                } else {
                    (2f64.powf(-20.0 * t + 10.0) * ((20.0 * t - 11.125) * c5).sin()) / 2.0 + 1.0
                }
            }
            Self::InBounce => 1.0 - Self::OutBounce.apply(1.0 - t),
            Self::OutBounce => {
                let n1 = 7.5625;
                let d1 = 2.75;
                if t < 1.0 / d1 {
                    n1 * t * t
                } else if t < 2.0 / d1 {
                    let t = t - 1.5 / d1;
                    n1 * t * t + 0.75
                } else if t < 2.5 / d1 {
                    let t = t - 2.25 / d1;
                    n1 * t * t + 0.9375
                } else {
                    let t = t - 2.625 / d1;
                    n1 * t * t + 0.984375
                }
            }
            Self::InOutBounce => {
                if t < 0.5 {
                    (1.0 - Self::OutBounce.apply(1.0 - 2.0 * t)) / 2.0
                } else {
                    (1.0 + Self::OutBounce.apply(2.0 * t - 1.0)) / 2.0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_stable() {
        for ease in Ease::all() {
            assert!(ease.apply(0.0).abs() < 1e-9, "{:?} at 0", ease);
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-9, "{:?} at 1", ease);
        }
    }

    #[test]
    fn monotonic_spot_check_for_polynomials() {
        for ease in [
            Ease::Linear,
            Ease::InQuad,
            Ease::OutQuad,
            Ease::InOutCubic,
            Ease::InQuart,
            Ease::OutQuint,
            Ease::InSine,
            Ease::OutExpo,
            Ease::InCirc,
        ] {
            let a = ease.apply(0.25);
            let b = ease.apply(0.5);
            let c = ease.apply(0.75);
            assert!(a < b && b < c, "{:?} not increasing", ease);
        }
    }

    #[test]
    fn back_overshoots_below_zero() {
        assert!(Ease::InBack.apply(0.2) < 0.0);
        assert!(Ease::OutBack.apply(0.8) > 1.0);
    }

    #[test]
    fn name_lookup_roundtrips() {
        for ease in Ease::all() {
            assert_eq!(Ease::by_name(ease.name()), Some(ease));
        }
        assert_eq!(Ease::by_name("outCubic"), Some(Ease::OutCubic));
        assert_eq!(Ease::by_name("nope"), None);
    }

    #[test]
    fn serde_uses_script_names() {
        let json = serde_json::to_string(&Ease::InOutQuad).unwrap();
        assert_eq!(json, "\"inOutQuad\"");
        let back: Ease = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Ease::InOutQuad);
    }
}
