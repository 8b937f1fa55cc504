//! Perceptual color math in LCh space.
//!
//! All color comparison in the engine happens in Lightness-Chroma-hue
//! coordinates; there is no implicit RGB anywhere. Difference is CIEDE2000
//! per Sharma, Wu & Dalal (2005), "The CIEDE2000 Color-Difference Formula:
//! Implementation Notes, Supplementary Test Data, and Mathematical
//! Observations". The unit tests cover the canonical reference pairs from
//! that paper.

use serde::{Deserialize, Serialize};

use crate::defaults::{NEUTRAL_CHROMA, NEUTRAL_L_DARK, NEUTRAL_L_LIGHT};

/// A color in LCh coordinates.
///
/// Bounds: `l` in `[0, 100]`, `c` in `[0, ~150]`, `hue` in `[0, 360)` degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lch {
    /// Lightness, 0 (black) to 100 (white).
    pub l: f64,
    /// Chroma, 0 (achromatic) upward.
    pub c: f64,
    /// Hue angle in degrees, `[0, 360)`.
    pub hue: f64,
}

impl Lch {
    /// Construct a color, normalizing the hue angle into `[0, 360)`.
    pub fn new(l: f64, c: f64, hue: f64) -> Self {
        Self {
            l,
            c,
            hue: hue.rem_euclid(360.0),
        }
    }

    /// Whether the color is within the LCh bounds the data model requires.
    pub fn in_bounds(&self) -> bool {
        (0.0..=100.0).contains(&self.l)
            && (0.0..=150.0).contains(&self.c)
            && (0.0..360.0).contains(&self.hue)
    }

    /// CIELAB a* component.
    fn a(&self) -> f64 {
        self.c * self.hue.to_radians().cos()
    }

    /// CIELAB b* component.
    fn b(&self) -> f64 {
        self.c * self.hue.to_radians().sin()
    }
}

/// Hue relationship between two colors, classified by hue delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HueRelation {
    /// Hue delta within the same-hue threshold (10 degrees).
    Same,
    /// Hue delta at most 30 degrees.
    Analogous,
    /// Hue delta in the 110-130 degree band.
    Triadic,
    /// Hue delta at least 150 degrees.
    Complementary,
    /// Anything else.
    Unrelated,
}

/// Hue delta at or below which two hues count as the same.
const SAME_HUE_DEG: f64 = 10.0;

/// Absolute hue difference between two colors, in `[0, 180]` degrees.
pub fn hue_delta(a: &Lch, b: &Lch) -> f64 {
    let d = (a.hue - b.hue).abs() % 360.0;
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Classify the hue relationship between two colors.
///
/// Neutral colors have no meaningful hue; callers should filter with
/// [`is_neutral`] before classifying.
pub fn relation(a: &Lch, b: &Lch) -> HueRelation {
    let d = hue_delta(a, b);
    if d <= SAME_HUE_DEG {
        HueRelation::Same
    } else if d <= 30.0 {
        HueRelation::Analogous
    } else if (110.0..=130.0).contains(&d) {
        HueRelation::Triadic
    } else if d >= 150.0 {
        HueRelation::Complementary
    } else {
        HueRelation::Unrelated
    }
}

/// Whether a color reads as neutral: low chroma or extreme lightness.
pub fn is_neutral(c: &Lch) -> bool {
    c.c < NEUTRAL_CHROMA || c.l <= NEUTRAL_L_DARK || c.l >= NEUTRAL_L_LIGHT
}

/// CIEDE2000 color difference between two LCh colors.
///
/// Implements the standard formula, including the a*-axis rescaling (G
/// factor), the hue rotation term (R_T), and the weighting functions S_L,
/// S_C, S_H. Symmetric in its arguments.
pub fn delta_e2000(x: &Lch, y: &Lch) -> f64 {
    const POW25_7: f64 = 6_103_515_625.0; // 25^7

    let (l1, a1, b1) = (x.l, x.a(), x.b());
    let (l2, a2, b2) = (y.l, y.a(), y.b());

    let c1 = a1.hypot(b1);
    let c2 = a2.hypot(b2);
    let c_bar = (c1 + c2) / 2.0;

    let g = 0.5 * (1.0 - (c_bar.powi(7) / (c_bar.powi(7) + POW25_7)).sqrt());
    let a1p = (1.0 + g) * a1;
    let a2p = (1.0 + g) * a2;
    let c1p = a1p.hypot(b1);
    let c2p = a2p.hypot(b2);

    let h1p = if c1p == 0.0 {
        0.0
    } else {
        b1.atan2(a1p).to_degrees().rem_euclid(360.0)
    };
    let h2p = if c2p == 0.0 {
        0.0
    } else {
        b2.atan2(a2p).to_degrees().rem_euclid(360.0)
    };

    let dl = l2 - l1;
    let dc = c2p - c1p;

    let dh = if c1p * c2p == 0.0 {
        0.0
    } else {
        let diff = h2p - h1p;
        if diff.abs() <= 180.0 {
            diff
        } else if diff > 180.0 {
            diff - 360.0
        } else {
            diff + 360.0
        }
    };
    let dh_big = 2.0 * (c1p * c2p).sqrt() * (dh / 2.0).to_radians().sin();

    let l_bar = (l1 + l2) / 2.0;
    let cp_bar = (c1p + c2p) / 2.0;

    let h_bar = if c1p * c2p == 0.0 {
        h1p + h2p
    } else {
        let sum = h1p + h2p;
        if (h1p - h2p).abs() <= 180.0 {
            sum / 2.0
        } else if sum < 360.0 {
            (sum + 360.0) / 2.0
        } else {
            (sum - 360.0) / 2.0
        }
    };

    let t = 1.0 - 0.17 * (h_bar - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_bar).to_radians().cos()
        + 0.32 * (3.0 * h_bar + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_bar - 63.0).to_radians().cos();

    let d_theta = 30.0 * (-((h_bar - 275.0) / 25.0).powi(2)).exp();
    let r_c = 2.0 * (cp_bar.powi(7) / (cp_bar.powi(7) + POW25_7)).sqrt();
    let r_t = -(2.0 * d_theta).to_radians().sin() * r_c;

    let l_dev = (l_bar - 50.0).powi(2);
    let s_l = 1.0 + 0.015 * l_dev / (20.0 + l_dev).sqrt();
    let s_c = 1.0 + 0.045 * cp_bar;
    let s_h = 1.0 + 0.015 * cp_bar * t;

    let term_l = dl / s_l;
    let term_c = dc / s_c;
    let term_h = dh_big / s_h;

    (term_l * term_l + term_c * term_c + term_h * term_h + r_t * term_c * term_h).sqrt()
}

/// Circular standard deviation of hue angles, in degrees.
///
/// Returns 0.0 for fewer than two hues. Uses the standard
/// `sqrt(-2 ln R)` estimator over the mean resultant length.
pub fn circular_stddev_deg(hues: &[f64]) -> f64 {
    if hues.len() < 2 {
        return 0.0;
    }
    let n = hues.len() as f64;
    let (sum_sin, sum_cos) = hues.iter().fold((0.0_f64, 0.0_f64), |(s, c), h| {
        let r = h.to_radians();
        (s + r.sin(), c + r.cos())
    });
    let r = ((sum_sin / n).powi(2) + (sum_cos / n).powi(2)).sqrt();
    if r <= f64::EPSILON {
        // Degenerate uniform spread.
        return 180.0;
    }
    (-2.0 * r.ln()).sqrt().to_degrees().min(180.0)
}
