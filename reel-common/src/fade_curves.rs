//! Gain ramp curves for audio crossfades
//!
//! A ramp moves output gain from one level to another over a bounded time.
//! The curve decides how the normalized progress `t` (0.0 to 1.0) maps onto
//! that move:
//!
//! - Linear: constant rate (what a fixed-step interval ramp produces)
//! - Exponential: slow start, fast finish
//! - Logarithmic: fast start, slow finish
//! - SCurve: smooth acceleration and deceleration
//! - EqualPower: constant perceived loudness
//!
//! Curves are shapes only; the ceiling a ramp stops at is the caller's
//! business.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Ramp curve types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampCurve {
    /// v(t) = t
    #[default]
    Linear,

    /// v(t) = t²
    Exponential,

    /// v(t) = sqrt(t)
    Logarithmic,

    /// v(t) = 0.5 × (1 - cos(π × t))
    #[serde(alias = "cosine", alias = "scurve", alias = "s-curve")]
    SCurve,

    /// v(t) = sin(t × π/2)
    #[serde(alias = "equalpower")]
    EqualPower,
}

impl RampCurve {
    /// Shape value for normalized progress
    ///
    /// `progress` is clamped to 0.0..=1.0. Every curve maps 0.0 to 0.0 and
    /// 1.0 to 1.0, and is monotonically non-decreasing in between.
    pub fn shape(&self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);

        match self {
            RampCurve::Linear => t,
            RampCurve::Exponential => t * t,
            RampCurve::Logarithmic => t.sqrt(),
            RampCurve::SCurve => 0.5 * (1.0 - (std::f32::consts::PI * t).cos()),
            RampCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Gain at `progress` for a ramp from `from` to `to`
    ///
    /// Works in both directions. At progress 1.0 the result is exactly `to`.
    pub fn gain_at(&self, from: f32, to: f32, progress: f32) -> f32 {
        if progress >= 1.0 {
            return to;
        }
        from + (to - from) * self.shape(progress)
    }
}
