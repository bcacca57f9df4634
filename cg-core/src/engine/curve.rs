//! Fan curve engine
//!
//! Maps a temperature to a duty cycle by linear interpolation between sorted
//! breakpoints.
//!
//! # How It Works
//!
//! 1. **Construction**: points are validated and sorted once, when the daemon
//!    starts. The curve is immutable afterwards.
//!
//! 2. **Interpolation**: below the first point the first duty is used, above
//!    the last point the last duty is used, in between the bracketing segment
//!    is interpolated linearly.
//!
//! 3. **Clamping**: the caller clamps the result to the actuator-safe range
//!    with [`clamp`].

use crate::data::CurvePoint;
use crate::error::{CoolguardError, Result};

/// Immutable, sorted fan curve
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    points: Vec<CurvePoint>,
}

impl Curve {
    /// Build a curve from unsorted points
    ///
    /// Fails if there are no points, if a value is not finite, or if two
    /// points share a temperature.
    pub fn new(mut points: Vec<CurvePoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(CoolguardError::InvalidCurve(
                "curve must have at least one point".into(),
            ));
        }

        if let Some(bad) = points
            .iter()
            .find(|p| !p.temperature.is_finite() || !p.duty.is_finite())
        {
            return Err(CoolguardError::InvalidCurve(format!(
                "curve point {} is not finite",
                bad
            )));
        }

        points.sort_by(|a, b| a.temperature.total_cmp(&b.temperature));

        if let Some(pair) = points
            .windows(2)
            .find(|w| w[0].temperature == w[1].temperature)
        {
            return Err(CoolguardError::InvalidCurve(format!(
                "duplicate temperature {}°C in curve",
                pair[0].temperature
            )));
        }

        Ok(Self { points })
    }

    /// Duty for `temperature`. Infallible because construction rejected the
    /// empty curve.
    pub fn evaluate(&self, temperature: f64) -> f64 {
        interpolate(&self.points, temperature)
    }

    /// Sorted points
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }
}

/// Evaluate an ascending slice of breakpoints at `x`
///
/// Returns a configuration error for an empty slice. Segments whose two
/// temperatures coincide yield the lower point's duty.
pub fn evaluate(points: &[CurvePoint], x: f64) -> Result<f64> {
    if points.is_empty() {
        return Err(CoolguardError::InvalidCurve(
            "curve must have at least one point".into(),
        ));
    }
    Ok(interpolate(points, x))
}

fn interpolate(points: &[CurvePoint], x: f64) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return f64::NAN,
    };

    if x <= first.temperature {
        return first.duty;
    }
    if x >= last.temperature {
        return last.duty;
    }

    for window in points.windows(2) {
        let (lower, upper) = (&window[0], &window[1]);

        if x >= lower.temperature && x <= upper.temperature {
            let span = upper.temperature - lower.temperature;
            if span == 0.0 {
                return lower.duty;
            }
            let ratio = (x - lower.temperature) / span;
            return lower.duty + ratio * (upper.duty - lower.duty);
        }
    }

    // Unreachable for sorted input; x is strictly inside [first, last].
    last.duty
}

/// Constrain `value` to `[low, high]`. `low <= high` is a precondition.
pub fn clamp(value: f64, low: f64, high: f64) -> f64 {
    debug_assert!(low <= high, "clamp bounds inverted: {} > {}", low, high);
    if value < low {
        low
    } else if value > high {
        high
    } else {
        value
    }
}
