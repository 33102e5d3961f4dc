// Automation - Piecewise-linear evaluation of volume curves

use crate::project::types::{AutomationPoint, Track};

/// Level used when a track has no automation
pub const NEUTRAL_LEVEL: f64 = 100.0;

/// Evaluate a curve at `beat`
///
/// `points` must be sorted ascending by beat with unique beats. An empty
/// curve yields 100, a single point yields its value, positions outside the
/// curve hold the first/last value, and positions in between interpolate
/// linearly.
pub fn evaluate(points: &[AutomationPoint], beat: f64) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return NEUTRAL_LEVEL,
    };

    if beat <= first.beat {
        return first.value;
    }
    if beat >= last.beat {
        return last.value;
    }

    // Index of the first point strictly after `beat`; at least 1 here.
    let upper = points.partition_point(|p| p.beat <= beat);
    let a = points[upper - 1];
    let b = points[upper];
    let span = b.beat - a.beat;
    if span <= 0.0 {
        return b.value;
    }
    let t = (beat - a.beat) / span;
    a.value + (b.value - a.value) * t
}

/// Linear gain of a track at `beat`: volume/100 * automation/100
pub fn track_gain(track: &Track, beat: f64) -> f64 {
    track.volume_gain() * evaluate(&track.volume_automation, beat) / 100.0
}
