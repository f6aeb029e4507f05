pub mod peaks;

use crate::metrics::geometry::{distance, midpoint};
use crate::pose::{KeypointSet, LandmarkIndex};

/// Centered median filter window (odd).
pub const MEDIAN_WINDOW: usize = 5;

/// Fraction of the robust signal range used as extremum prominence.
const PROMINENCE_FRACTION: f32 = 0.10;
const ROBUST_LOW_PCT: f32 = 5.0;
const ROBUST_HIGH_PCT: f32 = 95.0;

/// Vertical hip position normalized by leg length.
///
/// (hip_y - ankle_y) / |hip_mid - ankle_mid| is scale invariant and rises
/// as the squat deepens. Falls back to raw hip y when ankles are missing
/// or the leg length degenerates; NaN when the hips themselves are missing.
pub fn normalized_hip_y(keypoints: Option<&KeypointSet>) -> f32 {
    use LandmarkIndex::*;
    let kp = match keypoints {
        Some(kp) => kp,
        None => return f32::NAN,
    };
    let hip_mid = match midpoint(kp.get(LeftHip), kp.get(RightHip)) {
        Some(p) => p,
        None => return f32::NAN,
    };
    if let Some(ankle_mid) = midpoint(kp.get(LeftAnkle), kp.get(RightAnkle)) {
        let leg_len = distance(hip_mid, ankle_mid);
        if leg_len > 1e-3 {
            return (hip_mid.y - ankle_mid.y) / leg_len;
        }
    }
    hip_mid.y
}

/// Fill NaN gaps in place: forward-fill from the last valid sample,
/// then backward-fill the leading run from the first valid sample.
/// An all-NaN slice is left untouched.
pub fn fill_gaps(samples: &mut [f32]) {
    let mut last = f32::NAN;
    for v in samples.iter_mut() {
        if v.is_finite() {
            last = *v;
        } else if last.is_finite() {
            *v = last;
        }
    }
    let first = samples.iter().copied().find(|v| v.is_finite());
    if let Some(first) = first {
        for v in samples.iter_mut() {
            if v.is_finite() {
                break;
            }
            *v = first;
        }
    }
}

/// Centered median filter. Frames within half a window of a boundary
/// use the available partial window. NaN samples are excluded from the
/// window; a window with no finite sample passes the input through.
pub fn median_filter(samples: &[f32], window: usize) -> Vec<f32> {
    debug_assert!(window % 2 == 1, "window must be odd");
    let half = window / 2;
    let n = samples.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        let mut w: Vec<f32> = samples[lo..hi]
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        if w.is_empty() {
            out.push(samples[i]);
            continue;
        }
        w.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let m = w.len();
        out.push(if m % 2 == 1 {
            w[m / 2]
        } else {
            (w[m / 2 - 1] + w[m / 2]) / 2.0
        });
    }
    out
}

/// Gap-fill and median-filter a raw normalized hip-y sequence.
pub fn condition(raw: &[f32]) -> Vec<f32> {
    let mut filled = raw.to_vec();
    fill_gaps(&mut filled);
    median_filter(&filled, MEDIAN_WINDOW)
}

/// Linear-interpolation percentile over the finite samples.
pub fn percentile(samples: &[f32], pct: f32) -> Option<f32> {
    let mut finite: Vec<f32> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (finite.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;
    Some(finite[lo] + (finite[hi] - finite[lo]) * frac)
}

/// Extremum prominence derived from the signal's own distribution,
/// so detection adapts to each subject's movement amplitude instead of
/// relying on absolute pixel thresholds.
pub fn robust_prominence(signal: &[f32]) -> Option<f32> {
    let low = percentile(signal, ROBUST_LOW_PCT)?;
    let high = percentile(signal, ROBUST_HIGH_PCT)?;
    Some(PROMINENCE_FRACTION * (high - low))
}
