//! Local extremum extraction with minimum separation and prominence.
//!
//! Self-contained: candidate maxima are scanned directly, prominence is the
//! height above the higher of the two flanking valleys, and nearby
//! candidates are suppressed greedily by descending height.

/// Indices of local maxima, ascending.
///
/// Sequence endpoints count as candidates so a session that starts or ends
/// at an extremum is not silently truncated. Candidates with prominence
/// below `min_prominence` are dropped; of candidates closer than
/// `min_distance`, only the highest survives.
pub fn find_peaks(signal: &[f32], min_distance: usize, min_prominence: f32) -> Vec<usize> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<usize> = Vec::new();
    for i in 0..n {
        if !signal[i].is_finite() {
            continue;
        }
        let rises_from_left = i == 0 || signal[i] > signal[i - 1];
        let falls_to_right = i + 1 == n || signal[i] >= signal[i + 1];
        if rises_from_left && falls_to_right {
            candidates.push(i);
        }
    }

    candidates.retain(|&i| prominence(signal, i) >= min_prominence);

    // Greedy suppression: highest candidates claim their neighborhood first.
    candidates.sort_by(|&a, &b| signal[b].partial_cmp(&signal[a]).unwrap());
    let mut kept: Vec<usize> = Vec::new();
    for i in candidates {
        if kept.iter().all(|&k| k.abs_diff(i) >= min_distance.max(1)) {
            kept.push(i);
        }
    }
    kept.sort_unstable();
    kept
}

/// Indices of local minima, ascending.
pub fn find_troughs(signal: &[f32], min_distance: usize, min_prominence: f32) -> Vec<usize> {
    let negated: Vec<f32> = signal.iter().map(|v| -v).collect();
    find_peaks(&negated, min_distance, min_prominence)
}

/// Height of `peak` above the higher of its two flanking valleys.
///
/// Each side is walked outward until a sample higher than the peak or the
/// boundary; the minimum over the walk is that side's valley. An endpoint
/// peak has only one side and uses it alone.
fn prominence(signal: &[f32], peak: usize) -> f32 {
    let height = signal[peak];

    let mut left_min: Option<f32> = None;
    let mut i = peak;
    while i > 0 {
        i -= 1;
        if signal[i] > height {
            break;
        }
        left_min = Some(left_min.map_or(signal[i], |m: f32| m.min(signal[i])));
    }

    let mut right_min: Option<f32> = None;
    let mut i = peak;
    while i + 1 < signal.len() {
        i += 1;
        if signal[i] > height {
            break;
        }
        right_min = Some(right_min.map_or(signal[i], |m: f32| m.min(signal[i])));
    }

    let base = match (left_min, right_min) {
        (Some(l), Some(r)) => l.max(r),
        (Some(l), None) => l,
        (None, Some(r)) => r,
        (None, None) => return 0.0,
    };
    height - base
}
