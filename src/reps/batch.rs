use crate::config::Config;
use crate::metrics::{
    compute_baseline, compute_frame_metrics, is_standing, Baseline, FrameMetrics,
};
use crate::pose::KeypointSet;
use crate::reps::RepRecord;
use crate::signal::peaks::{find_peaks, find_troughs};
use crate::signal::{condition, normalized_hip_y, robust_prominence};

/// 記録済みシーケンス全体からレップを検出する（オフライン）
///
/// 戻り値は (レップ一覧, 整形済みhip-y曲線)。曲線は可視化用で、
/// 有効なサンプルがひとつも無ければ両方空を返す。
pub fn detect_reps(
    series: &[Option<KeypointSet>],
    fps: f32,
    config: &Config,
) -> (Vec<RepRecord>, Vec<f32>) {
    let raw: Vec<f32> = series
        .iter()
        .map(|kp| normalized_hip_y(kp.as_ref()))
        .collect();
    if !raw.iter().any(|v| v.is_finite()) {
        return (Vec::new(), Vec::new());
    }

    let baseline = calibration_baseline(series, config);
    let curve = condition(&raw);

    let prominence = match robust_prominence(&curve) {
        Some(p) => p,
        None => return (Vec::new(), curve),
    };
    let min_distance = config.detector.min_peak_distance;
    // 正規化信号は屈曲で上がる: 立位=極小、ボトム=極大
    let standing = find_troughs(&curve, min_distance, prominence);
    let bottoms = find_peaks(&curve, min_distance, prominence);

    let mut reps: Vec<RepRecord> = Vec::new();
    for pair in standing.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        // 立位区間の間で最も深いボトム極値をレップの最深点にする
        let bottom = bottoms
            .iter()
            .copied()
            .filter(|&b| b > start && b < end)
            .max_by(|&a, &b| curve[a].partial_cmp(&curve[b]).unwrap());
        let bottom = match bottom {
            Some(b) => b,
            None => continue,
        };
        let metrics =
            compute_frame_metrics(series[bottom].as_ref(), baseline.as_ref(), &config.metrics);
        reps.push(RepRecord::new(
            reps.len() as u32 + 1,
            start as u64,
            end as u64,
            bottom as u64,
            fps,
            metrics,
            config.metrics.review_confidence_floor,
        ));
    }
    (reps, curve)
}

/// 立位フィルタを通った先頭フレーム群からベースラインを作る
///
/// サンプル数はキャリブレーションフレーム数の2倍を上限とする。
fn calibration_baseline(series: &[Option<KeypointSet>], config: &Config) -> Option<Baseline> {
    let quota = config.detector.calibration_frames * 2;
    let mut samples: Vec<FrameMetrics> = Vec::new();
    for kp in series {
        if samples.len() >= quota {
            break;
        }
        let kp = match kp {
            Some(kp) if kp.is_usable() => kp,
            _ => continue,
        };
        let metrics = compute_frame_metrics(Some(kp), None, &config.metrics);
        if is_standing(&metrics, config.metrics.standing_flexion_ceiling_deg) {
            samples.push(metrics);
        }
    }
    if samples.is_empty() {
        None
    } else {
        Some(compute_baseline(&samples))
    }
}
