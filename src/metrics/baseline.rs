use serde::{Deserialize, Serialize};

use crate::metrics::frame::FrameMetrics;

/// セッション基準値
///
/// キャリブレーション中の立位フレームから中央値で作る。
/// 一度作ったら変更せず、以後の指標計算に引数で渡す。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Baseline {
    pub knee_flexion_deg: Option<f32>,
    pub trunk_angle_deg: Option<f32>,
    pub hip_angle_deg: Option<f32>,
    pub com_offset_norm: Option<f32>,
}

/// キャリブレーションサンプルからベースラインを計算する
///
/// 外れ値に強いよう各項目の中央値を取る。有効サンプルが無い項目はNone。
pub fn compute_baseline(samples: &[FrameMetrics]) -> Baseline {
    Baseline {
        knee_flexion_deg: median(samples.iter().filter_map(|s| s.knee_flexion_deg)),
        trunk_angle_deg: median(samples.iter().filter_map(|s| s.trunk_angle_deg)),
        hip_angle_deg: median(samples.iter().filter_map(|s| s.hip_angle_deg)),
        com_offset_norm: median(samples.iter().filter_map(|s| s.com_offset_norm)),
    }
}

/// 立位フレームかどうか（膝屈曲が上限未満）
///
/// キャリブレーションは動作中のフレームを含めてはいけない。
pub fn is_standing(metrics: &FrameMetrics, ceiling_deg: f32) -> bool {
    matches!(metrics.knee_flexion_deg, Some(flex) if flex < ceiling_deg)
}

fn median(values: impl Iterator<Item = f32>) -> Option<f32> {
    let mut values: Vec<f32> = values.collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    if n % 2 == 1 {
        Some(values[n / 2])
    } else {
        Some((values[n / 2 - 1] + values[n / 2]) / 2.0)
    }
}
