use serde::{Deserialize, Serialize};

use crate::config::MetricsConfig;
use crate::metrics::baseline::Baseline;
use crate::metrics::geometry::{distance, joint_angle_deg, midpoint, vertical_angle_deg};
use crate::pose::{KeypointSet, LandmarkIndex, Point};

/// 股関節が膝より下と判定するための脚長比マージン
const HIP_BELOW_KNEE_MARGIN: f32 = 0.02;

/// 1フレーム分のバイオメカニクス指標
///
/// 必要なランドマークが欠けた項目はNone。欠損はブール判定にも
/// Noneとして伝播し、計算全体を失敗させることはない。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub knee_angle_deg: Option<f32>,
    pub knee_flexion_deg: Option<f32>,
    pub hip_angle_deg: Option<f32>,
    pub trunk_angle_deg: Option<f32>,
    pub com_offset_norm: Option<f32>,
    pub depth_ok: Option<bool>,
    pub trunk_ok: Option<bool>,
    pub balance_ok: Option<bool>,
    pub form_ok: Option<bool>,
    pub pose_confidence: f32,
}

/// キーポイントから1フレーム分の指標を計算する
///
/// 純関数。ベースラインは引数で渡し、内部状態は持たない。
pub fn compute_frame_metrics(
    keypoints: Option<&KeypointSet>,
    baseline: Option<&Baseline>,
    config: &MetricsConfig,
) -> FrameMetrics {
    let kp = match keypoints {
        Some(kp) => kp,
        // ポーズなし: 全項目None、信頼度0
        None => return FrameMetrics::default(),
    };

    let knee_angle = knee_angle_deg(kp);
    let knee_flexion = knee_angle.map(|a| 180.0 - a);
    let hip_angle = hip_angle_deg(kp);
    let trunk_angle = trunk_angle_deg(kp);
    let com = com_proxy(kp);
    let (com_offset_norm, balance_ok) = balance_metrics(kp, com, config.balance_margin);
    let hip_below_knee = hip_below_knee(kp);

    // 深さ: 膝屈曲がパラレル閾値以上、かつ判定可能なら股関節が膝より下
    let depth_ok = knee_flexion.map(|flex| {
        let deep = flex >= config.parallel_flexion_deg;
        match hip_below_knee {
            Some(below) => deep && below,
            None => deep,
        }
    });

    // 前傾: ベースラインがあれば個人差に合わせて閾値を締める
    let trunk_threshold = match baseline.and_then(|b| b.trunk_angle_deg) {
        Some(base) => config.max_trunk_angle_deg.min(base + config.trunk_delta_deg),
        None => config.max_trunk_angle_deg,
    };
    let trunk_ok = trunk_angle.map(|t| t <= trunk_threshold);

    // フォーム: 深さが取れていることが前提。不明なNoneは拒否理由にしない
    let form_ok =
        depth_ok.map(|deep| deep && trunk_ok != Some(false) && balance_ok != Some(false));

    let mut confidence = 1.0_f32;
    if knee_angle.is_none() {
        confidence -= 0.40;
    }
    if hip_angle.is_none() {
        confidence -= 0.15;
    }
    if trunk_angle.is_none() {
        confidence -= 0.15;
    }
    if com_offset_norm.is_none() {
        confidence -= 0.15;
    }
    if hip_below_knee.is_none() {
        confidence -= 0.15;
    }

    FrameMetrics {
        knee_angle_deg: knee_angle,
        knee_flexion_deg: knee_flexion,
        hip_angle_deg: hip_angle,
        trunk_angle_deg: trunk_angle,
        com_offset_norm,
        depth_ok,
        trunk_ok,
        balance_ok,
        form_ok,
        pose_confidence: confidence.clamp(0.0, 1.0),
    }
}

/// 膝関節角: 左右（腰-膝-足首）の平均。片側しか取れなければその側
fn knee_angle_deg(kp: &KeypointSet) -> Option<f32> {
    use LandmarkIndex::*;
    let left = joint_angle_deg(kp.get(LeftHip), kp.get(LeftKnee), kp.get(LeftAnkle));
    let right = joint_angle_deg(kp.get(RightHip), kp.get(RightKnee), kp.get(RightAnkle));
    match (left, right) {
        (Some(l), Some(r)) => Some((l + r) / 2.0),
        (Some(l), None) => Some(l),
        (None, Some(r)) => Some(r),
        (None, None) => None,
    }
}

/// 股関節角: 腰中点における肩中点-膝中点の関節角
fn hip_angle_deg(kp: &KeypointSet) -> Option<f32> {
    use LandmarkIndex::*;
    let shoulder_mid = midpoint(kp.get(LeftShoulder), kp.get(RightShoulder));
    let hip_mid = midpoint(kp.get(LeftHip), kp.get(RightHip));
    let knee_mid = midpoint(kp.get(LeftKnee), kp.get(RightKnee));
    joint_angle_deg(shoulder_mid, hip_mid, knee_mid)
}

/// 体幹前傾角: 腰中点→肩中点の鉛直からの傾き
fn trunk_angle_deg(kp: &KeypointSet) -> Option<f32> {
    use LandmarkIndex::*;
    let shoulder_mid = midpoint(kp.get(LeftShoulder), kp.get(RightShoulder));
    let hip_mid = midpoint(kp.get(LeftHip), kp.get(RightHip));
    vertical_angle_deg(hip_mid?, shoulder_mid?)
}

/// 体節中点の加重和による重心近似（2D投影）
///
/// 欠損した体節は除外し、残った重みで暗黙に再正規化する。
fn com_proxy(kp: &KeypointSet) -> Option<Point> {
    use LandmarkIndex::*;
    let shoulder_mid = midpoint(kp.get(LeftShoulder), kp.get(RightShoulder));
    let hip_mid = midpoint(kp.get(LeftHip), kp.get(RightHip));
    let trunk_mid = midpoint(shoulder_mid, hip_mid);
    let head_mid = midpoint(kp.get(Nose), shoulder_mid);

    let left_upper_arm = midpoint(kp.get(LeftShoulder), kp.get(LeftElbow));
    let right_upper_arm = midpoint(kp.get(RightShoulder), kp.get(RightElbow));
    let left_forearm = midpoint(kp.get(LeftElbow), kp.get(LeftWrist));
    let right_forearm = midpoint(kp.get(RightElbow), kp.get(RightWrist));

    let left_thigh = midpoint(kp.get(LeftHip), kp.get(LeftKnee));
    let right_thigh = midpoint(kp.get(RightHip), kp.get(RightKnee));
    let left_shank = midpoint(kp.get(LeftKnee), kp.get(LeftAnkle));
    let right_shank = midpoint(kp.get(RightKnee), kp.get(RightAnkle));
    // 足部はかかと・つま先が無ければ足首で代用
    let left_foot = midpoint(
        kp.get(LeftHeel).or(kp.get(LeftAnkle)),
        kp.get(LeftFootIndex).or(kp.get(LeftAnkle)),
    );
    let right_foot = midpoint(
        kp.get(RightHeel).or(kp.get(RightAnkle)),
        kp.get(RightFootIndex).or(kp.get(RightAnkle)),
    );

    // 体節の質量比（合計 ≈ 1.0）
    let segments: [(f32, Option<Point>); 14] = [
        (0.08, head_mid),
        (0.50, trunk_mid),
        (0.027, left_upper_arm),
        (0.027, right_upper_arm),
        (0.016, left_forearm),
        (0.016, right_forearm),
        (0.006, kp.get(LeftWrist)),
        (0.006, kp.get(RightWrist)),
        (0.10, left_thigh),
        (0.10, right_thigh),
        (0.046, left_shank),
        (0.046, right_shank),
        (0.014, left_foot),
        (0.014, right_foot),
    ];

    let mut total_w = 0.0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for (w, pt) in segments {
        if let Some(pt) = pt {
            total_w += w;
            sum_x += w * pt.x;
            sum_y += w * pt.y;
        }
    }
    if total_w < 1e-6 {
        return None;
    }
    Some(Point::new(sum_x / total_w, sum_y / total_w))
}

/// (com_offset_norm, balance_ok)
///
/// 足部ベースはかかと・つま先を優先し、2点未満なら足首で代用。
fn balance_metrics(
    kp: &KeypointSet,
    com: Option<Point>,
    margin_ratio: f32,
) -> (Option<f32>, Option<bool>) {
    use LandmarkIndex::*;
    let com = match com {
        Some(c) => c,
        None => return (None, None),
    };

    let mut base_xs: Vec<f32> = [LeftHeel, RightHeel, LeftFootIndex, RightFootIndex]
        .into_iter()
        .filter_map(|idx| kp.get(idx))
        .map(|p| p.x)
        .collect();
    if base_xs.len() < 2 {
        base_xs = [LeftAnkle, RightAnkle]
            .into_iter()
            .filter_map(|idx| kp.get(idx))
            .map(|p| p.x)
            .collect();
    }
    if base_xs.len() < 2 {
        return (None, None);
    }

    let base_min = base_xs.iter().copied().fold(f32::INFINITY, f32::min);
    let base_max = base_xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let span = base_max - base_min;
    if span < 1e-6 {
        return (None, None);
    }
    let center = (base_min + base_max) / 2.0;
    let offset_norm = (com.x - center) / span;
    let margin = margin_ratio * span;
    let ok = com.x >= base_min - margin && com.x <= base_max + margin;
    (Some(offset_norm), Some(ok))
}

/// 股関節中点が膝中点より下にあるか。中点が取れなければNone
fn hip_below_knee(kp: &KeypointSet) -> Option<bool> {
    use LandmarkIndex::*;
    let hip_mid = midpoint(kp.get(LeftHip), kp.get(RightHip))?;
    let knee_mid = midpoint(kp.get(LeftKnee), kp.get(RightKnee))?;
    let ankle_mid = midpoint(kp.get(LeftAnkle), kp.get(RightAnkle))?;
    let leg_len = distance(hip_mid, ankle_mid);
    if leg_len < 1e-3 {
        return None;
    }
    // 画像座標はyが下向き
    Some(hip_mid.y - knee_mid.y >= HIP_BELOW_KNEE_MARGIN * leg_len)
}
