//! テスト用のポーズ合成ヘルパ

use crate::pose::{KeypointSet, LandmarkIndex, Point};

/// しゃがみ深さ depth ∈ [0,1] の全身ポーズを合成する
///
/// 矢状面ビュー。depth=0 で直立、depth=1 で膝屈曲約150°の深いしゃがみ。
pub(crate) fn make_squat_pose(depth: f32) -> KeypointSet {
    use LandmarkIndex::*;
    let mut points = [None; LandmarkIndex::COUNT];

    let shank = 100.0;
    let thigh = 100.0;
    let a = (depth * 40.0_f32).to_radians();
    let b = (depth * 110.0_f32).to_radians();

    for (side_x, sh, el, wr, hip, knee, ankle, heel, toe) in [
        (
            80.0,
            LeftShoulder,
            LeftElbow,
            LeftWrist,
            LeftHip,
            LeftKnee,
            LeftAnkle,
            LeftHeel,
            LeftFootIndex,
        ),
        (
            120.0,
            RightShoulder,
            RightElbow,
            RightWrist,
            RightHip,
            RightKnee,
            RightAnkle,
            RightHeel,
            RightFootIndex,
        ),
    ] {
        let ankle_pt = Point::new(side_x, 300.0);
        let knee_pt = Point::new(ankle_pt.x + shank * a.sin(), ankle_pt.y - shank * a.cos());
        let hip_pt = Point::new(knee_pt.x - thigh * b.sin(), knee_pt.y - thigh * b.cos());
        let shoulder_pt = Point::new(hip_pt.x + depth * 20.0, hip_pt.y - 120.0);
        let elbow_pt = Point::new(shoulder_pt.x + 10.0, shoulder_pt.y + 40.0);
        let wrist_pt = Point::new(elbow_pt.x, elbow_pt.y + 40.0);

        points[ankle as usize] = Some(ankle_pt);
        points[knee as usize] = Some(knee_pt);
        points[hip as usize] = Some(hip_pt);
        points[sh as usize] = Some(shoulder_pt);
        points[el as usize] = Some(elbow_pt);
        points[wr as usize] = Some(wrist_pt);
        points[heel as usize] = Some(Point::new(side_x - 10.0, 302.0));
        points[toe as usize] = Some(Point::new(side_x + 15.0, 302.0));
    }

    let ls = points[LeftShoulder as usize].unwrap();
    let rs = points[RightShoulder as usize].unwrap();
    points[Nose as usize] = Some(Point::new((ls.x + rs.x) / 2.0, ls.y - 30.0));

    KeypointSet::new(points)
}

/// 三角波の深さプロファイルでしゃがみ動作のフレーム列を合成する
///
/// 立位リードイン → (下降 half_cycle → 上昇 half_cycle) × cycles → 立位。
pub(crate) fn make_squat_series(
    lead_in: usize,
    half_cycle: usize,
    cycles: usize,
    tail: usize,
) -> Vec<Option<KeypointSet>> {
    let mut series = Vec::new();
    for _ in 0..lead_in {
        series.push(Some(make_squat_pose(0.0)));
    }
    for _ in 0..cycles {
        for i in 1..=half_cycle {
            series.push(Some(make_squat_pose(i as f32 / half_cycle as f32)));
        }
        for i in (0..half_cycle).rev() {
            series.push(Some(make_squat_pose(i as f32 / half_cycle as f32)));
        }
    }
    for _ in 0..tail {
        series.push(Some(make_squat_pose(0.0)));
    }
    series
}
