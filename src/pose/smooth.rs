use crate::config::DetectorConfig;
use crate::pose::keypoint::{KeypointSet, Point};

/// EMAベースのキーポイント平滑化フィルタ
///
/// 推定器の単発ジッタを1ステップのEMAで抑える。
/// 検出エンジンへの前処理であり、エンジン本体には含まれない。
pub struct KeypointSmoother {
    alpha: f32,
    prev: Option<KeypointSet>,
}

impl KeypointSmoother {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, prev: None }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.smooth_alpha)
    }

    pub fn apply(&mut self, current: KeypointSet) -> KeypointSet {
        let prev = match &self.prev {
            Some(prev) => prev,
            None => {
                self.prev = Some(current.clone());
                return current;
            }
        };

        let a = self.alpha;
        let mut points = current.points;
        for (pt, prev_pt) in points.iter_mut().zip(prev.points.iter()) {
            // 片側でも欠損していれば現在値をそのまま使う
            if let (Some(c), Some(p)) = (*pt, *prev_pt) {
                *pt = Some(Point::new(
                    a * c.x + (1.0 - a) * p.x,
                    a * c.y + (1.0 - a) * p.y,
                ));
            }
        }

        let result = KeypointSet::new(points);
        self.prev = Some(result.clone());
        result
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::keypoint::LandmarkIndex;

    fn single_point_set(x: f32, y: f32) -> KeypointSet {
        let mut points = [None; LandmarkIndex::COUNT];
        points[LandmarkIndex::LeftHip as usize] = Some(Point::new(x, y));
        KeypointSet::new(points)
    }

    #[test]
    fn test_first_frame_passthrough() {
        let mut s = KeypointSmoother::new(0.5);
        let kp = single_point_set(10.0, 20.0);
        let result = s.apply(kp.clone());
        assert_eq!(result, kp);
    }

    #[test]
    fn test_no_smoothing() {
        let mut s = KeypointSmoother::new(1.0);
        s.apply(single_point_set(0.0, 0.0));
        let result = s.apply(single_point_set(10.0, 20.0));
        assert_eq!(
            result.get(LandmarkIndex::LeftHip),
            Some(Point::new(10.0, 20.0))
        );
    }

    #[test]
    fn test_half_smoothing() {
        let mut s = KeypointSmoother::new(0.5);
        s.apply(single_point_set(0.0, 0.0));
        let result = s.apply(single_point_set(10.0, 20.0));
        assert_eq!(
            result.get(LandmarkIndex::LeftHip),
            Some(Point::new(5.0, 10.0))
        );
    }

    #[test]
    fn test_missing_point_passes_through() {
        let mut s = KeypointSmoother::new(0.5);
        s.apply(KeypointSet::default());
        // 前フレームで欠損していた点は平滑化せず現在値
        let result = s.apply(single_point_set(10.0, 20.0));
        assert_eq!(
            result.get(LandmarkIndex::LeftHip),
            Some(Point::new(10.0, 20.0))
        );
    }

    #[test]
    fn test_reset() {
        let mut s = KeypointSmoother::new(0.0);
        s.apply(single_point_set(0.0, 0.0));
        s.reset();
        // リセット後の最初のフレームはそのまま通る
        let result = s.apply(single_point_set(10.0, 20.0));
        assert_eq!(
            result.get(LandmarkIndex::LeftHip),
            Some(Point::new(10.0, 20.0))
        );
    }
}
