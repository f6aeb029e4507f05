use anyhow::{bail, Result};

/// MediaPipe Pose の 33 ランドマークのうち解析に使うインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkIndex {
    /// ランドマーク配列の全長（未使用インデックス含む）
    pub const COUNT: usize = 33;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Nose),
            11 => Some(Self::LeftShoulder),
            12 => Some(Self::RightShoulder),
            13 => Some(Self::LeftElbow),
            14 => Some(Self::RightElbow),
            15 => Some(Self::LeftWrist),
            16 => Some(Self::RightWrist),
            23 => Some(Self::LeftHip),
            24 => Some(Self::RightHip),
            25 => Some(Self::LeftKnee),
            26 => Some(Self::RightKnee),
            27 => Some(Self::LeftAnkle),
            28 => Some(Self::RightAnkle),
            29 => Some(Self::LeftHeel),
            30 => Some(Self::RightHeel),
            31 => Some(Self::LeftFootIndex),
            32 => Some(Self::RightFootIndex),
            _ => None,
        }
    }
}

/// 画像座標の1点（ピクセル）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 1フレーム分のランドマーク集合
///
/// 推定器が出力した33点。部分的に欠損していてもよい。
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointSet {
    pub points: [Option<Point>; LandmarkIndex::COUNT],
}

impl KeypointSet {
    pub fn new(points: [Option<Point>; LandmarkIndex::COUNT]) -> Self {
        Self { points }
    }

    /// 推定器の出力（33点の完全なリスト）から作成
    pub fn from_points(points: &[(f32, f32)]) -> Result<Self> {
        if points.len() != LandmarkIndex::COUNT {
            bail!(
                "expected {} landmarks, got {}",
                LandmarkIndex::COUNT,
                points.len()
            );
        }
        let mut out = [None; LandmarkIndex::COUNT];
        for (i, &(x, y)) in points.iter().enumerate() {
            out[i] = Some(Point::new(x, y));
        }
        Ok(Self { points: out })
    }

    /// インデックスでランドマークを取得
    pub fn get(&self, index: LandmarkIndex) -> Option<Point> {
        self.points[index as usize]
    }

    /// 解析に十分なポーズかどうか
    ///
    /// 肩・腰・膝・足首が揃っていて、左右の脚長が妥当な比率であること。
    /// 推定が片脚だけ暴れたフレームを弾く。
    pub fn is_usable(&self) -> bool {
        use LandmarkIndex::*;
        let required = [
            LeftShoulder,
            RightShoulder,
            LeftHip,
            RightHip,
            LeftKnee,
            RightKnee,
            LeftAnkle,
            RightAnkle,
        ];
        for idx in required {
            if self.get(idx).is_none() {
                return false;
            }
        }
        let (lh, rh, la, ra) = match (
            self.get(LeftHip),
            self.get(RightHip),
            self.get(LeftAnkle),
            self.get(RightAnkle),
        ) {
            (Some(lh), Some(rh), Some(la), Some(ra)) => (lh, rh, la, ra),
            _ => return false,
        };
        let left_leg = (lh.x - la.x).hypot(lh.y - la.y);
        let right_leg = (rh.x - ra.x).hypot(rh.y - ra.y);
        if left_leg < 1e-3 || right_leg < 1e-3 {
            return false;
        }
        let ratio = left_leg / right_leg;
        (0.5..=2.0).contains(&ratio)
    }
}

impl Default for KeypointSet {
    fn default() -> Self {
        Self {
            points: [None; LandmarkIndex::COUNT],
        }
    }
}
