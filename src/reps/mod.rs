pub mod batch;
pub mod live;
pub mod window;

pub use batch::detect_reps;
pub use live::{IncrementalDetector, LiveState, Phase};

use serde::{Deserialize, Serialize};

use crate::metrics::FrameMetrics;

/// 1回分のレップ記録
///
/// 境界確定時に一括で作り、以後は変更しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepRecord {
    /// 1始まりの連番
    pub rep: u32,
    pub start_frame: u64,
    pub end_frame: u64,
    pub bottom_frame: u64,
    pub duration_sec: Option<f32>,
    /// 1/duration。テンポの代理指標
    pub speed_proxy: Option<f32>,
    /// ボトムフレームの信頼度が低く、レポート側で確認が必要
    pub needs_review: bool,
    /// ボトムフレームの指標一式
    pub metrics: FrameMetrics,
}

impl RepRecord {
    pub(crate) fn new(
        rep: u32,
        start_frame: u64,
        end_frame: u64,
        bottom_frame: u64,
        fps: f32,
        metrics: FrameMetrics,
        review_floor: f32,
    ) -> Self {
        let duration_sec = if fps > 0.0 {
            Some((end_frame - start_frame) as f32 / fps)
        } else {
            None
        };
        let speed_proxy = duration_sec.and_then(|d| if d > 0.0 { Some(1.0 / d) } else { None });
        Self {
            rep,
            start_frame,
            end_frame,
            bottom_frame,
            duration_sec,
            speed_proxy,
            needs_review: metrics.pose_confidence < review_floor,
            metrics,
        }
    }
}
