use anyhow::{bail, Result};
use serde::Serialize;

use crate::config::{Config, DetectorConfig, MetricsConfig};
use crate::metrics::{
    compute_baseline, compute_frame_metrics, is_standing, Baseline, FrameMetrics,
};
use crate::pose::KeypointSet;
use crate::reps::window::RingBuffer;
use crate::reps::RepRecord;
use crate::signal::{fill_gaps, normalized_hip_y, percentile};

// 位相しきい値の係数。ウィンドウ内の10/90パーセンタイル帯から毎プッシュ導出する
const TOP_FRAC: f32 = 0.38;
const BOTTOM_FRAC: f32 = 0.58;
const HYSTERESIS_FRAC: f32 = 0.06;
/// 帯域が潰れているときの最小スパン
const MIN_SPAN: f32 = 0.12;
const BAND_LOW_PCT: f32 = 10.0;
const BAND_HIGH_PCT: f32 = 90.0;
/// 状態機械を動かし始める最小サンプル数
const MIN_EVAL_SAMPLES: usize = 5;

/// レップ位相
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    TopReady,
    Descent,
    Bottom,
    Ascent,
}

/// 進行中レップのボトム追跡（これまでの最深フレーム）
#[derive(Debug, Clone, Copy)]
struct BottomTrack {
    frame: u64,
    sample: f32,
    metrics: FrameMetrics,
}

/// 進行中レップ。TopReady以外の位相でのみ存在する
#[derive(Debug, Clone, Copy)]
struct RepInProgress {
    start_frame: u64,
    bottom: Option<BottomTrack>,
}

/// 1フレームぶんの検出状態（オーバーレイ表示用）
#[derive(Debug, Clone, Serialize)]
pub struct LiveState {
    pub rep_count: u32,
    pub phase: Phase,
    pub status: String,
    pub metrics: FrameMetrics,
    /// 直近で確定したレップの速度
    pub speed_proxy: Option<f32>,
    /// このフレームで確定したレップ
    pub rep: Option<RepRecord>,
}

/// フレーム逐次入力のレップ検出器
///
/// 1セッションにつき1インスタンス。pushは単一の呼び出し元から
/// フレーム順に呼ぶこと（内部で直列化はしない）。
pub struct IncrementalDetector {
    metrics_config: MetricsConfig,
    detector_config: DetectorConfig,
    hip_y: RingBuffer<f32>,
    calib_samples: Vec<FrameMetrics>,
    baseline: Option<Baseline>,
    calibrated: bool,
    phase: Phase,
    in_progress: Option<RepInProgress>,
    reps: Vec<RepRecord>,
    rep_count: u32,
    last_confirmed_end: Option<u64>,
    last_frame_idx: Option<u64>,
    nan_run: usize,
}

impl IncrementalDetector {
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            hip_y: RingBuffer::new(config.detector.window_size),
            metrics_config: config.metrics.clone(),
            detector_config: config.detector.clone(),
            calib_samples: Vec::new(),
            baseline: None,
            calibrated: false,
            phase: Phase::TopReady,
            in_progress: None,
            reps: Vec::new(),
            rep_count: 0,
            last_confirmed_end: None,
            last_frame_idx: None,
            nan_run: 0,
        }
    }

    /// 全状態をキャリブレーション前に戻す
    pub fn reset(&mut self) {
        self.hip_y.clear();
        self.calib_samples.clear();
        self.baseline = None;
        self.calibrated = false;
        self.phase = Phase::TopReady;
        self.in_progress = None;
        self.reps.clear();
        self.rep_count = 0;
        self.last_confirmed_end = None;
        self.last_frame_idx = None;
        self.nan_run = 0;
    }

    pub fn reps(&self) -> &[RepRecord] {
        &self.reps
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 1フレームを入力して現在の状態を返す
    ///
    /// フレーム番号は単調増加であること。それ以外の入力不備
    /// （ポーズ欠損・ランドマーク欠け）はエラーにせず状態に反映する。
    pub fn push(
        &mut self,
        frame_idx: u64,
        keypoints: Option<&KeypointSet>,
        fps: f32,
    ) -> Result<LiveState> {
        if let Some(last) = self.last_frame_idx {
            if frame_idx <= last {
                bail!(
                    "frame index must be monotonic: got {} after {}",
                    frame_idx,
                    last
                );
            }
        }
        self.last_frame_idx = Some(frame_idx);

        let usable = keypoints.map_or(false, |kp| kp.is_usable());
        let usable_keypoints = if usable { keypoints } else { None };
        let metrics =
            compute_frame_metrics(usable_keypoints, self.baseline.as_ref(), &self.metrics_config);

        if !self.calibrated {
            return Ok(self.push_calibration(usable, metrics));
        }

        // ポーズ欠損フレームはNaNプレースホルダとして積む
        let sample = normalized_hip_y(usable_keypoints);
        if sample.is_finite() {
            self.nan_run = 0;
        } else {
            self.nan_run += 1;
            // 欠損が長く続いたら進行中レップは信用できないので破棄する
            if self.nan_run > self.detector_config.window_size / 2 && self.phase != Phase::TopReady
            {
                self.phase = Phase::TopReady;
                self.in_progress = None;
            }
        }
        self.hip_y.push(sample);

        // 短い欠損は位相を保持したまま橋渡しする。NaNは前後の有効値で
        // 補完してパーセンタイル帯の分布重みを保ち、位相遷移は実サンプル
        // が来たフレームでしか起こさない
        let mut confirmed = None;
        if sample.is_finite() && self.hip_y.len() >= MIN_EVAL_SAMPLES {
            let mut snapshot = self.hip_y.to_vec();
            fill_gaps(&mut snapshot);
            let low = percentile(&snapshot, BAND_LOW_PCT).unwrap_or(sample);
            let high = percentile(&snapshot, BAND_HIGH_PCT).unwrap_or(sample);
            let span = (high - low).max(MIN_SPAN);
            let top_thresh = low + TOP_FRAC * span;
            let bottom_thresh = low + BOTTOM_FRAC * span;
            let hysteresis = HYSTERESIS_FRAC * span;
            confirmed = self.step(
                frame_idx,
                sample,
                top_thresh,
                bottom_thresh,
                hysteresis,
                fps,
                metrics,
            );
        }

        let status = match &confirmed {
            Some(rep) => format!("Rep {} confirmed", rep.rep),
            None if !usable => "No pose".to_string(),
            None => phase_status(self.phase).to_string(),
        };

        Ok(LiveState {
            rep_count: self.rep_count,
            phase: self.phase,
            status,
            metrics,
            speed_proxy: self.reps.last().and_then(|r| r.speed_proxy),
            rep: confirmed,
        })
    }

    /// キャリブレーション中の1フレーム
    ///
    /// 立位フレームだけを規定数まで集め、揃ったら中央値ベースラインを
    /// 作ってローリングウィンドウを捨てる。
    fn push_calibration(&mut self, usable: bool, metrics: FrameMetrics) -> LiveState {
        let status = if !usable {
            "Waiting for pose".to_string()
        } else {
            if is_standing(&metrics, self.metrics_config.standing_flexion_ceiling_deg) {
                self.calib_samples.push(metrics);
            }
            if self.calib_samples.len() >= self.detector_config.calibration_frames {
                self.baseline = Some(compute_baseline(&self.calib_samples));
                self.calibrated = true;
                self.calib_samples.clear();
                self.hip_y.clear();
                "Calibrated".to_string()
            } else {
                format!(
                    "Calibrating {}/{}",
                    self.calib_samples.len(),
                    self.detector_config.calibration_frames
                )
            }
        };
        LiveState {
            rep_count: self.rep_count,
            phase: self.phase,
            status,
            metrics,
            speed_proxy: None,
            rep: None,
        }
    }

    /// 位相遷移を1段進める。レップが確定したらその記録を返す
    fn step(
        &mut self,
        frame_idx: u64,
        sample: f32,
        top_thresh: f32,
        bottom_thresh: f32,
        hysteresis: f32,
        fps: f32,
        metrics: FrameMetrics,
    ) -> Option<RepRecord> {
        match self.phase {
            Phase::TopReady => {
                if sample > top_thresh {
                    self.phase = Phase::Descent;
                    self.in_progress = Some(RepInProgress {
                        start_frame: frame_idx,
                        bottom: None,
                    });
                }
                None
            }
            Phase::Descent => {
                if sample > bottom_thresh {
                    self.phase = Phase::Bottom;
                    if let Some(rep) = self.in_progress.as_mut() {
                        rep.bottom = Some(BottomTrack {
                            frame: frame_idx,
                            sample,
                            metrics,
                        });
                    }
                }
                None
            }
            Phase::Bottom => {
                if let Some(rep) = self.in_progress.as_mut() {
                    // より深いフレームが来たら最深点を置き換える
                    let deeper = rep.bottom.map_or(true, |b| sample > b.sample);
                    if deeper {
                        rep.bottom = Some(BottomTrack {
                            frame: frame_idx,
                            sample,
                            metrics,
                        });
                    }
                }
                if sample < bottom_thresh - hysteresis {
                    self.phase = Phase::Ascent;
                }
                None
            }
            Phase::Ascent => {
                if sample < top_thresh {
                    let confirmed = self.try_confirm(frame_idx, fps);
                    // 確定の成否によらずTopReadyへ戻る。近すぎたレップは再試行しない
                    self.phase = Phase::TopReady;
                    self.in_progress = None;
                    return confirmed;
                }
                None
            }
        }
    }

    fn try_confirm(&mut self, end_frame: u64, fps: f32) -> Option<RepRecord> {
        let in_progress = self.in_progress?;
        let bottom = in_progress.bottom?;
        let gap_ok = self.last_confirmed_end.map_or(true, |end| {
            in_progress.start_frame >= end + self.detector_config.min_frames_between_reps
        });
        if !gap_ok {
            return None;
        }
        self.rep_count += 1;
        let rep = RepRecord::new(
            self.rep_count,
            in_progress.start_frame,
            end_frame,
            bottom.frame,
            fps,
            bottom.metrics,
            self.metrics_config.review_confidence_floor,
        );
        self.last_confirmed_end = Some(end_frame);
        self.reps.push(rep.clone());
        Some(rep)
    }
}

impl Default for IncrementalDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn phase_status(phase: Phase) -> &'static str {
    match phase {
        Phase::TopReady => "Standing",
        Phase::Descent => "Descending",
        Phase::Bottom => "Bottom",
        Phase::Ascent => "Ascending",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{make_squat_pose, make_squat_series};

    const FPS: f32 = 20.0;

    fn run_series(
        detector: &mut IncrementalDetector,
        series: &[Option<KeypointSet>],
    ) -> Vec<LiveState> {
        series
            .iter()
            .enumerate()
            .map(|(i, kp)| detector.push(i as u64, kp.as_ref(), FPS).unwrap())
            .collect()
    }

    #[test]
    fn test_calibration_progress_and_completion() {
        let mut detector = IncrementalDetector::new();
        for i in 0..9u64 {
            let state = detector
                .push(i, Some(&make_squat_pose(0.0)), FPS)
                .unwrap();
            assert_eq!(state.status, format!("Calibrating {}/10", i + 1));
            assert!(!detector.is_calibrated());
        }
        let state = detector.push(9, Some(&make_squat_pose(0.0)), FPS).unwrap();
        assert_eq!(state.status, "Calibrated");
        assert!(detector.is_calibrated());
        assert!(detector.baseline().is_some());
    }

    #[test]
    fn test_waiting_for_pose_before_calibration() {
        let mut detector = IncrementalDetector::new();
        let state = detector.push(0, None, FPS).unwrap();
        assert_eq!(state.status, "Waiting for pose");
        // しゃがんだままのフレームもカウントされない
        let state = detector
            .push(1, Some(&make_squat_pose(1.0)), FPS)
            .unwrap();
        assert!(state.status.starts_with("Calibrating 0/"));
        assert!(!detector.is_calibrated());
    }

    #[test]
    fn test_counts_five_reps() {
        let mut detector = IncrementalDetector::new();
        let series = make_squat_series(12, 20, 5, 12);
        let states = run_series(&mut detector, &series);
        assert_eq!(detector.rep_count(), 5, "statuses: {:?}", states.iter().map(|s| s.status.clone()).collect::<Vec<_>>());
        assert_eq!(detector.reps().len(), 5);

        // 確定フレームの状態にレップ記録が載る
        let confirmed: Vec<&LiveState> = states.iter().filter(|s| s.rep.is_some()).collect();
        assert_eq!(confirmed.len(), 5);
        for (i, state) in confirmed.iter().enumerate() {
            assert_eq!(state.status, format!("Rep {} confirmed", i + 1));
        }

        // レップ列は順序どおりで、ボトムは区間内にある
        for rep in detector.reps() {
            assert!(rep.start_frame < rep.bottom_frame);
            assert!(rep.bottom_frame < rep.end_frame);
            assert!(rep.metrics.knee_flexion_deg.unwrap() > 90.0);
            assert!(!rep.needs_review);
        }
    }

    #[test]
    fn test_live_matches_batch_count() {
        let series = make_squat_series(12, 20, 5, 12);
        let (batch_reps, _) = crate::reps::detect_reps(&series, FPS, &Config::default());

        let mut detector = IncrementalDetector::new();
        run_series(&mut detector, &series);
        let live_count = detector.rep_count() as i64;
        let batch_count = batch_reps.len() as i64;
        assert!(
            (live_count - batch_count).abs() <= 1,
            "live {} vs batch {}",
            live_count,
            batch_count
        );
    }

    #[test]
    fn test_min_gap_drops_close_reps() {
        let mut config = Config::default();
        config.detector.min_frames_between_reps = 10_000;
        let mut detector = IncrementalDetector::from_config(&config);
        let series = make_squat_series(12, 20, 5, 12);
        run_series(&mut detector, &series);
        // 2本目以降は前回の確定端に近すぎて黙って捨てられる
        assert_eq!(detector.rep_count(), 1);
    }

    #[test]
    fn test_reset_then_replay_reproduces_count() {
        let mut detector = IncrementalDetector::new();
        let series = make_squat_series(12, 20, 3, 12);
        run_series(&mut detector, &series);
        let first_count = detector.rep_count();
        assert!(first_count > 0);

        detector.reset();
        assert_eq!(detector.rep_count(), 0);
        assert!(!detector.is_calibrated());
        assert!(detector.reps().is_empty());

        run_series(&mut detector, &series);
        assert_eq!(detector.rep_count(), first_count);
    }

    #[test]
    fn test_non_monotonic_frame_index_rejected() {
        let mut detector = IncrementalDetector::new();
        detector.push(5, Some(&make_squat_pose(0.0)), FPS).unwrap();
        assert!(detector.push(5, Some(&make_squat_pose(0.0)), FPS).is_err());
        assert!(detector.push(3, Some(&make_squat_pose(0.0)), FPS).is_err());
        // 正しい順なら続行できる
        assert!(detector.push(6, Some(&make_squat_pose(0.0)), FPS).is_ok());
    }

    #[test]
    fn test_short_dropout_is_bridged() {
        let mut detector = IncrementalDetector::new();
        let mut series = make_squat_series(12, 20, 5, 12);
        // 2サイクル目の途中で3フレーム検出が落ちる
        for idx in 60..63 {
            series[idx] = None;
        }
        let states = run_series(&mut detector, &series);
        assert_eq!(detector.rep_count(), 5);
        assert_eq!(states[60].status, "No pose");
        assert_eq!(states[60].metrics.knee_flexion_deg, None);
    }

    #[test]
    fn test_long_pose_loss_abandons_rep_in_progress() {
        let mut detector = IncrementalDetector::new();
        let mut series: Vec<Option<KeypointSet>> = Vec::new();
        for _ in 0..12 {
            series.push(Some(make_squat_pose(0.0)));
        }
        // 下降してボトムに入ったところでトラッキングが長時間切れる
        for i in 1..=20 {
            series.push(Some(make_squat_pose(i as f32 / 20.0)));
        }
        for _ in 0..40 {
            series.push(None);
        }
        // 復帰したときにはもう立っている
        for _ in 0..20 {
            series.push(Some(make_squat_pose(0.0)));
        }
        run_series(&mut detector, &series);
        assert_eq!(detector.rep_count(), 0);
        assert_eq!(detector.phase(), Phase::TopReady);
    }

    #[test]
    fn test_speed_proxy_carries_last_rep() {
        let mut detector = IncrementalDetector::new();
        let series = make_squat_series(12, 20, 2, 12);
        let states = run_series(&mut detector, &series);
        let first_confirm = states.iter().position(|s| s.rep.is_some()).unwrap();
        assert!(states[first_confirm].speed_proxy.is_some());
        // 確定後のフレームも直近レップの速度を持ち続ける
        assert!(states[first_confirm + 1].speed_proxy.is_some());
        for state in &states[..first_confirm] {
            assert_eq!(state.speed_proxy, None);
        }
    }

    #[test]
    fn test_phases_progress_through_cycle() {
        let mut detector = IncrementalDetector::new();
        let series = make_squat_series(12, 20, 1, 12);
        let states = run_series(&mut detector, &series);
        let saw: Vec<Phase> = states.iter().map(|s| s.phase).collect();
        assert!(saw.contains(&Phase::Descent));
        assert!(saw.contains(&Phase::Bottom));
        assert!(saw.contains(&Phase::Ascent));
        assert_eq!(*saw.last().unwrap(), Phase::TopReady);
    }
}
