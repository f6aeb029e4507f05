use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::reps::RepRecord;

/// セッションのスナップショット（レポート生成側への受け渡し形式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub reps: Vec<RepRecord>,
    pub rep_count: u32,
    pub fps_est: f32,
}

// --- Save / Load ---

pub fn save_report<P: AsRef<Path>>(path: P, report: &SessionReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).context("Failed to write session report")?;
    Ok(())
}

pub fn load_report<P: AsRef<Path>>(path: P) -> Result<SessionReport> {
    let content = fs::read_to_string(path).context("Failed to read session report")?;
    let report: SessionReport = serde_json::from_str(&content)?;
    Ok(report)
}

// --- 集計 ---

/// セッション全体の集計値
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub total_reps: usize,
    pub depth_ok_pct: f32,
    pub trunk_ok_pct: f32,
    pub balance_ok_pct: f32,
    pub form_ok_pct: f32,
    pub avg_knee_flexion_deg: Option<f32>,
    pub avg_duration_sec: Option<f32>,
    pub avg_speed_proxy: Option<f32>,
    /// 深さの変動係数。テンポ・深さのばらつき指標
    pub depth_cv: Option<f32>,
    pub speed_cv: Option<f32>,
    pub fatigue: Option<FatigueDeltas>,
}

/// 最初と最後のレップの変化率（%）。深さ・速度の低下は疲労のシグナル
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FatigueDeltas {
    pub depth_change_pct: f32,
    pub speed_change_pct: f32,
}

/// レップ一覧から集計を作る
pub fn summarize(reps: &[RepRecord]) -> SessionSummary {
    let n = reps.len();
    let count_true = |f: fn(&RepRecord) -> Option<bool>| reps.iter().filter(|r| f(r) == Some(true)).count();

    let flexions: Vec<f32> = reps.iter().filter_map(|r| r.metrics.knee_flexion_deg).collect();
    let durations: Vec<f32> = reps.iter().filter_map(|r| r.duration_sec).collect();
    let speeds: Vec<f32> = reps.iter().filter_map(|r| r.speed_proxy).collect();

    let fatigue = if n >= 2 {
        let first = &reps[0];
        let last = &reps[n - 1];
        let d0 = first.metrics.knee_flexion_deg.unwrap_or(0.0);
        let d1 = last.metrics.knee_flexion_deg.unwrap_or(0.0);
        let s0 = first.speed_proxy.unwrap_or(0.0);
        let s1 = last.speed_proxy.unwrap_or(0.0);
        Some(FatigueDeltas {
            depth_change_pct: (d1 - d0) / (d0.abs() + 1e-6) * 100.0,
            speed_change_pct: (s1 - s0) / (s0.abs() + 1e-6) * 100.0,
        })
    } else {
        None
    };

    SessionSummary {
        total_reps: n,
        depth_ok_pct: pct(count_true(|r| r.metrics.depth_ok), n),
        trunk_ok_pct: pct(count_true(|r| r.metrics.trunk_ok), n),
        balance_ok_pct: pct(count_true(|r| r.metrics.balance_ok), n),
        form_ok_pct: pct(count_true(|r| r.metrics.form_ok), n),
        avg_knee_flexion_deg: mean(&flexions),
        avg_duration_sec: mean(&durations),
        avg_speed_proxy: mean(&speeds),
        depth_cv: cv(&flexions),
        speed_cv: cv(&speeds),
        fatigue,
    }
}

fn pct(n: usize, total: usize) -> f32 {
    if total > 0 {
        n as f32 / total as f32 * 100.0
    } else {
        0.0
    }
}

fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}

/// 変動係数（標本標準偏差 / |平均|）。2サンプル未満や平均≈0はNone
fn cv(values: &[f32]) -> Option<f32> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    if m.abs() < 1e-6 {
        return None;
    }
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / (values.len() - 1) as f32;
    Some(var.sqrt() / m.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FrameMetrics;

    fn rep(
        idx: u32,
        flexion: f32,
        duration: f32,
        depth_ok: bool,
        form_ok: bool,
    ) -> RepRecord {
        let metrics = FrameMetrics {
            knee_flexion_deg: Some(flexion),
            depth_ok: Some(depth_ok),
            trunk_ok: Some(true),
            balance_ok: Some(true),
            form_ok: Some(form_ok),
            pose_confidence: 1.0,
            ..Default::default()
        };
        let start = idx as u64 * 100;
        RepRecord::new(
            idx,
            start,
            start + (duration * 20.0) as u64,
            start + 20,
            20.0,
            metrics,
            0.6,
        )
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_reps, 0);
        assert_eq!(summary.depth_ok_pct, 0.0);
        assert_eq!(summary.avg_knee_flexion_deg, None);
        assert_eq!(summary.depth_cv, None);
        assert_eq!(summary.fatigue, None);
    }

    #[test]
    fn test_single_rep_has_no_cv_or_fatigue() {
        let summary = summarize(&[rep(1, 120.0, 2.0, true, true)]);
        assert_eq!(summary.total_reps, 1);
        assert_eq!(summary.depth_ok_pct, 100.0);
        assert_eq!(summary.avg_knee_flexion_deg, Some(120.0));
        assert_eq!(summary.depth_cv, None);
        assert_eq!(summary.fatigue, None);
    }

    #[test]
    fn test_percentages_and_averages() {
        let reps = vec![
            rep(1, 120.0, 2.0, true, true),
            rep(2, 100.0, 2.0, true, false),
            rep(3, 80.0, 4.0, false, false),
        ];
        let summary = summarize(&reps);
        assert_eq!(summary.total_reps, 3);
        assert!((summary.depth_ok_pct - 66.666_67).abs() < 0.01);
        assert!((summary.form_ok_pct - 33.333_33).abs() < 0.01);
        assert_eq!(summary.avg_knee_flexion_deg, Some(100.0));
        assert!((summary.avg_duration_sec.unwrap() - 8.0 / 3.0).abs() < 1e-5);
        assert!(summary.depth_cv.unwrap() > 0.0);
    }

    #[test]
    fn test_fatigue_deltas_sign_on_decline() {
        // 深さも速度も落ちていく set: 変化率は両方マイナス
        let reps = vec![
            rep(1, 140.0, 2.0, true, true),
            rep(2, 120.0, 2.5, true, true),
            rep(3, 105.0, 4.0, true, true),
        ];
        let fatigue = summarize(&reps).fatigue.unwrap();
        assert!(fatigue.depth_change_pct < 0.0);
        assert!(fatigue.speed_change_pct < 0.0);
        assert!((fatigue.depth_change_pct - (-25.0)).abs() < 0.01);
    }

    #[test]
    fn test_report_roundtrip() {
        let report = SessionReport {
            reps: vec![rep(1, 120.0, 2.0, true, true), rep(2, 110.0, 2.2, true, true)],
            rep_count: 2,
            fps_est: 19.5,
        };
        let path = std::env::temp_dir().join("squat_tracker_report_roundtrip.json");
        save_report(&path, &report).unwrap();
        let loaded = load_report(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.rep_count, 2);
        assert_eq!(loaded.fps_est, 19.5);
        assert_eq!(loaded.reps, report.reps);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let path = std::env::temp_dir().join("squat_tracker_no_such_report.json");
        assert!(load_report(&path).is_err());
    }
}
