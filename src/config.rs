use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    /// パラレル判定の膝屈曲閾値（度）
    #[serde(default = "default_parallel_flexion")]
    pub parallel_flexion_deg: f32,
    /// 立位とみなす膝屈曲上限（度）
    #[serde(default = "default_standing_ceiling")]
    pub standing_flexion_ceiling_deg: f32,
    /// 許容する前傾角の上限（度）
    #[serde(default = "default_max_trunk")]
    pub max_trunk_angle_deg: f32,
    /// ベースラインに上乗せして許容する前傾角（度）
    #[serde(default = "default_trunk_delta")]
    pub trunk_delta_deg: f32,
    /// 足部ベース幅に対するバランス許容マージン（比率）
    #[serde(default = "default_balance_margin")]
    pub balance_margin: f32,
    /// この信頼度未満のレップはneeds_review扱い
    #[serde(default = "default_review_floor")]
    pub review_confidence_floor: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// キャリブレーションに使う立位フレーム数
    #[serde(default = "default_calibration_frames")]
    pub calibration_frames: usize,
    /// ライブ検出のローリングウィンドウ長（フレーム）
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// 確定レップ間に要求する最小フレーム間隔
    #[serde(default = "default_min_frames_between_reps")]
    pub min_frames_between_reps: u64,
    /// バッチ検出の極値間最小距離（フレーム）
    #[serde(default = "default_min_peak_distance")]
    pub min_peak_distance: usize,
    /// キーポイントEMA平滑化係数
    #[serde(default = "default_smooth_alpha")]
    pub smooth_alpha: f32,
}

fn default_parallel_flexion() -> f32 { 90.0 }
fn default_standing_ceiling() -> f32 { 35.0 }
fn default_max_trunk() -> f32 { 50.0 }
fn default_trunk_delta() -> f32 { 20.0 }
fn default_balance_margin() -> f32 { 0.05 }
fn default_review_floor() -> f32 { 0.6 }
fn default_calibration_frames() -> usize { 10 }
fn default_window_size() -> usize { 60 }
fn default_min_frames_between_reps() -> u64 { 6 }
fn default_min_peak_distance() -> usize { 10 }
fn default_smooth_alpha() -> f32 { 0.4 }

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            parallel_flexion_deg: default_parallel_flexion(),
            standing_flexion_ceiling_deg: default_standing_ceiling(),
            max_trunk_angle_deg: default_max_trunk(),
            trunk_delta_deg: default_trunk_delta(),
            balance_margin: default_balance_margin(),
            review_confidence_floor: default_review_floor(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            calibration_frames: default_calibration_frames(),
            window_size: default_window_size(),
            min_frames_between_reps: default_min_frames_between_reps(),
            min_peak_distance: default_min_peak_distance(),
            smooth_alpha: default_smooth_alpha(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 設定ファイルが無い・壊れている場合はデフォルトを返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = Config::default();
        assert_eq!(config.metrics.parallel_flexion_deg, 90.0);
        assert_eq!(config.metrics.max_trunk_angle_deg, 50.0);
        assert_eq!(config.detector.calibration_frames, 10);
        assert_eq!(config.detector.window_size, 60);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [detector]
            window_size = 90
            "#,
        )
        .unwrap();
        assert_eq!(config.detector.window_size, 90);
        assert_eq!(config.detector.calibration_frames, 10);
        assert_eq!(config.metrics.standing_flexion_ceiling_deg, 35.0);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.detector.min_frames_between_reps, 6);
        assert_eq!(config.metrics.balance_margin, 0.05);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let config = Config::load_or_default("/nonexistent/squat-tracker.toml");
        assert_eq!(config.detector.window_size, 60);
    }
}
