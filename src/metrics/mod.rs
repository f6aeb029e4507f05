pub mod baseline;
pub mod frame;
pub mod geometry;

pub use baseline::{compute_baseline, is_standing, Baseline};
pub use frame::{compute_frame_metrics, FrameMetrics};
