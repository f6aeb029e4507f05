pub mod keypoint;
pub mod smooth;

pub use keypoint::{KeypointSet, LandmarkIndex, Point};
pub use smooth::KeypointSmoother;
