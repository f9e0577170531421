pub mod chart;
pub mod contours;
pub mod nms;
pub mod objects;
pub mod preprocessing;

pub use chart::{ColorChartDetector, chart_bounds};
pub use objects::ObjectDetector;
