// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统 (Detection System)
///
/// 伪标签流水线只关心 person 框:
/// - PersonDetector: 检测器边界 (图片 → 绝对坐标 person 框)
/// - YoloPersonDetector: 基于 ONNX Runtime 的 YOLOv8 实现
pub mod detector;
pub mod types;

pub use detector::{PersonDetector, YoloPersonDetector};
pub use types::{non_max_suppression, Bbox};
