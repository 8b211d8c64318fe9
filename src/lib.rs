// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 命令行参数与合成框参数
pub mod dataset; // 目录约定与训练/验证划分
pub mod detection; // 检测器边界与检测框
pub mod error;
pub mod geometry; // 矩形/多边形/IoU
pub mod labels; // YOLO 标签文件
pub mod models; // 模型接口与具体实现
pub mod ort_backend;
pub mod pseudo; // 伪标签生成
pub mod sampler; // 分层抽帧
pub mod seats; // 座位状态 → 合成框
pub mod trainer; // 外部训练器驱动
pub mod utils;

pub use crate::config::{
    CheckOnnxArgs, DetectorConfig, PseudoLabelArgs, SelectFramesArgs, SynthConfig, TrainArgs,
};
pub use crate::detection::{Bbox, PersonDetector, YoloPersonDetector};
pub use crate::error::{DatasetError, GeometryError};
pub use crate::geometry::{Polygon, Rect};
pub use crate::labels::{LabelRecord, NormalizedBox};
pub use crate::models::{Model, YOLOv8};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};

use tracing_subscriber::EnvFilter;

/// 默认日志过滤, 可用 `RUST_LOG` 覆盖
pub const DEFAULT_LOG_FILTER: &str = "info,ort=warn";

/// 初始化日志 (每个可执行文件调用一次)
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // 重复初始化 (如测试中) 忽略即可
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
