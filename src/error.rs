// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 库级错误类型
//!
//! 单张图片的失败(解码失败、座位文件缺失、退化框)在调用处就地恢复,不会出现在这里;
//! 这里只保留会让整次运行中止的全局前置条件,以及几何层的输入错误。

use std::path::PathBuf;

use thiserror::Error;

/// 几何计算错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    /// 多边形没有任何顶点
    #[error("polygon has no vertices")]
    InvalidPolygon,
}

/// 数据集准备阶段的致命错误
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("no manual images found in {0}")]
    NoManualImages(PathBuf),

    #[error("no frames found in {0}")]
    NoFrames(PathBuf),

    #[error("validation ratio must be in (0, 1), got {0}")]
    InvalidRatio(f64),

    #[error("sample count must be positive, got {0}")]
    InvalidCount(usize),
}
