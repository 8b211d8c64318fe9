// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 模型统一接口与实现
//!
//! ## Model Trait
//! 统一的模型接口，定义标准流程: preprocess → run → postprocess
//!
//! ```text
//! 原始图片 → preprocess → ndarray张量
//!          ↓
//!     推理引擎 run
//!          ↓
//!     原始输出 → postprocess → 检测框
//! ```
//!
//! 目前只有 YOLOv8 检测模型 (`yolov8.rs`), 用于伪标签生成。

use anyhow::Result;
use image::DynamicImage;
use ndarray::{Array, IxDyn};

use crate::detection::types::Bbox;

pub trait Model {
    /// 预处理: 图片 → NCHW 张量
    fn preprocess(&mut self, images: &[DynamicImage]) -> Result<Array<f32, IxDyn>>;

    /// 推理: 执行模型前向传播, 返回原始输出
    fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 后处理: 原始输出 → 每张图片的检测框 (原图坐标)
    fn postprocess(&self, xs: Vec<Array<f32, IxDyn>>, xs0: &[DynamicImage])
        -> Result<Vec<Vec<Bbox>>>;

    /// 完整的推理流程: preprocess → run → postprocess
    fn forward(&mut self, images: &[DynamicImage]) -> Result<Vec<Vec<Bbox>>> {
        let xs = self.preprocess(images)?;
        let ys = self.run(xs, false)?;
        self.postprocess(ys, images)
    }

    /// 打印模型信息
    fn summary(&self);
}

pub mod yolov8;

pub use yolov8::YOLOv8;
