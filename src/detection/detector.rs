// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器 (Detector)
//! 职责: 图片 → YOLO检测 → person 框 (原图像素坐标)

use std::time::Instant;

use anyhow::Result;
use image::DynamicImage;
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::geometry::Rect;
use crate::labels::PERSON_CLASS_ID;
use crate::models::{Model, YOLOv8};

/// 检测器边界
///
/// 同步调用, 每张图片一次; 返回的框只包含 person 类别。
pub trait PersonDetector {
    fn detect(&mut self, image: &DynamicImage, conf: f32) -> Result<Vec<Rect>>;

    /// 写入运行摘要的检测器标识
    fn name(&self) -> &str;
}

pub struct YoloPersonDetector {
    model: YOLOv8,
    name: String,

    // 统计
    count: u64,
    total_ms: f64,
}

impl YoloPersonDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let model = YOLOv8::new(config)?.with_classes(vec![PERSON_CLASS_ID as usize]);
        model.summary();
        info!("✅ 检测模型加载成功: {}", config.model);
        Ok(Self {
            model,
            name: config.model.clone(),
            count: 0,
            total_ms: 0.0,
        })
    }

    /// 平均单张耗时 (毫秒)
    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

impl PersonDetector for YoloPersonDetector {
    fn detect(&mut self, image: &DynamicImage, conf: f32) -> Result<Vec<Rect>> {
        let start = Instant::now();
        self.model.set_conf(conf);

        let results = self.model.forward(std::slice::from_ref(image))?;
        let rects: Vec<Rect> = results
            .into_iter()
            .flatten()
            .filter(|b| b.id() == PERSON_CLASS_ID as usize && b.confidence() >= conf)
            .map(|b| b.to_rect())
            .filter(Rect::is_valid)
            .collect();

        let ms = start.elapsed().as_secs_f64() * 1000.0;
        self.count += 1;
        self.total_ms += ms;
        debug!("{} person boxes in {:.1} ms", rects.len(), ms);
        Ok(rects)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
