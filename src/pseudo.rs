// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 伪标签生成 (Frame Label Assembler)
//!
//! 逐帧顺序处理: 解码 → 检测 → 座位合成框 → 合并 → 归一化 → 写出。
//! 单帧失败就地跳过, 只有"一帧都没有"会中止整次运行。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::DatasetLayout;
use crate::detection::PersonDetector;
use crate::error::DatasetError;
use crate::gen_time_string;
use crate::geometry::Rect;
use crate::labels::LabelRecord;
use crate::seats::{SeatSource, Synthesizer};
use crate::utils::{copy_into, file_stem, list_files, stems_in, FRAME_EXTENSIONS};

/// 运行摘要, 结束时一次性写入 `pseudo_summary.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub images_written: usize,
    pub det_boxes_total: usize,
    pub synth_boxes_total: usize,
    pub conf: f32,
    pub model: String,
    pub generated_at: String,
}

/// 单帧处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Written { det: usize, synth: usize },
    SkippedManual,
    SkippedDecode,
    SkippedEmpty,
}

/// 一帧合并后的框: 检测框在前, 合成框在后
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameBoxes {
    pub detections: Vec<Rect>,
    pub synthesized: Vec<Rect>,
}

impl FrameBoxes {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty() && self.synthesized.is_empty()
    }

    pub fn to_record(&self, width: u32, height: u32) -> LabelRecord {
        LabelRecord::from_rects(
            self.detections.iter().chain(&self.synthesized),
            width,
            height,
        )
    }
}

pub struct PseudoLabeler<D: PersonDetector> {
    detector: D,
    seats: Option<Box<dyn SeatSource>>,
    synthesizer: Synthesizer,
    layout: DatasetLayout,
    conf: f32,
    max_images: usize,
    manual_stems: HashSet<String>,
}

impl<D: PersonDetector> PseudoLabeler<D> {
    pub fn new(detector: D, layout: DatasetLayout, conf: f32) -> Self {
        Self {
            detector,
            seats: None,
            synthesizer: Synthesizer::default(),
            layout,
            conf,
            max_images: 0,
            manual_stems: HashSet::new(),
        }
    }

    pub fn with_seat_source(mut self, source: impl SeatSource + 'static) -> Self {
        self.seats = Some(Box::new(source));
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Synthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// 最多写出的图片数, 0 表示不限
    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// 检测框 + 合成框, 不做任何写入
    pub fn label_boxes(&mut self, stem: &str, image: &image::DynamicImage) -> FrameBoxes {
        let (width, height) = (image.width(), image.height());
        let detections = match self.detector.detect(image, self.conf) {
            Ok(rects) => rects.into_iter().filter(Rect::is_valid).collect(),
            Err(e) => {
                warn!("detector failed on {}: {:#}, treated as no detections", stem, e);
                Vec::new()
            }
        };

        let synthesized = match self.seats.as_ref().and_then(|s| s.load(stem)) {
            Some(frame) => self
                .synthesizer
                .synthesize(width, height, &detections, &frame.seats),
            None => Vec::new(),
        };

        FrameBoxes {
            detections,
            synthesized,
        }
    }

    /// 处理一帧; 只有写文件失败会返回错误
    pub fn process_frame(&mut self, path: &Path) -> Result<FrameOutcome> {
        let Some(stem) = file_stem(path) else {
            return Ok(FrameOutcome::SkippedDecode);
        };
        if self.manual_stems.contains(&stem) {
            return Ok(FrameOutcome::SkippedManual);
        }

        let image = match image::open(path) {
            Ok(image) => image,
            Err(e) => {
                debug!("skip {}: decode failed: {}", path.display(), e);
                return Ok(FrameOutcome::SkippedDecode);
            }
        };

        let boxes = self.label_boxes(&stem, &image);
        if boxes.is_empty() {
            debug!("skip {}: no boxes", stem);
            return Ok(FrameOutcome::SkippedEmpty);
        }

        // 先写标签再复制图片, 保证 images_pseudo 里不会出现无标签图片
        let record = boxes.to_record(image.width(), image.height());
        let label_path = self.layout.labels_pseudo().join(format!("{stem}.txt"));
        record.write(&label_path)?;
        if let Err(e) = copy_into(path, &self.layout.images_pseudo()) {
            let _ = fs::remove_file(&label_path);
            return Err(e);
        }

        Ok(FrameOutcome::Written {
            det: boxes.detections.len(),
            synth: boxes.synthesized.len(),
        })
    }

    /// 处理目录下全部候选帧并写出摘要
    pub fn run(&mut self, frames_dir: &Path) -> Result<RunSummary> {
        let images = list_files(frames_dir, &FRAME_EXTENSIONS)?;
        if images.is_empty() {
            return Err(DatasetError::NoFrames(frames_dir.to_path_buf()).into());
        }
        for dir in [self.layout.images_pseudo(), self.layout.labels_pseudo()] {
            fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        }
        self.manual_stems = stems_in(&self.layout.labels_manual(), "txt")?;
        info!(
            "🔍 {} candidate frames, {} manually labeled",
            images.len(),
            self.manual_stems.len()
        );

        let mut summary = RunSummary {
            images_written: 0,
            det_boxes_total: 0,
            synth_boxes_total: 0,
            conf: self.conf,
            model: self.detector.name().to_string(),
            generated_at: String::new(),
        };
        let mut skipped = [0usize; 3];

        for img_path in &images {
            if self.max_images > 0 && summary.images_written >= self.max_images {
                info!("reached --max-images {}", self.max_images);
                break;
            }
            match self.process_frame(img_path) {
                Ok(FrameOutcome::Written { det, synth }) => {
                    summary.images_written += 1;
                    summary.det_boxes_total += det;
                    summary.synth_boxes_total += synth;
                }
                Ok(FrameOutcome::SkippedManual) => skipped[0] += 1,
                Ok(FrameOutcome::SkippedDecode) => skipped[1] += 1,
                Ok(FrameOutcome::SkippedEmpty) => skipped[2] += 1,
                Err(e) => warn!("failed to write outputs for {}: {:#}", img_path.display(), e),
            }
        }
        info!(
            "skipped: {} manual, {} undecodable, {} without boxes",
            skipped[0], skipped[1], skipped[2]
        );

        summary.generated_at = gen_time_string("-");
        write_summary(&self.layout.pseudo_summary(), &summary)?;
        info!("Pseudo labeling summary: {:?}", summary);
        Ok(summary)
    }
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}
