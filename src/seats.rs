// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 座位状态 → 合成 person 框 (Scheme B)
//!
//! 座位被判定为占用但检测器没有给出重叠框时, 用座位多边形的外接矩形
//! (向内收缩后) 代替一个 person 框。

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::config::SynthConfig;
use crate::geometry::{bounding_rect, overlaps_any, Polygon, Rect};

/// 座位占用状态
///
/// 未知字符串一律映射为 `Other`, 不参与合成。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatStatus {
    Occupied,
    ObjectOnly,
    Object,
    Other,
}

impl SeatStatus {
    /// 不区分大小写
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "occupied" => SeatStatus::Occupied,
            "object_only" => SeatStatus::ObjectOnly,
            "object" => SeatStatus::Object,
            _ => SeatStatus::Other,
        }
    }

    pub fn synthesis_eligible(self) -> bool {
        match self {
            SeatStatus::Occupied | SeatStatus::ObjectOnly | SeatStatus::Object => true,
            SeatStatus::Other => false,
        }
    }
}

/// 单个座位在某一帧的状态
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeatState {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub seat_poly: Option<Polygon>,
    /// 旧格式字段名
    #[serde(default)]
    pub poly: Option<Polygon>,
}

impl SeatState {
    pub fn new(state: &str, polygon: Polygon) -> Self {
        Self {
            state: Some(state.to_string()),
            seat_poly: Some(polygon),
            poly: None,
        }
    }

    pub fn status(&self) -> SeatStatus {
        SeatStatus::parse(self.state.as_deref().unwrap_or(""))
    }

    /// `seat_poly` 优先, 为空时回退到 `poly`
    pub fn polygon(&self) -> Option<&Polygon> {
        [self.seat_poly.as_ref(), self.poly.as_ref()]
            .into_iter()
            .flatten()
            .find(|p| !p.is_empty())
    }
}

/// 每帧一个座位状态文件: `{"seats": [...]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeatFrame {
    #[serde(default)]
    pub seats: Vec<SeatState>,
}

/// 座位状态来源, 按帧 stem 查询
pub trait SeatSource {
    /// 缺失或损坏都返回 None
    fn load(&self, stem: &str) -> Option<SeatFrame>;
}

/// 目录下的 `<stem>.json` 文件
#[derive(Debug, Clone)]
pub struct SeatJsonDir {
    dir: PathBuf,
}

impl SeatJsonDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SeatSource for SeatJsonDir {
    fn load(&self, stem: &str) -> Option<SeatFrame> {
        let path = self.dir.join(format!("{stem}.json"));
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                debug!("no seat data for {}: {}", stem, e);
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!("malformed seat data {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// 座位占用 → 合成框
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    config: SynthConfig,
}

impl Synthesizer {
    pub fn new(config: SynthConfig) -> Self {
        Self { config }
    }

    /// 单个座位的候选框; 不合格、退化或已被检测覆盖时返回 None
    pub fn synthesize_seat(
        &self,
        width: u32,
        height: u32,
        detections: &[Rect],
        seat: &SeatState,
    ) -> Option<Rect> {
        if !seat.status().synthesis_eligible() {
            return None;
        }
        let raw = bounding_rect(seat.polygon()?).ok()?;
        let rect = raw.shrink(self.config.shrink).clamp_to(width, height);
        if !rect.is_valid() {
            return None;
        }
        if overlaps_any(&rect, detections, self.config.suppress_iou) {
            return None;
        }
        Some(rect)
    }

    /// 一帧的全部合成框, 保持座位顺序
    pub fn synthesize(
        &self,
        width: u32,
        height: u32,
        detections: &[Rect],
        seats: &[SeatState],
    ) -> Vec<Rect> {
        seats
            .iter()
            .filter_map(|seat| self.synthesize_seat(width, height, detections, seat))
            .collect()
    }
}
