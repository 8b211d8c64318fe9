// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 几何内核: 矩形、IoU、多边形外接矩形
//!
//! 全部为纯函数,坐标均为绝对像素坐标。

use serde::Deserialize;

use crate::error::GeometryError;

/// IoU 分母保护, 防止两个零面积框相除
pub const IOU_EPS: f32 = 1e-9;

/// 轴对齐矩形 (x1, y1, x2, y2), 绝对像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// 中心点 (cx, cy)
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// 宽高均为正才可以进入标签集
    pub fn is_valid(&self) -> bool {
        self.x2 > self.x1 && self.y2 > self.y1
    }

    /// 四边各向内收缩 `frac * 边长` (x/y 方向独立计算)
    pub fn shrink(&self, frac: f32) -> Rect {
        let dx = self.width() * frac;
        let dy = self.height() * frac;
        Rect::new(self.x1 + dx, self.y1 + dy, self.x2 - dx, self.y2 - dy)
    }

    /// 裁剪到图像范围 `[0, w-1] x [0, h-1]`
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        Rect::new(
            self.x1.max(0.0),
            self.y1.max(0.0),
            self.x2.min(max_x),
            self.y2.min(max_y),
        )
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    pub fn iou(&self, another: &Rect) -> f32 {
        iou(self, another)
    }
}

/// 座位多边形, JSON 中为 `[[x, y], ...]`
///
/// 每个顶点只取前两个数, 多余的分量 (如 `[x, y, score]`) 忽略, 不足两个的顶点丢弃。
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "Vec<Vec<f32>>")]
pub struct Polygon {
    vertices: Vec<(f32, f32)>,
}

impl From<Vec<Vec<f32>>> for Polygon {
    fn from(raw: Vec<Vec<f32>>) -> Self {
        let vertices = raw
            .iter()
            .filter_map(|p| match p.as_slice() {
                [x, y, ..] => Some((*x, *y)),
                _ => None,
            })
            .collect();
        Self { vertices }
    }
}

impl Polygon {
    pub fn new(vertices: Vec<(f32, f32)>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[(f32, f32)] {
        &self.vertices
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// 多边形的轴对齐外接矩形 (min x, min y, max x, max y)
///
/// 单个顶点得到零面积矩形, 这里不报错, 由调用方按退化框丢弃。
pub fn bounding_rect(polygon: &Polygon) -> Result<Rect, GeometryError> {
    let (&(x0, y0), rest) = polygon
        .vertices
        .split_first()
        .ok_or(GeometryError::InvalidPolygon)?;

    let rect = rest.iter().fold(Rect::new(x0, y0, x0, y0), |r, &(x, y)| {
        Rect::new(r.x1.min(x), r.y1.min(y), r.x2.max(x), r.y2.max(y))
    });
    Ok(rect)
}

/// 交并比
///
/// 交集宽或高 <= 0 (包括边界刚好相接) 时返回 0。
/// 零面积输入下 `iou(a, a)` 不等于 1。
pub fn iou(a: &Rect, b: &Rect) -> f32 {
    let inter_w = a.x2.min(b.x2) - a.x1.max(b.x1);
    let inter_h = a.y2.min(b.y2) - a.y1.max(b.y1);
    if inter_w <= 0.0 || inter_h <= 0.0 {
        return 0.0;
    }
    let inter = inter_w * inter_h;
    inter / (a.area() + b.area() - inter + IOU_EPS)
}

/// 是否与任一候选框的 IoU >= threshold (抑制判定, 命中即返回)
pub fn overlaps_any(rect: &Rect, candidates: &[Rect], threshold: f32) -> bool {
    candidates.iter().any(|c| iou(rect, c) >= threshold)
}
