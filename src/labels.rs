// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! YOLO 标签格式: 每行 `class_id cx cy w h`, 坐标相对图像宽高归一化, 6 位小数

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::geometry::Rect;

/// 标签类别 (当前只有单类 person)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelClass {
    Person,
}

impl LabelClass {
    pub const fn id(self) -> u32 {
        match self {
            LabelClass::Person => 0,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            LabelClass::Person => "person",
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(LabelClass::Person),
            _ => None,
        }
    }
}

/// person 类别 ID
pub const PERSON_CLASS_ID: u32 = LabelClass::Person.id();

/// 训练数据集的类别名列表
pub const CLASS_NAMES: [&str; 1] = [LabelClass::Person.name()];

/// 归一化框 (class_id, cx, cy, w, h)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub class_id: u32,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl NormalizedBox {
    /// 绝对像素矩形 → 归一化框, 四个几何字段夹到 [0, 1]
    pub fn from_rect(rect: &Rect, img_w: u32, img_h: u32, class: LabelClass) -> Self {
        let (iw, ih) = (img_w as f32, img_h as f32);
        let (cx, cy) = rect.center();
        Self {
            class_id: class.id(),
            cx: (cx / iw).clamp(0.0, 1.0),
            cy: (cy / ih).clamp(0.0, 1.0),
            w: (rect.width() / iw).clamp(0.0, 1.0),
            h: (rect.height() / ih).clamp(0.0, 1.0),
        }
    }
}

impl fmt::Display for NormalizedBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.cx, self.cy, self.w, self.h
        )
    }
}

/// 单张图片的标签记录
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelRecord {
    boxes: Vec<NormalizedBox>,
}

impl LabelRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次编码一组绝对坐标框 (顺序即写出顺序)
    pub fn from_rects<'a>(
        rects: impl IntoIterator<Item = &'a Rect>,
        img_w: u32,
        img_h: u32,
    ) -> Self {
        let boxes = rects
            .into_iter()
            .map(|r| NormalizedBox::from_rect(r, img_w, img_h, LabelClass::Person))
            .collect();
        Self { boxes }
    }

    pub fn push(&mut self, b: NormalizedBox) {
        self.boxes.push(b);
    }

    pub fn boxes(&self) -> &[NormalizedBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// 写入标签文件; 空记录不允许落盘
    pub fn write(&self, path: &Path) -> Result<()> {
        if self.is_empty() {
            bail!("refusing to write empty label file {}", path.display());
        }
        fs::write(path, self.to_string())
            .with_context(|| format!("failed to write label file {}", path.display()))
    }

    /// 解析标签文本, 空行忽略
    pub fn parse(text: &str) -> Result<Self> {
        let mut record = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 5 {
                bail!(
                    "line {}: expected 5 fields, got {}",
                    lineno + 1,
                    fields.len()
                );
            }
            let class_id: u32 = fields[0]
                .parse()
                .with_context(|| format!("line {}: bad class id", lineno + 1))?;
            let mut xs = [0f32; 4];
            for (slot, raw) in xs.iter_mut().zip(&fields[1..]) {
                *slot = raw
                    .parse()
                    .with_context(|| format!("line {}: bad coordinate {:?}", lineno + 1, raw))?;
            }
            record.push(NormalizedBox {
                class_id,
                cx: xs[0],
                cy: xs[1],
                w: xs[2],
                h: xs[3],
            });
        }
        Ok(record)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read label file {}", path.display()))?;
        Self::parse(&text)
    }
}

impl fmt::Display for LabelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.boxes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", b)?;
        }
        Ok(())
    }
}
