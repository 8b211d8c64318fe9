// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型实现
// 包含: 模型加载、预处理、推理、后处理

use anyhow::{bail, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::{s, Array, Axis, IxDyn};
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::detection::types::{non_max_suppression, Bbox};
use crate::{OrtBackend, OrtConfig, OrtEP};

/// YOLOv8 输出前 4 个通道为 cx, cy, w, h
const CXYWH_OFFSET: usize = 4;

/// letterbox 填充灰度
const PAD_VALUE: f32 = 114.0 / 255.0;

/// YOLOv8 检测模型结构
pub struct YOLOv8 {
    engine: OrtBackend,
    height: u32,
    width: u32,
    conf: f32,
    iou: f32,
    /// 只保留这些类别, None 表示全部
    classes: Option<Vec<usize>>,
    profile: bool,
}

impl YOLOv8 {
    /// 从配置创建 YOLOv8 模型
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        // execution provider
        let ep = if config.cuda {
            OrtEP::CUDA(config.device_id)
        } else {
            OrtEP::CPU
        };

        let engine = OrtBackend::build(OrtConfig {
            f: config.model.clone(),
            ep,
            image_size: config.imgsz,
            intra_threads: config.intra_threads,
        })?;
        let (height, width) = (engine.height(), engine.width());

        Ok(Self {
            engine,
            height,
            width,
            conf: config.conf,
            iou: config.iou,
            classes: None,
            profile: config.profile,
        })
    }

    pub fn set_conf(&mut self, conf: f32) {
        self.conf = conf;
    }

    /// 限定输出类别 (如只保留 person)
    pub fn with_classes(mut self, classes: Vec<usize>) -> Self {
        self.classes = Some(classes);
        self
    }
}

/// 等比缩放: 返回 (比例, 新宽, 新高)
fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// 解码单张图片的预测 [4 + nc, anchors] → 原图坐标框 (未做 NMS)
fn decode_predictions(
    anchor: ndarray::ArrayView2<f32>,
    img_wh: (f32, f32),
    input_wh: (f32, f32),
    conf: f32,
    classes: Option<&[usize]>,
) -> Vec<Bbox> {
    let (width_original, height_original) = img_wh;
    let nc = anchor.shape()[0] - CXYWH_OFFSET;
    let ratio = (input_wh.0 / width_original).min(input_wh.1 / height_original);

    let mut data = Vec::new();
    for pred in anchor.axis_iter(Axis(1)) {
        let bbox = pred.slice(s![0..CXYWH_OFFSET]);
        let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

        let Some((id, &confidence)) = clss
            .iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };

        if confidence < conf || classes.is_some_and(|cs| !cs.contains(&id)) {
            continue;
        }

        let cx = bbox[0] / ratio;
        let cy = bbox[1] / ratio;
        let w = bbox[2] / ratio;
        let h = bbox[3] / ratio;
        let x1 = (cx - w / 2.).clamp(0.0, width_original);
        let y1 = (cy - h / 2.).clamp(0.0, height_original);
        let x2 = (cx + w / 2.).clamp(0.0, width_original);
        let y2 = (cy + h / 2.).clamp(0.0, height_original);
        data.push(Bbox::new(x1, y1, x2 - x1, y2 - y1, id, confidence));
    }
    data
}

impl crate::models::Model for YOLOv8 {
    /// 等比缩放后贴到左上角, 其余填充灰色
    fn preprocess(&mut self, xs: &[DynamicImage]) -> Result<Array<f32, IxDyn>> {
        let mut ys =
            Array::ones((xs.len(), 3, self.height as usize, self.width as usize)).into_dyn();
        ys.fill(PAD_VALUE);
        for (idx, x) in xs.iter().enumerate() {
            let (w0, h0) = x.dimensions();
            let (_, w_new, h_new) = scale_wh(
                w0 as f32,
                h0 as f32,
                self.width as f32,
                self.height as f32,
            );
            let img = x
                .resize_exact(
                    w_new as u32,
                    h_new as u32,
                    image::imageops::FilterType::Triangle,
                )
                .to_rgb8();

            for (x, y, rgb) in img.enumerate_pixels() {
                let x = x as usize;
                let y = y as usize;
                let [r, g, b] = rgb.0;
                ys[[idx, 0, y, x]] = (r as f32) / 255.0;
                ys[[idx, 1, y, x]] = (g as f32) / 255.0;
                ys[[idx, 2, y, x]] = (b as f32) / 255.0;
            }
        }

        Ok(ys)
    }

    fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        self.engine.run(xs, profile || self.profile)
    }

    /// 输出形状 [batch, 4 + nc, anchors]
    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<Vec<Bbox>>> {
        let Some(preds) = xs.first() else {
            bail!("model produced no outputs");
        };
        if preds.ndim() != 3 || preds.shape()[1] <= CXYWH_OFFSET {
            bail!("unexpected YOLOv8 output shape {:?}", preds.shape());
        }
        let mut ys = Vec::new();
        for (idx, anchor) in preds.axis_iter(Axis(0)).enumerate() {
            let Some(img0) = xs0.get(idx) else { break };
            let anchor = anchor.into_dimensionality::<ndarray::Ix2>()?;
            let mut data = decode_predictions(
                anchor,
                (img0.width() as f32, img0.height() as f32),
                (self.width as f32, self.height as f32),
                self.conf,
                self.classes.as_deref(),
            );

            non_max_suppression(&mut data, self.iou);
            debug!("image {}: {} boxes after NMS", idx, data.len());
            ys.push(data);
        }
        Ok(ys)
    }

    fn summary(&self) {
        info!(
            "YOLOv8: input {}x{}, conf {:.2}, iou {:.2}, ep {:?}",
            self.width,
            self.height,
            self.conf,
            self.iou,
            self.engine.ep()
        );
    }
}
