// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use crate::geometry::Rect;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around an object
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    id: usize,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, id: usize, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            id,
            confidence,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// 丢弃置信度, 只保留绝对坐标
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.xmin, self.ymin, self.xmax(), self.ymax())
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        self.to_rect().iou(&another.to_rect())
    }
}

/// 按置信度降序的贪心 NMS (不区分类别)
pub fn non_max_suppression(xs: &mut Vec<Bbox>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_to_rect() {
        let b = Bbox::new(10.0, 20.0, 30.0, 40.0, 0, 0.9);
        assert_eq!(b.to_rect(), Rect::new(10.0, 20.0, 40.0, 60.0));
    }

    #[test]
    fn test_nms_keeps_highest() {
        let mut xs = vec![
            Bbox::new(0.0, 0.0, 100.0, 100.0, 0, 0.6),
            Bbox::new(5.0, 5.0, 100.0, 100.0, 0, 0.9),
            Bbox::new(300.0, 300.0, 50.0, 50.0, 0, 0.4),
        ];
        non_max_suppression(&mut xs, 0.45);
        assert_eq!(xs.len(), 2);
        assert_eq!(xs[0].confidence(), 0.9);
        assert_eq!(xs[1].confidence(), 0.4);
    }
}
