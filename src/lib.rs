// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod annotate; // 叠加绘制
pub mod config; // 配置参数
pub mod input; // 视频输入系统
pub mod labels; // COCO 类别标签
pub mod models; // 模型接口与具体实现
pub mod playback; // 播放控制器

pub mod ort_backend;

pub use crate::config::{Args, CoordSpace, ScorePolicy};
pub use crate::input::{DecodedFrame, VideoEvent, VideoSource};
pub use crate::labels::COCO_CLASSES;
pub use crate::models::{YOLOv8, YOLOv8Decoder};
pub use crate::ort_backend::OrtBackend;
pub use crate::playback::{PlaybackState, Player};

/// Greedy non-maximum suppression over one frame's candidates.
///
/// Candidates below `conf_threshold` are dropped first, the rest are
/// stable-sorted by confidence descending (ties keep tensor row order), then
/// each surviving box suppresses every later box overlapping it by more than
/// `iou_threshold`. Runs fresh per frame; no state is carried across calls.
pub fn non_max_suppression(xs: &mut Vec<Bbox>, conf_threshold: f32, iou_threshold: f32) {
    xs.retain(|b| b.confidence() > conf_threshold);
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

/// A bounding box around one detected object, in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
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

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        self.intersection_area(another) / self.union(another)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxes_equal(a: &[Bbox], b: &[Bbox]) -> bool {
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = Bbox::new(10.0, 10.0, 50.0, 40.0, 0, 0.9);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.9);
        let b = Bbox::new(100.0, 100.0, 10.0, 10.0, 0, 0.8);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn nms_keeps_higher_confidence_of_overlapping_pair() {
        // vertical offset of 11px on 100x100 boxes -> IoU = 89/111 ≈ 0.80
        let hi = Bbox::new(0.0, 0.0, 100.0, 100.0, 2, 0.9);
        let lo = Bbox::new(0.0, 11.0, 100.0, 100.0, 2, 0.6);
        assert!(hi.iou(&lo) > 0.45);

        let mut xs = vec![lo, hi.clone()];
        non_max_suppression(&mut xs, 0.25, 0.45);
        assert_eq!(xs.len(), 1);
        assert_eq!(xs[0], hi);
    }

    #[test]
    fn nms_is_idempotent() {
        let mut xs = vec![
            Bbox::new(0.0, 0.0, 100.0, 100.0, 0, 0.9),
            Bbox::new(5.0, 5.0, 100.0, 100.0, 0, 0.8),
            Bbox::new(300.0, 300.0, 50.0, 50.0, 1, 0.7),
            Bbox::new(305.0, 300.0, 50.0, 50.0, 1, 0.65),
        ];
        non_max_suppression(&mut xs, 0.25, 0.45);
        let once = xs.clone();
        non_max_suppression(&mut xs, 0.25, 0.45);
        assert!(boxes_equal(&once, &xs));
    }

    #[test]
    fn nms_survivors_do_not_overlap_above_threshold() {
        let mut xs = vec![
            Bbox::new(0.0, 0.0, 100.0, 100.0, 0, 0.9),
            Bbox::new(10.0, 0.0, 100.0, 100.0, 0, 0.85),
            Bbox::new(20.0, 0.0, 100.0, 100.0, 0, 0.8),
            Bbox::new(200.0, 0.0, 100.0, 100.0, 0, 0.7),
        ];
        non_max_suppression(&mut xs, 0.25, 0.45);
        for i in 0..xs.len() {
            for j in (i + 1)..xs.len() {
                assert!(xs[i].iou(&xs[j]) <= 0.45);
            }
        }
    }

    #[test]
    fn nms_on_empty_input_is_empty() {
        let mut xs: Vec<Bbox> = Vec::new();
        non_max_suppression(&mut xs, 0.25, 0.45);
        assert!(xs.is_empty());
    }

    #[test]
    fn nms_reapplies_confidence_threshold() {
        let mut xs = vec![
            Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.2),
            Bbox::new(50.0, 50.0, 10.0, 10.0, 0, 0.5),
        ];
        non_max_suppression(&mut xs, 0.25, 0.45);
        assert_eq!(xs.len(), 1);
        assert!((xs[0].confidence() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn nms_breaks_confidence_ties_by_original_order() {
        let first = Bbox::new(0.0, 0.0, 100.0, 100.0, 0, 0.8);
        let second = Bbox::new(5.0, 0.0, 100.0, 100.0, 0, 0.8);
        let mut xs = vec![first.clone(), second];
        non_max_suppression(&mut xs, 0.25, 0.45);
        assert_eq!(xs.len(), 1);
        assert_eq!(xs[0], first);
    }
}
