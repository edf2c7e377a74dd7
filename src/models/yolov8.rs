// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 完整模型实现
// 包含: 模型加载、预处理、推理、输出解码

use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use ndarray::{s, Array, ArrayView1, ArrayView2, Axis, Ix2, IxDyn};

use crate::{non_max_suppression, Bbox, CoordSpace, OrtBackend, ScorePolicy, COCO_CLASSES};

/// YOLOv8 完整模型结构
pub struct YOLOv8 {
    engine: OrtBackend,
    decoder: YOLOv8Decoder,
    size: u32,
    conf: f32,
    iou: f32,
    names: Vec<String>,
}

impl YOLOv8 {
    /// 从配置创建 YOLOv8 模型
    pub fn new(config: &crate::Args) -> Result<Self> {
        let engine = OrtBackend::build(&config.model)?;

        // class names: exporter metadata first, COCO fallback
        let names = engine
            .names()
            .unwrap_or_else(|| COCO_CLASSES.iter().map(|s| s.to_string()).collect());

        let decoder = YOLOv8Decoder::new(
            config.conf,
            config.size,
            names.len(),
            config.score_policy,
            config.coords,
            config.min_box_size,
        );

        Ok(Self {
            engine,
            decoder,
            size: config.size,
            conf: config.conf,
            iou: config.iou,
            names,
        })
    }

    /// 完整的单帧流程: preprocess → run → decode → NMS
    pub fn detect(&mut self, frame: &DynamicImage) -> Result<Vec<Bbox>> {
        let (frame_w, frame_h) = frame.dimensions();
        let xs = self.preprocess(frame);
        let ys = self.engine.run(xs)?;
        let mut bboxes = self.decoder.decode(&ys, frame_w as f32, frame_h as f32);
        non_max_suppression(&mut bboxes, self.conf, self.iou);
        if bboxes.is_empty() {
            log::debug!("no detections in this frame");
        }
        Ok(bboxes)
    }

    /// 预处理: 缩放到网络输入分辨率, NCHW, [0,1] 归一化
    ///
    /// Plain square resize (no letterboxing) — the decoder undoes it with a
    /// per-axis scale back to frame pixels.
    pub fn preprocess(&self, x: &DynamicImage) -> Array<f32, IxDyn> {
        let size = self.size as usize;
        let img = x.resize_exact(self.size, self.size, image::imageops::FilterType::Triangle);

        let mut ys = Array::zeros((1, 3, size, size)).into_dyn();
        for (x, y, rgb) in img.pixels() {
            let x = x as usize;
            let y = y as usize;
            let [r, g, b, _] = rgb.0;
            ys[[0, 0, y, x]] = (r as f32) / 255.0;
            ys[[0, 1, y, x]] = (g as f32) / 255.0;
            ys[[0, 2, y, x]] = (b as f32) / 255.0;
        }
        ys
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn conf(&self) -> f32 {
        self.conf
    }

    pub fn iou(&self) -> f32 {
        self.iou
    }

    pub fn summary(&self) {
        println!(
            "\nSummary:\n\
            > Input: {}x{}\n\
            > nc: {}, conf: {}, iou: {}\n\
            > score policy: {:?}, coords: {:?}\n\
            ",
            self.size,
            self.size,
            self.names.len(),
            self.conf,
            self.iou,
            self.decoder.policy,
            self.decoder.coords,
        );
    }
}

/// YOLOv8 输出解码器 (后处理器模式)
///
/// Turns one raw output tensor into candidate boxes in frame pixels.
/// Accepted layouts: `[1, N, A]`, `[N, A]` and the transposed `[1, A, N]`,
/// where `A = 4 + nc` class scores per row (`5 + nc` under the objectness
/// policy). Anything else decodes to zero boxes with a diagnostic instead
/// of failing the frame.
pub struct YOLOv8Decoder {
    conf: f32,
    input_size: u32,
    nc: usize,
    policy: ScorePolicy,
    coords: CoordSpace,
    min_box_size: f32,
    // one-shot: report the output layout on the first frame only
    shape_reported: bool,
}

const CXYWH_OFFSET: usize = 4;

impl YOLOv8Decoder {
    pub fn new(
        conf: f32,
        input_size: u32,
        nc: usize,
        policy: ScorePolicy,
        coords: CoordSpace,
        min_box_size: f32,
    ) -> Self {
        Self {
            conf,
            input_size,
            nc,
            policy,
            coords,
            min_box_size,
            shape_reported: false,
        }
    }

    /// Attributes per candidate row for the configured score policy.
    fn row_len(&self) -> usize {
        match self.policy {
            ScorePolicy::Objectness => CXYWH_OFFSET + 1 + self.nc,
            _ => CXYWH_OFFSET + self.nc,
        }
    }

    pub fn decode(&mut self, preds: &Array<f32, IxDyn>, frame_w: f32, frame_h: f32) -> Vec<Bbox> {
        if !self.shape_reported {
            log::info!("model output shape: {:?}", preds.shape());
            self.shape_reported = true;
        }

        // squeeze the batch axis, then orient rows = candidates
        let view = match preds.ndim() {
            3 if preds.shape()[0] == 1 => preds.index_axis(Axis(0), 0),
            2 => preds.view(),
            _ => {
                log::warn!(
                    "unexpected output tensor shape {:?}, frame yields no detections",
                    preds.shape()
                );
                return Vec::new();
            }
        };
        let table = match view.into_dimensionality::<Ix2>() {
            Ok(t) => t,
            Err(_) => return Vec::new(),
        };
        let attrs = self.row_len();
        let table: ArrayView2<f32> = if table.ncols() == attrs {
            table
        } else if table.nrows() == attrs {
            table.reversed_axes()
        } else {
            log::warn!(
                "output row length {}x{} does not match {} attributes, frame yields no detections",
                table.nrows(),
                table.ncols(),
                attrs
            );
            return Vec::new();
        };

        let base = self.coords.normalization_base(self.input_size);
        let sx = frame_w / base;
        let sy = frame_h / base;

        let mut ys = Vec::new();
        for pred in table.axis_iter(Axis(0)) {
            let (id, confidence) = match self.policy {
                ScorePolicy::RawMax => {
                    match best_class(pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + self.nc])) {
                        Some(hit) => hit,
                        None => continue,
                    }
                }
                ScorePolicy::Sigmoid => {
                    // sigmoid is monotonic, so activating after the max is
                    // the same as taking the max of activated scores
                    match best_class(pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + self.nc])) {
                        Some((id, logit)) => (id, sigmoid(logit)),
                        None => continue,
                    }
                }
                ScorePolicy::Objectness => {
                    let obj = pred[CXYWH_OFFSET];
                    if obj <= self.conf {
                        // cheap early-exit before scanning the class block
                        continue;
                    }
                    match best_class(
                        pred.slice(s![CXYWH_OFFSET + 1..CXYWH_OFFSET + 1 + self.nc]),
                    ) {
                        Some((id, cls)) => (id, obj * cls),
                        None => continue,
                    }
                }
            };

            if confidence <= self.conf {
                continue;
            }

            let cx = pred[0] * sx;
            let cy = pred[1] * sy;
            let w = (pred[2] * sx).max(0.0);
            let h = (pred[3] * sy).max(0.0);
            let left = (cx - w / 2.0).clamp(0.0, frame_w - 1.0);
            let top = (cy - h / 2.0).clamp(0.0, frame_h - 1.0);
            let w = w.min(frame_w - left);
            let h = h.min(frame_h - top);
            if w < self.min_box_size || h < self.min_box_size {
                continue;
            }

            ys.push(Bbox::new(left, top, w, h, id, confidence));
        }

        ys
    }
}

fn best_class(scores: ArrayView1<f32>) -> Option<(usize, f32)> {
    scores
        .into_iter()
        .enumerate()
        .reduce(|max, x| if x.1 > max.1 { x } else { max })
        .map(|(id, &score)| (id, score))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
