// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};

/// How the per-row class scores are turned into a single confidence.
///
/// The three policies are mutually exclusive readings of the same tensor;
/// which one is correct is fixed by the export convention of the model in
/// use, so it is selected once at startup and never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScorePolicy {
    /// confidence = max(class scores), no activation. Ultralytics YOLOv8
    /// ONNX exports bake the sigmoid into the head, so this is the default.
    RawMax,
    /// confidence = sigmoid(max(class scores)), for heads exporting raw
    /// logits.
    Sigmoid,
    /// Row layout [cx, cy, w, h, obj, classes...]; confidence =
    /// obj * max(class scores). Rows with obj below the confidence
    /// threshold are skipped before class scoring.
    Objectness,
}

/// Coordinate space of the box parameters in the output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CoordSpace {
    /// cx/cy/w/h in network-input pixels (0..=input size).
    InputPixels,
    /// cx/cy/w/h normalized to [0, 1].
    Normalized,
}

impl CoordSpace {
    /// Divisor that maps tensor coordinates back to the unit interval.
    pub fn normalization_base(&self, input_size: u32) -> f32 {
        match self {
            CoordSpace::InputPixels => input_size as f32,
            CoordSpace::Normalized => 1.0,
        }
    }
}

/// 视频文件检测回放参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLOv8 视频文件检测回放", long_about = None)]
pub struct Args {
    /// ONNX model path
    #[arg(long, default_value = "models/yolov8n.onnx")]
    pub model: String,

    /// Video file to play back
    #[arg(long, default_value = "data/cars.mp4")]
    pub video: String,

    /// Confidence threshold
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// IoU threshold for non-maximum suppression
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Network input resolution (square)
    #[arg(long, default_value_t = 640)]
    pub size: u32,

    /// Class-score combination policy of the exported model
    #[arg(long, value_enum, default_value_t = ScorePolicy::RawMax)]
    pub score_policy: ScorePolicy,

    /// Coordinate space of the exported model's box parameters
    #[arg(long, value_enum, default_value_t = CoordSpace::InputPixels)]
    pub coords: CoordSpace,

    /// Discard boxes whose clipped width or height is below this (pixels)
    #[arg(long, default_value_t = 2.0)]
    pub min_box_size: f32,

    /// Initial playback speed multiplier
    #[arg(long, default_value_t = 0.5)]
    pub speed: f32,
}

impl Args {
    /// Basic range checks, done once at startup. Thresholds are static
    /// configuration; nothing here is revalidated per frame.
    pub fn validate(&self) -> Result<()> {
        if !std::path::Path::new(&self.model).exists() {
            bail!("model file not found: {}", self.model);
        }
        if !std::path::Path::new(&self.video).exists() {
            bail!("video file not found: {}", self.video);
        }
        if !(0.0..1.0).contains(&self.conf) {
            bail!("--conf must be in [0, 1), got {}", self.conf);
        }
        if !(0.0..1.0).contains(&self.iou) {
            bail!("--iou must be in [0, 1), got {}", self.iou);
        }
        if self.size == 0 || self.size % 32 != 0 {
            bail!("--size must be a positive multiple of 32, got {}", self.size);
        }
        if !(crate::playback::SPEED_MIN..=crate::playback::SPEED_MAX).contains(&self.speed) {
            bail!(
                "--speed must be in [{}, {}], got {}",
                crate::playback::SPEED_MIN,
                crate::playback::SPEED_MAX,
                self.speed
            );
        }
        if self.min_box_size < 0.0 {
            bail!("--min-box-size must be non-negative, got {}", self.min_box_size);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        // paths are checked first, so point at files that always exist
        Args {
            model: "Cargo.toml".into(),
            video: "Cargo.toml".into(),
            conf: 0.25,
            iou: 0.45,
            size: 640,
            score_policy: ScorePolicy::RawMax,
            coords: CoordSpace::InputPixels,
            min_box_size: 2.0,
            speed: 0.5,
        }
    }

    #[test]
    fn default_ranges_pass_validation() {
        assert!(args().validate().is_ok());
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let mut a = args();
        a.conf = 1.5;
        assert!(a.validate().is_err());

        let mut a = args();
        a.iou = -0.1;
        assert!(a.validate().is_err());

        let mut a = args();
        a.speed = 3.0;
        assert!(a.validate().is_err());

        let mut a = args();
        a.size = 100;
        assert!(a.validate().is_err());
    }

    #[test]
    fn missing_model_file_is_rejected() {
        let mut a = args();
        a.model = "no/such/model.onnx".into();
        assert!(a.validate().is_err());
    }

    #[test]
    fn normalization_base_follows_coord_space() {
        assert_eq!(CoordSpace::InputPixels.normalization_base(640), 640.0);
        assert_eq!(CoordSpace::Normalized.normalization_base(640), 1.0);
    }
}
