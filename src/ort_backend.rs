// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! ONNX Runtime 推理后端
//! Thin wrapper around an `ort` session: load a model file, forward one
//! NCHW batch, read class names out of the export metadata.

use anyhow::{anyhow, Context, Result};
use ndarray::{Array, IxDyn};
use ort::{GraphOptimizationLevel, Session};
use regex::Regex;

pub struct OrtBackend {
    session: Session,
}

impl OrtBackend {
    pub fn build(model_path: &str) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ONNX model: {model_path}"))?;
        Ok(Self { session })
    }

    /// Forward one batch. The detection head has exactly one meaningful
    /// output, so only the first output tensor is returned.
    pub fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>> {
        let ys = self.session.run(ort::inputs![xs.view()]?)?;
        let (_name, value) = ys
            .iter()
            .next()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        Ok(value.try_extract_tensor::<f32>()?.into_owned())
    }

    /// Class names embedded by the Ultralytics exporter, e.g.
    /// `{0: 'person', 1: 'bicycle', ...}`. Returns `None` when the model
    /// carries no usable `names` metadata.
    pub fn names(&self) -> Option<Vec<String>> {
        let metadata = self.session.metadata().ok()?;
        let raw = metadata.custom("names").ok()??;
        let re = Regex::new(r#"'([^']+)'"#).ok()?;
        let names: Vec<String> = re
            .captures_iter(&raw)
            .map(|caps| caps[1].to_string())
            .collect();
        if names.is_empty() {
            None
        } else {
            Some(names)
        }
    }
}
