#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::HandLandmarker;
use crate::detect::result::{Handedness, HandObservation, Landmark, LANDMARK_COUNT};
use crate::frame::Frame;
use crate::ingest::normalize::resize_nearest;

const INPUT_SIZE: u32 = 224;

/// Tract-based hand landmark backend for ONNX inference.
///
/// Expects a single-hand landmark model with an NHWC `1x224x224x3` float
/// input in 0..1 and three outputs: landmarks (`1x63`, pixel coordinates in
/// the input square), hand presence (`1x1`) and handedness (`1x1`, right-hand
/// probability). Detects at most one hand per frame.
pub struct TractLandmarker {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    presence_threshold: f32,
}

impl TractLandmarker {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = INPUT_SIZE as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, size, size, 3)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            presence_threshold: 0.5,
        })
    }

    /// Override the default hand-presence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.presence_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let pixels = resize_nearest(
            frame.pixels(),
            frame.width,
            frame.height,
            INPUT_SIZE,
            INPUT_SIZE,
        )?;
        let size = INPUT_SIZE as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
            pixels[(y * size + x) * 3 + c] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn parse_outputs(&self, outputs: TVec<TValue>) -> Result<Vec<HandObservation>> {
        if outputs.len() < 3 {
            return Err(anyhow!(
                "landmark model produced {} outputs, expected 3",
                outputs.len()
            ));
        }
        let presence = first_scalar(&outputs[1]).context("read hand presence")?;
        if presence.is_nan() || presence < self.presence_threshold {
            return Ok(Vec::new());
        }
        let right_probability = first_scalar(&outputs[2]).context("read handedness")?;

        let coords = outputs[0]
            .to_array_view::<f32>()
            .context("landmark tensor was not f32")?;
        let coords: Vec<f32> = coords.iter().copied().collect();
        if coords.len() < LANDMARK_COUNT * 3 {
            return Err(anyhow!(
                "landmark tensor has {} values, expected {}",
                coords.len(),
                LANDMARK_COUNT * 3
            ));
        }

        let scale = INPUT_SIZE as f32;
        let mut landmarks = [Landmark::default(); LANDMARK_COUNT];
        for (i, landmark) in landmarks.iter_mut().enumerate() {
            let base = i * 3;
            *landmark = Landmark::new(
                coords[base] / scale,
                coords[base + 1] / scale,
                coords[base + 2] / scale,
            );
        }

        Ok(vec![HandObservation {
            hand_index: 0,
            handedness: if right_probability > 0.5 {
                Handedness::Right
            } else {
                Handedness::Left
            },
            landmarks,
        }])
    }
}

fn first_scalar(value: &TValue) -> Result<f32> {
    let view = value
        .to_array_view::<f32>()
        .context("output tensor was not f32")?;
    view.iter()
        .next()
        .copied()
        .ok_or_else(|| anyhow!("output tensor is empty"))
}

impl HandLandmarker for TractLandmarker {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandObservation>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.parse_outputs(outputs)
    }
}
