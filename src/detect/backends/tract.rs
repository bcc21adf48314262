#![cfg(feature = "backend-tract")]

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection, ObjectClass};
use crate::error::{GuestCounterError, Result};

/// Tract-based backend for YOLOv8 ONNX exports.
///
/// The model takes a `[1, 3, size, size]` RGB tensor scaled to `0..1` and
/// yields `[1, 4 + classes, anchors]`, where the first four rows are
/// `cx, cy, w, h` in model input pixels. It does no network I/O and writes
/// nothing to disk.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                GuestCounterError::ModelUnavailable(format!(
                    "failed to load ONNX model from {}: {e:#}",
                    model_path.display()
                ))
            })?;

        Ok(Self {
            model,
            input_size,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Override the default non-maximum suppression IoU threshold.
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let side = self.input_size;
        let resized = image::imageops::resize(image, side, side, FilterType::Triangle);
        let side = side as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn decode_output(&self, output: &Tensor, width: u32, height: u32) -> Result<Vec<Detection>> {
        let view = output.to_array_view::<f32>().map_err(|e| {
            GuestCounterError::ModelUnavailable(format!("model output tensor was not f32: {e}"))
        })?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            return Err(GuestCounterError::ModelUnavailable(format!(
                "unexpected YOLO output shape {shape:?}"
            )));
        }
        let rows = shape[1];
        let anchors = shape[2];
        let scale_x = width as f32 / self.input_size as f32;
        let scale_y = height as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for i in 0..anchors {
            let mut best_class = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for class in 0..rows - 4 {
                let score = view[[0, 4 + class, i]];
                if score > best_score {
                    best_score = score;
                    best_class = class;
                }
            }
            if best_score < self.confidence_threshold {
                continue;
            }
            let cx = view[[0, 0, i]] * scale_x;
            let cy = view[[0, 1, i]] * scale_y;
            let w = view[[0, 2, i]] * scale_x;
            let h = view[[0, 3, i]] * scale_y;
            let bbox = BoundingBox::new(
                (cx - w / 2.0).clamp(0.0, width as f32),
                (cy - h / 2.0).clamp(0.0, height as f32),
                (cx + w / 2.0).clamp(0.0, width as f32),
                (cy + h / 2.0).clamp(0.0, height as f32),
            );
            candidates.push(Detection::new(
                ObjectClass::from_coco_index(best_class as u32),
                best_score,
                bbox,
            ));
        }

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

/// Per-class greedy suppression, highest confidence first.
fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class == candidate.class && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| GuestCounterError::ModelUnavailable(format!("ONNX inference failed: {e:#}")))?;
        let output = outputs
            .first()
            .ok_or_else(|| GuestCounterError::ModelUnavailable("model produced no outputs".into()))?;
        self.decode_output(output, width, height)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RgbImage::new(self.input_size, self.input_size);
        self.detect(&blank).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppression_keeps_best_box_per_class() {
        let a = Detection::new(ObjectClass::Person, 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        let b = Detection::new(ObjectClass::Person, 0.8, BoundingBox::new(1.0, 1.0, 10.0, 10.0));
        let c = Detection::new(ObjectClass::Other(16), 0.7, BoundingBox::new(1.0, 1.0, 10.0, 10.0));

        let kept = non_max_suppression(vec![b, c.clone(), a.clone()], 0.5);
        assert_eq!(kept, vec![a, c]);
    }

    #[test]
    fn missing_model_is_unavailable() {
        let err = TractBackend::new("/nonexistent/yolov8n.onnx", 640)
            .err()
            .expect("load must fail");
        assert!(matches!(err, GuestCounterError::ModelUnavailable(_)));
    }
}
