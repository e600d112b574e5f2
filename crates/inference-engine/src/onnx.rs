//! ONNX SSD detector backed by tract

use camera_capture::Frame;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::{BoundingBox, Detection, Detector, InferenceError, LabelMap};

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the ONNX detection model
    pub model_path: PathBuf,
    /// Path to the label map (one label per line)
    pub labels_path: PathBuf,
    /// Model input width (pixels)
    pub input_width: u32,
    /// Model input height (pixels)
    pub input_height: u32,
    /// Quantized models take raw u8 pixels
    pub quantized: bool,
    /// Float model normalization: (pixel - mean) / std
    pub input_mean: f32,
    pub input_std: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/detect.onnx"),
            labels_path: PathBuf::from("models/coco_labels.txt"),
            input_width: 300,
            input_height: 300,
            quantized: true,
            input_mean: 127.5,
            input_std: 127.5,
        }
    }
}

/// SSD-style detector: outputs are boxes, classes, scores and an optional count
pub struct OnnxDetector {
    model: TypedRunnableModel<TypedModel>,
    labels: LabelMap,
    config: ModelConfig,
}

impl OnnxDetector {
    /// Load model and label map from disk
    pub fn load(config: &ModelConfig) -> Result<Self, InferenceError> {
        info!("Loading detection model: {}", config.model_path.display());

        let labels = LabelMap::from_file(&config.labels_path)?;
        let shape = [1usize, config.input_height as usize, config.input_width as usize, 3];
        let fact: InferenceFact = if config.quantized {
            u8::fact(shape).into()
        } else {
            f32::fact(shape).into()
        };

        let model = tract_onnx::onnx()
            .model_for_path(&config.model_path)
            .and_then(|m| m.with_input_fact(0, fact))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| InferenceError::ModelLoad(format!("{}: {}", config.model_path.display(), e)))?;

        info!(
            "Model loaded: {}x{} input, {} labels, quantized={}",
            config.input_width,
            config.input_height,
            labels.len(),
            config.quantized
        );

        Ok(Self {
            model,
            labels,
            config: config.clone(),
        })
    }

    fn input_tensor(&self, frame: &Frame) -> Result<Tensor, InferenceError> {
        let image = frame.as_rgb_image().ok_or_else(|| InferenceError::ShapeMismatch {
            expected: format!("{} bytes", frame.expected_len()),
            actual: format!("{} bytes", frame.data.len()),
        })?;

        let (w, h) = (self.config.input_width, self.config.input_height);
        let resized = imageops::resize(&image, w, h, FilterType::Triangle);
        let shape = (1, h as usize, w as usize, 3);

        let tensor = if self.config.quantized {
            tract_ndarray::Array4::from_shape_fn(shape, |(_, y, x, c)| {
                resized.get_pixel(x as u32, y as u32)[c]
            })
            .into_tensor()
        } else {
            let (mean, std) = (self.config.input_mean, self.config.input_std);
            tract_ndarray::Array4::from_shape_fn(shape, |(_, y, x, c)| {
                (resized.get_pixel(x as u32, y as u32)[c] as f32 - mean) / std
            })
            .into_tensor()
        };
        Ok(tensor)
    }
}

impl Detector for OnnxDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, InferenceError> {
        if !frame.is_well_formed() {
            return Err(InferenceError::ShapeMismatch {
                expected: format!("{}x{}x3 RGB", frame.width, frame.height),
                actual: format!("{} bytes", frame.data.len()),
            });
        }

        let input = self.input_tensor(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::ModelFailure(e.to_string()))?;

        if outputs.len() < 3 {
            return Err(InferenceError::ShapeMismatch {
                expected: "at least 3 outputs".to_string(),
                actual: format!("{} outputs", outputs.len()),
            });
        }

        let as_f32 = |i: usize| -> Result<Vec<f32>, InferenceError> {
            let cast = outputs[i]
                .cast_to::<f32>()
                .map_err(|e| InferenceError::ModelFailure(e.to_string()))?;
            let slice = cast
                .as_slice::<f32>()
                .map_err(|e| InferenceError::ModelFailure(e.to_string()))?;
            Ok(slice.to_vec())
        };

        let boxes = as_f32(0)?;
        let classes = as_f32(1)?;
        let scores = as_f32(2)?;
        let count = if outputs.len() > 3 {
            as_f32(3)?.first().map(|c| *c as usize)
        } else {
            None
        };

        let detections = decode_ssd_outputs(&boxes, &classes, &scores, count, &self.labels)?;
        debug!("Frame {}: {} raw detections", frame.sequence, detections.len());
        Ok(detections)
    }
}

/// Turn flat SSD output tensors into detections.
///
/// `boxes` holds `(ymin, xmin, ymax, xmax)` per detection. Class indices
/// outside the label map become `"unknown"`.
pub fn decode_ssd_outputs(
    boxes: &[f32],
    classes: &[f32],
    scores: &[f32],
    count: Option<usize>,
    labels: &LabelMap,
) -> Result<Vec<Detection>, InferenceError> {
    let n = scores.len();
    if classes.len() != n || boxes.len() != n * 4 {
        return Err(InferenceError::ShapeMismatch {
            expected: format!("{} classes and {} box coordinates", n, n * 4),
            actual: format!("{} classes and {} box coordinates", classes.len(), boxes.len()),
        });
    }

    let n = count.map(|c| c.min(n)).unwrap_or(n);
    let detections = (0..n)
        .map(|i| {
            let b = &boxes[i * 4..i * 4 + 4];
            let class = classes[i];
            let label = if class >= 0.0 {
                labels.get(class as usize).unwrap_or("unknown")
            } else {
                "unknown"
            };
            Detection::new(label, scores[i], BoundingBox::from_corners(b[0], b[1], b[2], b[3]))
        })
        .collect();
    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> LabelMap {
        LabelMap::parse("???\nperson\nbicycle\ncat\ndog\n")
    }

    #[test]
    fn test_decode_outputs() {
        let boxes = [0.1, 0.2, 0.5, 0.6, 0.0, 0.0, 1.0, 1.0];
        let classes = [2.0, 3.0];
        let scores = [0.91, 0.40];

        let detections = decode_ssd_outputs(&boxes, &classes, &scores, None, &labels()).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, "cat");
        assert_eq!(detections[0].confidence, 0.91);
        assert_eq!(detections[0].bbox.x, 0.2);
        assert_eq!(detections[1].label, "dog");
    }

    #[test]
    fn test_decode_respects_count() {
        let boxes = [0.0; 12];
        let classes = [0.0, 1.0, 2.0];
        let scores = [0.9, 0.8, 0.7];

        let detections = decode_ssd_outputs(&boxes, &classes, &scores, Some(1), &labels()).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "person");
    }

    #[test]
    fn test_unknown_class() {
        let detections =
            decode_ssd_outputs(&[0.0; 4], &[42.0], &[0.5], None, &labels()).unwrap();
        assert_eq!(detections[0].label, "unknown");
    }

    #[test]
    fn test_mismatched_outputs() {
        let result = decode_ssd_outputs(&[0.0; 4], &[1.0, 2.0], &[0.5, 0.6], None, &labels());
        assert!(matches!(result, Err(InferenceError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_missing_model_fails_to_load() {
        let config = ModelConfig {
            model_path: PathBuf::from("/nonexistent/detect.onnx"),
            labels_path: PathBuf::from("/nonexistent/labels.txt"),
            ..Default::default()
        };
        assert!(matches!(
            OnnxDetector::load(&config),
            Err(InferenceError::ModelLoad(_))
        ));
    }
}
