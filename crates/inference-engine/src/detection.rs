//! Detection result types

use serde::{Deserialize, Serialize};

/// Normalized bounding box; all fields in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    /// Build from SSD corner order (ymin, xmin, ymax, xmax), clamping into the frame
    pub fn from_corners(ymin: f32, xmin: f32, ymax: f32, xmax: f32) -> Self {
        let x0 = xmin.clamp(0.0, 1.0);
        let y0 = ymin.clamp(0.0, 1.0);
        let x1 = xmax.clamp(0.0, 1.0);
        let y1 = ymax.clamp(0.0, 1.0);
        Self {
            x: x0,
            y: y0,
            w: (x1 - x0).max(0.0),
            h: (y1 - y0).max(0.0),
        }
    }
}

/// One detected object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Species / object label from the label map
    pub label: String,
    /// Raw model score (0.0 to 1.0)
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}
