use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod coco;
pub mod nms;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod sidecar;

pub use sidecar::SidecarDetector;

/// Default confidence threshold handed to detectors.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.30;

/// Anything that can turn an image into labeled detections.
pub trait Detector {
    fn name(&self) -> &'static str;
    fn detect(&self, request: &DetectRequest) -> Result<Vec<Detection>, DetectError>;
}

/// Build the model-backed detector for `model`.
#[cfg(feature = "onnx")]
pub fn model_detector(model: &std::path::Path) -> Result<Box<dyn Detector>, DetectError> {
    Ok(Box::new(onnx::OnnxDetector::load(model)?))
}

/// Build the model-backed detector for `model`.
#[cfg(not(feature = "onnx"))]
pub fn model_detector(model: &std::path::Path) -> Result<Box<dyn Detector>, DetectError> {
    Err(DetectError::RuntimeUnavailable(format!(
        "roomsense was built without ONNX support, cannot load {}. \
         Rebuild with `--features onnx` or pass --detections <FILE>",
        model.display()
    )))
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectRequest {
    pub image: PathBuf,
    pub confidence_threshold: f64,
}

impl DetectRequest {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }
}

/// One labeled object instance reported for an image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

/// Axis-aligned box, normalized to the image size with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// `(x1, y1, x2, y2)`
    pub fn to_corners(&self) -> (f32, f32, f32, f32) {
        (self.x, self.y, self.x + self.w, self.y + self.h)
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("Image not found: {}", .0.display())]
    ImageNotFound(PathBuf),
    #[error("Missing detector runtime: {0}")]
    RuntimeUnavailable(String),
    #[error("Failed to load model {}: {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Invalid detections in {}: {reason}", .path.display())]
    InvalidDetections { path: PathBuf, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
