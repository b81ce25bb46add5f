use super::coco::class_name;
use super::{BoundingBox, DetectError, DetectRequest, Detection, Detector};
use serde::Deserialize;
use std::path::PathBuf;

/// Reads detections produced ahead of time by an external detector.
///
/// Accepts either a bare JSON array or an object with a `detections` array.
/// Each entry names its class with `label` or with a COCO `class_id`:
///
/// ```json
/// [{"label": "couch", "confidence": 0.91, "box": {"x": 0.1, "y": 0.4, "w": 0.5, "h": 0.3}},
///  {"class_id": 56, "confidence": 0.42}]
/// ```
#[derive(Debug, Clone)]
pub struct SidecarDetector {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SidecarFile {
    List(Vec<SidecarEntry>),
    Wrapped { detections: Vec<SidecarEntry> },
}

#[derive(Debug, Deserialize)]
struct SidecarEntry {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    class_id: Option<usize>,
    confidence: f64,
    #[serde(default, rename = "box")]
    bbox: Option<BoundingBox>,
}

impl SidecarEntry {
    /// Scores outside `[0, 1]` are pinned to the nearest bound.
    fn clamped_confidence(&self) -> f64 {
        let clamped = self.confidence.clamp(0.0, 1.0);
        if clamped != self.confidence {
            tracing::debug!(
                label = ?self.label,
                confidence = self.confidence,
                "clamping out-of-range confidence"
            );
        }
        clamped
    }

    fn resolve_label(&self) -> Option<String> {
        match (&self.label, self.class_id) {
            (Some(label), _) if !label.trim().is_empty() => Some(label.trim().to_string()),
            (_, Some(id)) => class_name(id).map(str::to_string),
            _ => None,
        }
    }
}

impl SidecarDetector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse(&self, content: &str) -> Result<Vec<SidecarEntry>, DetectError> {
        let file: SidecarFile =
            serde_json::from_str(content).map_err(|e| DetectError::InvalidDetections {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(match file {
            SidecarFile::List(entries) => entries,
            SidecarFile::Wrapped { detections } => detections,
        })
    }
}

impl Detector for SidecarDetector {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    fn detect(&self, request: &DetectRequest) -> Result<Vec<Detection>, DetectError> {
        let content = std::fs::read_to_string(&self.path)?;
        let entries = self.parse(&content)?;
        let total = entries.len();

        let detections: Vec<Detection> = entries
            .into_iter()
            .filter_map(|entry| {
                let confidence = entry.clamped_confidence();
                if confidence < request.confidence_threshold {
                    return None;
                }
                let Some(label) = entry.resolve_label() else {
                    tracing::debug!(class_id = ?entry.class_id, "skipping unlabeled detection");
                    return None;
                };
                Some(Detection {
                    label,
                    confidence,
                    bbox: entry.bbox,
                })
            })
            .collect();

        tracing::debug!(
            path = %self.path.display(),
            total,
            kept = detections.len(),
            threshold = request.confidence_threshold,
            "loaded sidecar detections"
        );
        Ok(detections)
    }
}
