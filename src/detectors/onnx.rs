use super::coco::{COCO_CLASSES, class_name};
use super::nms::{Candidate, non_max_suppression};
use super::{BoundingBox, DetectError, DetectRequest, Detection, Detector};
use image::imageops::FilterType;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// YOLOv8 expects 640x640 input.
const INPUT_SIZE: u32 = 640;
const IOU_THRESHOLD: f32 = 0.45;

/// YOLOv8 detector running on ONNX Runtime.
///
/// Expects the standard export layout: one input named `images` with shape
/// `[1, 3, 640, 640]` and one output with shape `[1, 4 + classes, anchors]`.
pub struct OnnxDetector {
    session: Mutex<Session>,
}

impl OnnxDetector {
    pub fn load(model_path: impl Into<PathBuf>) -> Result<Self, DetectError> {
        let model_path = model_path.into();
        if !model_path.exists() {
            return Err(DetectError::ModelLoad {
                path: model_path,
                reason: "file not found".to_string(),
            });
        }

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(4))
            .and_then(|b| b.commit_from_file(&model_path))
            .map_err(|e| DetectError::ModelLoad {
                path: model_path.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(model = %model_path.display(), "loaded ONNX model");
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    fn preprocess(image_path: &Path) -> Result<Array4<f32>, DetectError> {
        let rgb = image::open(image_path)
            .map_err(|e| DetectError::Inference(format!("cannot decode image: {e}")))?
            .to_rgb8();
        let resized = image::imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

        let size = INPUT_SIZE as usize;
        let mut input = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }
        Ok(input)
    }
}

/// Decode a `[1, 4 + classes, anchors]` YOLOv8 output into candidates whose
/// best class score reaches `threshold`. Boxes come out normalized.
pub fn decode_yolov8(
    shape: &[i64],
    data: &[f32],
    threshold: f32,
) -> Result<Vec<Candidate>, DetectError> {
    let bad_shape = || DetectError::Inference(format!("unexpected output shape {shape:?}"));
    let &[_, channels, anchors] = shape else {
        return Err(bad_shape());
    };
    // Dynamic axes come back as -1.
    let (Ok(channels), Ok(anchors)) = (usize::try_from(channels), usize::try_from(anchors)) else {
        return Err(bad_shape());
    };
    let needed = channels.checked_mul(anchors).ok_or_else(bad_shape)?;
    if channels <= 4 || anchors == 0 || data.len() < needed {
        return Err(bad_shape());
    }

    let size = INPUT_SIZE as f32;
    let at = |c: usize, i: usize| data[c * anchors + i];
    let mut candidates = Vec::new();

    for i in 0..anchors {
        let (class_id, score) = (4..channels)
            .map(|c| (c - 4, at(c, i)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if score < threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        let x1 = ((cx - w / 2.0) / size).clamp(0.0, 1.0);
        let y1 = ((cy - h / 2.0) / size).clamp(0.0, 1.0);
        let x2 = ((cx + w / 2.0) / size).clamp(0.0, 1.0);
        let y2 = ((cy + h / 2.0) / size).clamp(0.0, 1.0);

        candidates.push(Candidate {
            class_id,
            confidence: score,
            bbox: BoundingBox::new(x1, y1, x2 - x1, y2 - y1),
        });
    }

    Ok(candidates)
}

impl Detector for OnnxDetector {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn detect(&self, request: &DetectRequest) -> Result<Vec<Detection>, DetectError> {
        let input = Self::preprocess(&request.image)?;
        let tensor =
            TensorRef::from_array_view(&input).map_err(|e| DetectError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectError::Inference("session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs!["images" => tensor])
            .map_err(|e| DetectError::Inference(e.to_string()))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::Inference(e.to_string()))?;

        let candidates = decode_yolov8(shape, data, request.confidence_threshold as f32)?;
        let kept = non_max_suppression(candidates, IOU_THRESHOLD);
        tracing::debug!(
            kept = kept.len(),
            classes = COCO_CLASSES.len(),
            "yolov8 inference finished"
        );

        Ok(kept
            .into_iter()
            .filter_map(|c| {
                class_name(c.class_id).map(|label| Detection {
                    label: label.to_string(),
                    confidence: f64::from(c.confidence),
                    bbox: Some(c.bbox),
                })
            })
            .collect())
    }
}
