use crate::aggregate::Aggregator;
use crate::detectors::{DetectError, DetectRequest, Detection, Detector};
use crate::layout::build_layout_suggestions;
use crate::schema::{DetectedBox, Report};

/// Runs one detector over an image and folds the result into a [`Report`].
///
/// `run` never fails: every error ends up in `Report::error`.
pub struct DetectionEngine {
    detector: Box<dyn Detector>,
    aggregator: Aggregator,
    boxes: bool,
    layout: bool,
}

impl DetectionEngine {
    pub fn new<D: Detector + 'static>(detector: D, aggregator: Aggregator) -> Self {
        Self::from_boxed(Box::new(detector), aggregator)
    }

    pub fn from_boxed(detector: Box<dyn Detector>, aggregator: Aggregator) -> Self {
        Self {
            detector,
            aggregator,
            boxes: false,
            layout: false,
        }
    }

    pub fn with_boxes(mut self, boxes: bool) -> Self {
        self.boxes = boxes;
        self
    }

    pub fn with_layout(mut self, layout: bool) -> Self {
        self.layout = layout;
        self
    }

    pub fn run(&self, request: &DetectRequest) -> Report {
        match self.try_run(request) {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(detector = self.detector.name(), error = %err, "detection failed");
                Report::failure(err.to_string())
            }
        }
    }

    fn try_run(&self, request: &DetectRequest) -> Result<Report, DetectError> {
        if !request.image.exists() {
            return Err(DetectError::ImageNotFound(request.image.clone()));
        }

        tracing::info!(
            detector = self.detector.name(),
            image = %request.image.display(),
            threshold = request.confidence_threshold,
            "running detector"
        );
        let detections = self.detector.detect(request)?;

        let summary = self.aggregator.aggregate(&detections);
        let detected_boxes = self.collect_boxes(&detections);

        let layout_suggestions = self
            .layout
            .then(|| build_layout_suggestions(&summary.objects, &detected_boxes));

        let mut report = Report::from(summary);
        report.boxes = self.boxes.then_some(detected_boxes);
        report.layout_suggestions = layout_suggestions;
        Ok(report)
    }

    fn collect_boxes(&self, detections: &[Detection]) -> Vec<DetectedBox> {
        let table = self.aggregator.table();
        detections
            .iter()
            .filter(|d| table.is_relevant(&d.label))
            .filter_map(|d| {
                d.bbox.map(|bbox| DetectedBox {
                    label: d.label.clone(),
                    need: table.need_for(&d.label).map(str::to_string),
                    confidence: d.confidence,
                    bbox,
                })
            })
            .collect()
    }
}
