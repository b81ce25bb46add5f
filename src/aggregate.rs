use crate::detectors::Detection;
use crate::labels::LabelTable;
use std::collections::{BTreeMap, HashSet};

/// Maximum number of needs listed in `objects`.
pub const DEFAULT_MAX_OBJECTS: usize = 8;

/// Result of folding one run's detections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    /// Needs by descending confidence, capped.
    pub objects: Vec<String>,
    /// Relevant labels, first-seen order, deduplicated, uncapped.
    pub raw: Vec<String>,
    /// Best confidence per need, including needs cut from `objects`.
    pub conf: BTreeMap<String, f64>,
}

/// Filters detections to the relevant labels, remaps them to needs and
/// keeps the best confidence seen per need.
#[derive(Debug, Clone)]
pub struct Aggregator {
    table: LabelTable,
    max_objects: usize,
}

impl Aggregator {
    pub fn new(table: LabelTable) -> Self {
        Self {
            table,
            max_objects: DEFAULT_MAX_OBJECTS,
        }
    }

    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }

    pub fn table(&self) -> &LabelTable {
        &self.table
    }

    pub fn aggregate(&self, detections: &[Detection]) -> Summary {
        let mut raw: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        // Needs in the order they were first established, with their best confidence.
        let mut best: Vec<(String, f64)> = Vec::new();

        for detection in detections {
            let label = detection.label.as_str();
            if !self.table.is_relevant(label) {
                continue;
            }

            if seen.insert(label) {
                raw.push(label.to_string());
            }

            let Some(need) = self.table.need_for(label) else {
                continue;
            };

            match best.iter_mut().find(|(n, _)| n == need) {
                Some((_, stored)) => {
                    if detection.confidence > *stored {
                        *stored = detection.confidence;
                    }
                }
                // An absent need counts as 0.0, so it only appears once something beats that.
                None if detection.confidence > 0.0 => {
                    best.push((need.to_string(), detection.confidence));
                }
                None => {}
            }
        }

        let conf: BTreeMap<String, f64> = best.iter().cloned().collect();

        best.sort_by(|a, b| b.1.total_cmp(&a.1));
        let objects: Vec<String> = best
            .into_iter()
            .take(self.max_objects)
            .map(|(need, _)| need)
            .collect();

        tracing::debug!(
            detections = detections.len(),
            raw = raw.len(),
            needs = conf.len(),
            objects = objects.len(),
            "aggregated detections"
        );

        Summary { objects, raw, conf }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(LabelTable::default())
    }
}
