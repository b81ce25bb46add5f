use crate::aggregate::Summary;
use crate::detectors::BoundingBox;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The JSON record printed by `roomsense detect`.
///
/// Only `objects`, `raw` and `conf` are always present. The remaining fields
/// are emitted when requested or when the run failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    /// Detected furniture needs, best confidence first.
    pub objects: Vec<String>,
    /// Relevant detector labels in first-seen order.
    pub raw: Vec<String>,
    /// Best confidence per need.
    #[serde(default)]
    pub conf: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boxes: Option<Vec<DetectedBox>>,
    #[serde(
        default,
        rename = "layoutSuggestions",
        skip_serializing_if = "Option::is_none"
    )]
    pub layout_suggestions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A relevant detection with its location, normalized to the image size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectedBox {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub need: Option<String>,
    pub confidence: f64,
    #[serde(flatten)]
    pub bbox: BoundingBox,
}

impl Report {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(Report)).unwrap_or_default()
    }
}

impl From<Summary> for Report {
    fn from(summary: Summary) -> Self {
        Self {
            objects: summary.objects,
            raw: summary.raw,
            conf: summary.conf,
            ..Self::default()
        }
    }
}
