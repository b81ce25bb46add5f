//! Turns detected needs (and boxes, when available) into short placement
//! hints such as `"Sofa: middle area, left side"`.

use crate::detectors::BoundingBox;
use crate::labels::normalize_needs;
use crate::schema::DetectedBox;
use std::collections::HashMap;

pub const MAX_SUGGESTIONS: usize = 10;

const GENERIC_PLACEMENTS: &[(&str, &str)] = &[
    ("sofa", "Sofa: left wall (centered)"),
    ("coffee table", "Coffee Table: in front of sofa"),
    ("tv console", "TV Console: opposite sofa"),
    ("bed", "Bed: back wall (centered)"),
    ("wardrobe", "Wardrobe: right side"),
    ("nightstand", "Nightstand: beside bed"),
    ("desk", "Desk: near window"),
    ("chair", "Chair: aligned with desk"),
    ("rug", "Rug: under main furniture"),
];

/// Describe where a normalized box sits in the frame, e.g. `"back area, center"`.
pub fn position_from_box(bbox: &BoundingBox) -> Option<String> {
    if !bbox.is_finite() {
        return None;
    }
    let (cx, cy) = bbox.center();

    let horiz = if cx < 0.33 {
        "left side"
    } else if cx > 0.66 {
        "right side"
    } else {
        "center"
    };
    let vert = if cy < 0.33 {
        "front area"
    } else if cy > 0.66 {
        "back area"
    } else {
        "middle area"
    };

    Some(format!("{vert}, {horiz}"))
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn build_layout_suggestions<S: AsRef<str>>(objects: &[S], boxes: &[DetectedBox]) -> Vec<String> {
    // First box per label wins; boxes are reachable by need and by raw label.
    let mut box_by_label: HashMap<String, &BoundingBox> = HashMap::new();
    for b in boxes {
        let keys = std::iter::once(b.label.as_str()).chain(b.need.as_deref());
        for key in keys {
            let key = key.trim().to_lowercase();
            if !key.is_empty() {
                box_by_label.entry(key).or_insert(&b.bbox);
            }
        }
    }

    normalize_needs(objects)
        .into_iter()
        .map(|obj| {
            let found = box_by_label
                .get(&obj)
                .or_else(|| obj.strip_suffix(" console").and_then(|k| box_by_label.get(k)))
                .or_else(|| obj.strip_suffix(" table").and_then(|k| box_by_label.get(k)));

            if let Some(pos) = found.and_then(|b| position_from_box(b)) {
                return format!("{}: {}", title_case(&obj), pos);
            }

            if let Some((_, generic)) = GENERIC_PLACEMENTS.iter().find(|(need, _)| *need == obj) {
                return generic.to_string();
            }

            format!("{}: place near wall with clear circulation", title_case(&obj))
        })
        .take(MAX_SUGGESTIONS)
        .collect()
}
