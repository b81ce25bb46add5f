use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Detector labels mapped to furniture needs (search-friendly names).
pub const FURNITURE_NEEDS: &[(&str, &str)] = &[
    ("couch", "sofa"),
    ("chair", "dining chair"),
    ("bed", "bed"),
    ("dining table", "dining table"),
    ("tv", "tv console"),
    ("laptop", "desk"),
    ("potted plant", "decor plant"),
];

/// Aliases applied when normalizing needs coming from other sources.
const NEED_ALIASES: &[(&str, &str)] = &[
    ("tv", "tv console"),
    ("tv stand", "tv console"),
    ("center table", "coffee table"),
    ("couch", "sofa"),
];

/// Immutable label configuration: which detector labels matter, and which
/// need each of them maps to.
///
/// A relevant label does not have to map to a need. Such labels still show
/// up in the raw label list but never produce a need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTable {
    relevant: BTreeSet<String>,
    needs: BTreeMap<String, String>,
}

impl LabelTable {
    pub fn new<R, N, L, K, V>(relevant: R, needs: N) -> Self
    where
        R: IntoIterator<Item = L>,
        L: Into<String>,
        N: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            relevant: relevant.into_iter().map(Into::into).collect(),
            needs: needs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build a table whose relevant set is exactly the keys of `needs`.
    pub fn from_needs<N, K, V>(needs: N) -> Self
    where
        N: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let needs: BTreeMap<String, String> = needs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            relevant: needs.keys().cloned().collect(),
            needs,
        }
    }

    /// The built-in COCO → furniture table.
    pub fn furniture() -> Self {
        Self::from_needs(FURNITURE_NEEDS.iter().copied())
    }

    pub fn is_relevant(&self, label: &str) -> bool {
        self.relevant.contains(label)
    }

    pub fn need_for(&self, label: &str) -> Option<&str> {
        self.needs.get(label).map(String::as_str)
    }

    pub fn relevant_labels(&self) -> impl Iterator<Item = &str> {
        self.relevant.iter().map(String::as_str)
    }

    pub fn needs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.needs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::furniture()
    }
}

/// Lowercase, trim and apply the alias table to a single need name.
pub fn normalize_need(need: &str) -> String {
    let need = need.trim().to_lowercase();
    NEED_ALIASES
        .iter()
        .find(|(alias, _)| *alias == need)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(need)
}

/// Normalize a list of needs, dropping the ones that end up empty.
pub fn normalize_needs<S: AsRef<str>>(needs: &[S]) -> Vec<String> {
    needs
        .iter()
        .map(|n| normalize_need(n.as_ref()))
        .filter(|n| !n.is_empty())
        .collect()
}
