//! Classifier wire types.

use serde::{Deserialize, Serialize};

/// Request body for `POST /moderate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub bucket: String,
    pub key: String,
    pub min_confidence: f64,
}

/// Response body for `POST /moderate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifyResponse {
    #[serde(default, alias = "ModerationLabels")]
    pub moderation_labels: Vec<RawLabel>,
}

/// One detected category as the classifier reports it.
///
/// Top-level categories have no parent; the service may send `null`, `""`
/// or omit the field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawLabel {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "ParentName")]
    pub parent_name: Option<String>,
    #[serde(alias = "Confidence")]
    pub confidence: f64,
}

impl RawLabel {
    pub fn new(name: impl Into<String>, parent_name: Option<&str>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            parent_name: parent_name.map(str::to_string),
            confidence,
        }
    }
}
