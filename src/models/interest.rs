use serde::{Deserialize, Serialize};

/// A weighted topic the user cares about.
///
/// `embedding` is filled lazily the first time an item is scored against
/// this interest and never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    pub id: i64,
    pub description: String,
    pub weight: f64,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct NewInterest {
    pub description: String,
    pub weight: f64,
}

impl NewInterest {
    pub fn new(description: impl Into<String>, weight: f64) -> Self {
        Self {
            description: description.into(),
            weight,
        }
    }
}
