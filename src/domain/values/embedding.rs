use serde::Serialize;

/// Outcome of embedding one input text.
///
/// `Blank` and `Degraded` both carry a zero vector so positions stay aligned
/// with the inputs; callers that care can tell them apart from a real vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "vector", rename_all = "lowercase")]
pub enum Embedding {
    Computed(Vec<f32>),
    /// Input was empty or whitespace; the provider was not asked.
    Blank(Vec<f32>),
    /// Provider failed after retries.
    Degraded(Vec<f32>),
}

impl Embedding {
    pub fn zero(dimension: usize) -> Vec<f32> {
        vec![0.0; dimension]
    }

    pub fn vector(&self) -> &[f32] {
        match self {
            Embedding::Computed(v) | Embedding::Blank(v) | Embedding::Degraded(v) => v,
        }
    }

    pub fn into_vector(self) -> Vec<f32> {
        match self {
            Embedding::Computed(v) | Embedding::Blank(v) | Embedding::Degraded(v) => v,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Embedding::Computed(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Embedding::Degraded(_))
    }
}
