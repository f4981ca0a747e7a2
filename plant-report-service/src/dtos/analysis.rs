use serde::{Deserialize, Serialize};

/// Body of a successful `POST /analyze`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Free-form analysis text, exactly as the model returned it.
    pub result: String,
    /// The uploaded image echoed back as a `data:` URI.
    pub image: String,
}
